// Perfect-nest exploration and the chain mutation helpers shared by the
// passes. A nest chain node may carry a preamble (declarations and complete
// loops, exactly what hoisting and loop splitting introduce) ahead of its
// continuation, which is always the last child; anything else is malformed.

use crate::bail_node;
use crate::error::{Forge, ForgeErrorKind};
use crate::ir::*;

#[derive(Debug, Clone)]
pub struct LoopMeta {
    pub var: Ident,
    pub start: Bound,
    pub end: Bound,
    pub step: i64,
    pub trip: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NestShape {
    pub loops: Vec<LoopMeta>, // outer to inner
}

impl NestShape {
    pub fn depth(&self) -> usize {
        self.loops.len()
    }

    pub fn vars(&self) -> Vec<Ident> {
        self.loops.iter().map(|l| l.var.clone()).collect()
    }

    pub fn loop_meta(&self, var: &str) -> Option<&LoopMeta> {
        self.loops.iter().find(|l| l.var == var)
    }
}

pub fn explore(root: &Stmt) -> Forge<NestShape> {
    let mut loops = Vec::new();
    let mut node = root;
    loop {
        match node {
            Stmt::For(f) => {
                let Some(trip) = f.trip_count() else {
                    bail_node!(
                        ForgeErrorKind::MalformedNest,
                        node,
                        "trip count of loop `{}` is not statically known",
                        f.var
                    );
                };
                loops.push(LoopMeta {
                    var: f.var.clone(),
                    start: f.start.clone(),
                    end: f.end.clone(),
                    step: f.step,
                    trip,
                });
                node = for_continuation(f)?;
            }
            Stmt::Block(b) => match block_continuation(b)? {
                Some(next) => node = next,
                None => break, // terminal statement container
            },
            other => {
                bail_node!(
                    ForgeErrorKind::MalformedNest,
                    other,
                    "expected a loop or a block in the nest chain"
                );
            }
        }
    }
    if loops.is_empty() {
        bail_node!(ForgeErrorKind::MalformedNest, root, "nest contains no loop");
    }
    Ok(NestShape { loops })
}

// The ordered statement container at the bottom of the chain. Assumes the
// shape was validated by `explore`.
pub fn innermost_block(root: &Stmt) -> Forge<&Block> {
    let mut node = root;
    let mut seen: Option<&Block> = None;
    loop {
        match node {
            Stmt::For(f) => node = for_continuation(f)?,
            Stmt::Block(b) => {
                seen = Some(b);
                match block_continuation(b)? {
                    Some(next) => node = next,
                    None => break,
                }
            }
            other => {
                bail_node!(
                    ForgeErrorKind::MalformedNest,
                    other,
                    "expected a loop or a block in the nest chain"
                );
            }
        }
    }
    match seen {
        Some(b) => Ok(b),
        None => bail_node!(
            ForgeErrorKind::MalformedNest,
            root,
            "nest chain ends without a statement block"
        ),
    }
}

pub fn innermost_block_mut(root: &mut Stmt) -> Forge<&mut Block> {
    // Mirrors `innermost_block`; validate first so the unchecked descent
    // below cannot go wrong.
    explore(root)?;
    let mut node = root;
    loop {
        let is_terminal = match &*node {
            Stmt::Block(b) => !matches!(b.stmts.last(), Some(Stmt::For(_) | Stmt::Block(_))),
            _ => false,
        };
        if is_terminal {
            match node {
                Stmt::Block(b) => return Ok(b),
                _ => unreachable!(),
            }
        }
        node = match node {
            Stmt::For(f) => f.body.last_mut().unwrap(),
            Stmt::Block(b) => b.stmts.last_mut().unwrap(),
            _ => unreachable!(),
        };
    }
}

// Chain loop lookup; preamble loops are not part of the chain.
pub fn loop_mut<'a>(root: &'a mut Stmt, var: &str) -> Option<&'a mut For> {
    match root {
        Stmt::For(f) => {
            if f.var == var {
                Some(f)
            } else {
                loop_mut(f.body.last_mut()?, var)
            }
        }
        Stmt::Block(b) => loop_mut(b.stmts.last_mut()?, var),
        _ => None,
    }
}

// Replace the chain loop named `var` with the statements `make` builds from
// it, splicing them into the parent container (or wrapping the root in a
// block when the loop is the root itself). Returns false if `var` is not on
// the chain.
pub fn splice_loop<F>(root: &mut Stmt, var: &str, make: F) -> bool
where
    F: FnOnce(For) -> Vec<Stmt>,
{
    splice_inner(root, var, &mut Some(make))
}

fn splice_inner<F>(node: &mut Stmt, var: &str, make: &mut Option<F>) -> bool
where
    F: FnOnce(For) -> Vec<Stmt>,
{
    if matches!(node, Stmt::For(f) if f.var == var) {
        let old = std::mem::replace(node, Stmt::Block(Block::new(Vec::new())));
        let Stmt::For(f) = old else { unreachable!() };
        let mut stmts = (make.take().unwrap())(f);
        *node = if stmts.len() == 1 {
            stmts.pop().unwrap()
        } else {
            Stmt::Block(Block::new(stmts))
        };
        return true;
    }
    let children = match node {
        Stmt::For(f) => &mut f.body,
        Stmt::Block(b) => &mut b.stmts,
        _ => return false,
    };
    let Some(last) = children.last_mut() else {
        return false;
    };
    if matches!(last, Stmt::For(f) if f.var == var) {
        let Some(Stmt::For(f)) = children.pop() else {
            unreachable!()
        };
        children.extend((make.take().unwrap())(f));
        return true;
    }
    splice_inner(children.last_mut().unwrap(), var, make)
}

fn for_continuation(f: &For) -> Forge<&Stmt> {
    let Some((last, pre)) = f.body.split_last() else {
        bail_node!(
            ForgeErrorKind::MalformedNest,
            Stmt::For(f.clone()),
            "loop `{}` has an empty body",
            f.var
        );
    };
    check_preamble(pre)?;
    match last {
        Stmt::For(_) | Stmt::Block(_) => Ok(last),
        other => bail_node!(
            ForgeErrorKind::MalformedNest,
            other,
            "body of loop `{}` must be a nested loop or a block",
            f.var
        ),
    }
}

// A block mid-chain continues into its last child; a block whose last child
// is a plain statement is the terminal statement container.
fn block_continuation(b: &Block) -> Forge<Option<&Stmt>> {
    let Some((last, pre)) = b.stmts.split_last() else {
        bail_node!(
            ForgeErrorKind::MalformedNest,
            Stmt::Block(b.clone()),
            "empty block in the nest chain"
        );
    };
    match last {
        Stmt::For(_) | Stmt::Block(_) => {
            check_preamble(pre)?;
            Ok(Some(last))
        }
        _ => Ok(None),
    }
}

fn check_preamble(pre: &[Stmt]) -> Forge<()> {
    for s in pre {
        match s {
            Stmt::Decl(_) | Stmt::For(_) => {}
            other => bail_node!(
                ForgeErrorKind::MalformedNest,
                other,
                "statement interleaved at an outer nest level"
            ),
        }
    }
    Ok(())
}
