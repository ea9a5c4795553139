// Loop-invariant code motion tailored to assembly kernels: invariant groups
// found by the dependence analyzer are evaluated once per tuple of wrapping
// loop indices into fresh `LI_*` temporaries, placed at the coarsest correct
// level of the nest.

use crate::bail;
use crate::error::{Forge, ForgeError, ForgeErrorKind};
use crate::ir::*;
use crate::opt::dependence::{self, DepSet, DependenceAnalyzer, ExprGroups};
use crate::opt::nest::{self, LoopMeta, NestShape};
use rustc_hash::FxHashMap;

pub struct Licm {
    // Per wrap-variable counters so temporary names stay unique across
    // groups and statements.
    tmp_counters: FxHashMap<Ident, usize>,
}

impl Licm {
    pub fn new() -> Self {
        Self {
            tmp_counters: FxHashMap::default(),
        }
    }

    // Returns the number of hoisted sub-expressions.
    pub fn optimize(&mut self, root: &mut Stmt, symbols: &SymbolTable) -> Forge<usize> {
        let shape = nest::explore(root)?;
        let nest_vars = shape.vars();

        // Analyze every write statement up front; nothing is rewritten
        // unless the whole block analyzes cleanly.
        let mut per_stmt: Vec<(usize, ScalarTy, ExprGroups)> = Vec::new();
        {
            let block = nest::innermost_block(root)?;
            let written = dependence::written_targets(block);
            let analyzer = DependenceAnalyzer::new(&nest_vars, &written);
            for (i, s) in block.stmts.iter().enumerate() {
                let (lhs, rhs) = match s {
                    Stmt::Assign { lhs, rhs } | Stmt::Incr { lhs, rhs } => (lhs, rhs),
                    _ => continue,
                };
                let mut groups = ExprGroups::default();
                analyzer.analyze(rhs, &mut groups)?;
                if !groups.is_empty() {
                    let ty = symbols.get(&lhs.name).copied().unwrap_or(ScalarTy::Double);
                    per_stmt.push((i, ty, groups));
                }
            }
        }

        let mut hoisted = 0;
        for (idx, ty, groups) in per_stmt {
            for (dep, exprs) in groups.iter() {
                hoisted += self.hoist_group(root, &shape, idx, ty, dep, exprs)?;
            }
        }
        Ok(hoisted)
    }

    fn hoist_group(
        &mut self,
        root: &mut Stmt,
        shape: &NestShape,
        stmt_idx: usize,
        ty: ScalarTy,
        dep: &DepSet,
        exprs: &[Expr],
    ) -> Forge<usize> {
        let Some(fast) = dep.last() else {
            bail!(
                ForgeErrorKind::Placement,
                "hoist group has an empty dependence set; a fully nest-invariant \
                 expression belongs outside the nest"
            );
        };

        // Placement: the hoisted code must be out of the fastest-varying
        // dependency and out of the outermost non-depending loop. Advance a
        // candidate placement loop until either is reached.
        let outer_free = shape.loops.iter().find(|l| !dep.contains(&l.var));
        let mut pre: Option<&LoopMeta> = None;
        for l in &shape.loops {
            let stop = l.var == *fast || outer_free.is_some_and(|o| o.var == l.var);
            if stop {
                break;
            }
            pre = Some(l);
        }

        let wrap: Vec<&LoopMeta> = if pre.is_some() {
            let meta = shape.loop_meta(fast).ok_or_else(|| {
                ForgeError::new(
                    ForgeErrorKind::Placement,
                    format!("dependence variable `{}` is not a nest loop", fast),
                )
            })?;
            vec![meta]
        } else {
            shape
                .loops
                .iter()
                .filter(|l| dep.contains(&l.var))
                .collect()
        };

        let wrap_vars: Vec<Ident> = wrap.iter().map(|l| l.var.clone()).collect();
        // The innermost wrapping loop is the fastest-varying dependency in
        // both placement shapes.
        let inner_wrap = fast.clone();

        // Temporaries are dense in the wrap variables shifted to a zero
        // base; a non-unit step or a non-constant start has no dense index,
        // so such a group stays in place.
        let mut shifts: Vec<i64> = Vec::with_capacity(wrap.len());
        for l in &wrap {
            let Bound::Const(s) = &l.start else {
                return Ok(0);
            };
            if l.step != 1 {
                return Ok(0);
            }
            shifts.push(*s);
        }

        // One fresh temporary array per expression, ranked by the extents of
        // the wrapping loops.
        let mut decls = Vec::new();
        let mut body = Vec::new();
        let mut subs = Vec::new();
        let counter = self.tmp_counters.entry(inner_wrap.clone()).or_insert(0);
        for e in exprs {
            let name = format!("LI_{}_{}", inner_wrap, counter);
            *counter += 1;
            let extents = wrap.iter().map(|l| Subscript::Lit(l.trip)).collect();
            decls.push(Stmt::Decl(Decl {
                ty,
                sym: Symbol::indexed(&name, extents),
            }));
            let use_sym = Symbol::indexed(
                &name,
                wrap_vars
                    .iter()
                    .zip(&shifts)
                    .map(|(v, s)| Subscript::Var {
                        name: v.clone(),
                        off: -s,
                    })
                    .collect(),
            );
            body.push(Stmt::Assign {
                lhs: use_sym.clone(),
                rhs: e.clone(),
            });
            subs.push((e.clone(), Expr::Symbol(use_sym)));
        }

        // Wrap the new assignments with the chosen loops, innermost first.
        let mut hoist = Stmt::Block(Block::scoped(body));
        for l in wrap.iter().rev() {
            hoist = Stmt::For(For::with_bounds(
                &l.var,
                l.start.clone(),
                l.end.clone(),
                l.step,
                vec![hoist],
            ));
        }

        match pre {
            Some(p) => {
                // Immediately after `pre`: at the front of its body, ahead of
                // the rest of the nest.
                let Some(f) = nest::loop_mut(root, &p.var) else {
                    bail!(
                        ForgeErrorKind::Placement,
                        "placement loop `{}` vanished from the nest",
                        p.var
                    );
                };
                let mut at = 0;
                for d in decls {
                    f.body.insert(at, d);
                    at += 1;
                }
                f.body.insert(at, hoist);
            }
            None => {
                // No placement point inside the nest: the hoisted loops run
                // ahead of the whole nest.
                let old = std::mem::replace(root, Stmt::Block(Block::new(Vec::new())));
                let mut stmts = decls;
                stmts.push(hoist);
                stmts.push(old);
                *root = Stmt::Block(Block::new(stmts));
            }
        }

        // Rewrite the statement to read the temporaries.
        let block = nest::innermost_block_mut(root)?;
        if let Some(Stmt::Assign { rhs, .. } | Stmt::Incr { rhs, .. }) =
            block.stmts.get_mut(stmt_idx)
        {
            for (from, to) in &subs {
                replace_expr(rhs, from, to);
            }
        }
        Ok(subs.len())
    }
}

fn replace_expr(e: &mut Expr, from: &Expr, to: &Expr) {
    if e == from {
        *e = to.clone();
        return;
    }
    match e {
        Expr::Par(inner) => replace_expr(inner, from, to),
        Expr::Binary { lhs, rhs, .. } => {
            replace_expr(lhs, from, to);
            replace_expr(rhs, from, to);
        }
        Expr::Call { args, .. } => {
            for a in args {
                replace_expr(a, from, to);
            }
        }
        Expr::Symbol(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The analyzer never records an empty dependence set; the guard in
    // `hoist_group` covers hand-built groups.
    #[test]
    fn empty_dependence_set_is_a_placement_error() {
        let body = Stmt::Block(Block::new(vec![Stmt::Assign {
            lhs: Symbol::indexed("A", vec![Subscript::var("i")]),
            rhs: Expr::sym(Symbol::indexed("B", vec![Subscript::var("i")])),
        }]));
        let mut root = Stmt::For(For::new("i", 0, 4, vec![body]));
        let shape = nest::explore(&root).unwrap();

        let mut licm = Licm::new();
        let err = licm
            .hoist_group(
                &mut root,
                &shape,
                0,
                ScalarTy::Double,
                &Vec::new(),
                &[Expr::sym(Symbol::scalar("c"))],
            )
            .unwrap_err();
        assert_eq!(err.kind, ForgeErrorKind::Placement);
    }
}
