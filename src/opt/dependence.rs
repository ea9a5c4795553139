// Dependence and invariance classification of expression trees. LICM here is
// tailored to read-only assembly bodies: only symbols never written inside
// the nest count as invariant sources, and a sub-expression keeps climbing
// while its children agree on dependence, so only maximal invariant regions
// are committed to a hoist group.

use crate::bail_node;
use crate::error::{Forge, ForgeErrorKind};
use crate::ir::*;
use rustc_hash::FxHashSet;

// Iteration variables an expression varies with, in nest order (outer to
// inner); the last entry is the fastest-varying dependency.
pub type DepSet = Vec<Ident>;

// Grouping accumulator threaded through the recursion: dependence set to the
// hoistable expressions sharing it. Insertion-ordered so temporary naming is
// deterministic; structurally equal expressions are recorded once.
#[derive(Debug, Default)]
pub struct ExprGroups {
    groups: Vec<(DepSet, Vec<Expr>)>,
}

impl ExprGroups {
    pub fn record(&mut self, dep: DepSet, expr: &Expr) {
        if let Some((_, exprs)) = self.groups.iter_mut().find(|(d, _)| *d == dep) {
            if !exprs.contains(expr) {
                exprs.push(expr.clone());
            }
        } else {
            self.groups.push((dep, vec![expr.clone()]));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(DepSet, Vec<Expr>)> {
        self.groups.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }
}

// Write targets of a statement block, computed once per nest.
pub fn written_targets(block: &Block) -> FxHashSet<Ident> {
    let mut written = FxHashSet::default();
    for s in &block.stmts {
        if let Some(sym) = s.write_target() {
            written.insert(sym.name.clone());
        }
    }
    written
}

// True if any right-hand side in the block reads a symbol the block also
// writes (other than through `Incr` accumulation into the same target).
// Tiling and unroll-and-jam refuse such bodies: they would carry a
// cross-iteration dependency.
pub fn rhs_reads_written(block: &Block) -> bool {
    let written = written_targets(block);
    for s in &block.stmts {
        let rhs = match s {
            Stmt::Assign { rhs, .. } | Stmt::Incr { rhs, .. } => rhs,
            _ => continue,
        };
        let mut found = false;
        rhs.each_symbol(&mut |sym| {
            if written.contains(&sym.name) {
                found = true;
            }
        });
        if found {
            return true;
        }
    }
    false
}

pub struct DependenceAnalyzer<'a> {
    nest_vars: &'a [Ident],
    written: &'a FxHashSet<Ident>,
}

impl<'a> DependenceAnalyzer<'a> {
    pub fn new(nest_vars: &'a [Ident], written: &'a FxHashSet<Ident>) -> Self {
        Self { nest_vars, written }
    }

    // Bottom-up walk returning (dependence set, invariant flag) and filling
    // `groups` with maximal invariant sub-expressions found at mismatch
    // points. Bare symbols are never recorded on their own.
    pub fn analyze(&self, expr: &Expr, groups: &mut ExprGroups) -> Forge<(DepSet, bool)> {
        match expr {
            Expr::Symbol(s) => Ok((
                s.loop_dep(self.nest_vars),
                !self.written.contains(&s.name),
            )),
            Expr::Par(inner) => self.analyze(inner, groups),
            Expr::Binary { lhs, rhs, .. } => {
                let (dep_l, inv_l) = self.analyze(lhs, groups)?;
                let (dep_r, inv_r) = self.analyze(rhs, groups)?;
                if dep_l == dep_r {
                    // Children match up; keep climbing, this node may itself
                    // sit inside a larger invariant region.
                    Ok((dep_l, inv_l && inv_r))
                } else if dep_l.is_empty() {
                    // The empty side still taints the node: a mismatch child
                    // came back (empty, false), and hoisting this node under
                    // the other side's loops would strand its variables.
                    Ok((dep_r, inv_l && inv_r))
                } else if dep_r.is_empty() {
                    Ok((dep_l, inv_l && inv_r))
                } else {
                    // Mismatching iteration variables: commit each child that
                    // was invariant w.r.t. some loops and is more than a
                    // plain symbol.
                    if inv_l && !matches!(**lhs, Expr::Symbol(_)) {
                        groups.record(dep_l, lhs);
                    }
                    if inv_r && !matches!(**rhs, Expr::Symbol(_)) {
                        groups.record(dep_r, rhs);
                    }
                    Ok((Vec::new(), false))
                }
            }
            Expr::Call { name, .. } => bail_node!(
                ForgeErrorKind::UnsupportedExpression,
                expr,
                "cannot classify call to `{}`",
                name
            ),
        }
    }
}
