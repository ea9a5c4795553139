// Unroll-and-jam: unroll an outer loop by a factor and fuse the duplicated
// bodies into the existing inner loop control, shifting subscripts by the
// copy offset. Statements invariant across the copies are kept once; whole
// preamble loops that depend on the unroll variable (a splitting pass may
// have left one) are duplicated as units.

use crate::error::Forge;
use crate::ir::*;
use crate::opt::nest::{self, NestShape};
use rustc_hash::FxHashSet;

pub struct UnrollJammer {
    factor: i64,
}

impl UnrollJammer {
    pub fn new(factor: usize) -> Self {
        Self {
            factor: factor as i64,
        }
    }

    // Returns the number of loops unrolled (0 or 1).
    pub fn optimize(&self, root: &mut Stmt) -> Forge<usize> {
        if self.factor < 2 {
            return Ok(0);
        }
        let shape = nest::explore(root)?;
        if shape.depth() < 2 {
            return Ok(0);
        }
        // Scan outward from the second-innermost loop for a jammable target.
        for li in (0..shape.depth() - 1).rev() {
            let target = &shape.loops[li];
            if target.step != 1 || target.trip < self.factor {
                continue;
            }
            if !matches!(target.start, Bound::Const(_)) || !matches!(target.end, Bound::Const(_))
            {
                continue;
            }
            if !jammable(root, &shape, li) {
                continue;
            }
            let u = self.factor;
            let var = target.var.clone();
            let done = nest::splice_loop(root, &var, |f| jam(f, u));
            return Ok(done as usize);
        }
        Ok(0)
    }
}

fn jammable(root: &Stmt, shape: &NestShape, li: usize) -> bool {
    let var = &shape.loops[li].var;
    // Every chain loop between the target and the body must iterate
    // independently of the target variable, or the copies cannot share one
    // set of inner loops.
    for l in &shape.loops[li + 1..] {
        if l.start.mentions(var) || l.end.mentions(var) {
            return false;
        }
    }
    let Some(target) = find_loop(root, var) else {
        return false;
    };
    let mut writes: Vec<(&Symbol, &Expr)> = Vec::new();
    for s in &target.body {
        collect_writes(s, &mut writes);
    }
    let written: FxHashSet<&str> = writes.iter().map(|(l, _)| l.name.as_str()).collect();
    writes.iter().all(|(lhs, rhs)| {
        // Reading a written target would carry a dependency across copies.
        let mut reads_written = false;
        rhs.each_symbol(&mut |sym| {
            if written.contains(sym.name.as_str()) {
                reads_written = true;
            }
        });
        if reads_written {
            return false;
        }
        if lhs.mentions(var) || rhs.mentions(var) {
            // A copy-dependent value must land in a copy-distinct cell, or
            // accumulate.
            lhs.mentions(var)
        } else {
            // Identical across copies: kept once, so it must be a plain
            // reassignment, not an accumulation.
            true
        }
    }) && all_incrs_copy_distinct(&target.body, var)
}

// An `Incr` identical across the copies would double-count when kept once.
fn all_incrs_copy_distinct(stmts: &[Stmt], var: &str) -> bool {
    stmts.iter().all(|s| match s {
        Stmt::Incr { lhs, rhs } => lhs.mentions(var) || rhs.mentions(var),
        Stmt::Block(b) => all_incrs_copy_distinct(&b.stmts, var),
        Stmt::For(f) => all_incrs_copy_distinct(&f.body, var),
        _ => true,
    })
}

fn find_loop<'a>(node: &'a Stmt, var: &str) -> Option<&'a For> {
    match node {
        Stmt::For(f) => {
            if f.var == var {
                Some(f)
            } else {
                find_loop(f.body.last()?, var)
            }
        }
        Stmt::Block(b) => find_loop(b.stmts.last()?, var),
        _ => None,
    }
}

fn collect_writes<'a>(s: &'a Stmt, out: &mut Vec<(&'a Symbol, &'a Expr)>) {
    match s {
        Stmt::Assign { lhs, rhs } | Stmt::Incr { lhs, rhs } => out.push((lhs, rhs)),
        Stmt::Block(b) => {
            for s in &b.stmts {
                collect_writes(s, out);
            }
        }
        Stmt::For(f) => {
            for s in &f.body {
                collect_writes(s, out);
            }
        }
        Stmt::Decl(_) => {}
    }
}

fn jam(f: For, u: i64) -> Vec<Stmt> {
    let (Bound::Const(s), Bound::Const(e)) = (f.start.clone(), f.end.clone()) else {
        return vec![Stmt::For(f)];
    };
    let full = ((e - s) / u) * u;
    let cut = s + full;
    let var = f.var.clone();

    let rem = if cut < e {
        let mut r = f.clone();
        r.start = Bound::Const(cut);
        Some(Stmt::For(r))
    } else {
        None
    };

    let mut main = f;
    main.end = Bound::Const(cut);
    main.step = u;
    jam_children(&mut main.body, &var, u);

    match rem {
        // Remainder ahead of the main loop keeps the chain continuation on
        // the jammed main; the body is iteration-independent, so the order
        // swap is safe.
        Some(r) => vec![r, Stmt::For(main)],
        None => vec![Stmt::For(main)],
    }
}

// Walk the chain below the unrolled loop. Preamble children that depend on
// the unroll variable are duplicated whole; the innermost statement list is
// duplicated statement by statement, fused under the shared loop control.
fn jam_children(children: &mut Vec<Stmt>, var: &str, u: i64) {
    let continues = matches!(children.last(), Some(Stmt::For(_) | Stmt::Block(_)));
    if continues {
        let mut tail = children.pop().unwrap();
        let mut out = Vec::new();
        for s in children.drain(..) {
            push_copies(&mut out, s, var, u);
        }
        match &mut tail {
            Stmt::For(f) => jam_children(&mut f.body, var, u),
            Stmt::Block(b) => jam_children(&mut b.stmts, var, u),
            _ => unreachable!(),
        }
        out.push(tail);
        *children = out;
    } else {
        let orig = std::mem::take(children);
        for s in orig {
            push_copies(children, s, var, u);
        }
    }
}

fn push_copies(out: &mut Vec<Stmt>, s: Stmt, var: &str, u: i64) {
    if s.mentions(var) {
        for c in 0..u {
            out.push(shift_stmt(s.clone(), var, c));
        }
    } else {
        out.push(s);
    }
}

fn shift_stmt(s: Stmt, var: &str, c: i64) -> Stmt {
    match s {
        Stmt::Decl(d) => Stmt::Decl(d),
        Stmt::Assign { mut lhs, mut rhs } => {
            shift_symbol(&mut lhs, var, c);
            shift_expr(&mut rhs, var, c);
            Stmt::Assign { lhs, rhs }
        }
        Stmt::Incr { mut lhs, mut rhs } => {
            shift_symbol(&mut lhs, var, c);
            shift_expr(&mut rhs, var, c);
            Stmt::Incr { lhs, rhs }
        }
        Stmt::Block(mut b) => {
            b.stmts = b
                .stmts
                .into_iter()
                .map(|s| shift_stmt(s, var, c))
                .collect();
            Stmt::Block(b)
        }
        Stmt::For(mut f) => {
            shift_bound(&mut f.start, var, c);
            shift_bound(&mut f.end, var, c);
            f.body = f.body.into_iter().map(|s| shift_stmt(s, var, c)).collect();
            Stmt::For(f)
        }
    }
}

fn shift_expr(e: &mut Expr, var: &str, c: i64) {
    match e {
        Expr::Symbol(s) => shift_symbol(s, var, c),
        Expr::Par(inner) => shift_expr(inner, var, c),
        Expr::Binary { lhs, rhs, .. } => {
            shift_expr(lhs, var, c);
            shift_expr(rhs, var, c);
        }
        Expr::Call { args, .. } => {
            for a in args {
                shift_expr(a, var, c);
            }
        }
    }
}

fn shift_symbol(sym: &mut Symbol, var: &str, c: i64) {
    for sub in &mut sym.rank {
        if let Subscript::Var { name, off } = sub {
            if name == var {
                *off += c;
            }
        }
    }
}

fn shift_bound(b: &mut Bound, var: &str, c: i64) {
    if let Bound::Affine {
        var: v,
        scale,
        offset,
    } = b
    {
        if v == var {
            *offset += c * *scale;
        }
    }
}
