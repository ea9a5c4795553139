// Peeling and padding for vectorization: split a non-divisible innermost trip
// count into a vectorizable main loop plus a scalar remainder, and round
// locally declared unit-stride extents up to the vector width so their start
// addresses stay alignable.

use crate::error::Forge;
use crate::ir::*;
use crate::opt::nest;
use rustc_hash::FxHashSet;

pub struct Peeler {
    width: i64,
}

impl Peeler {
    pub fn new(vector_width: usize) -> Self {
        Self {
            width: vector_width as i64,
        }
    }

    // Returns the number of loops split. A trip count already divisible by
    // the width is only flagged vectorizable.
    pub fn peel(&self, root: &mut Stmt) -> Forge<usize> {
        let shape = nest::explore(root)?;
        let inner = shape.loops.last().cloned();
        let Some(inner) = inner else {
            return Ok(0);
        };
        let w = self.width;
        if w < 2 || inner.step != 1 {
            return Ok(0);
        }
        let main_trip = (inner.trip / w) * w;
        if main_trip == 0 {
            // Too short for even one vector; left scalar.
            return Ok(0);
        }
        if inner.trip % w == 0 {
            if let Some(f) = nest::loop_mut(root, &inner.var) {
                f.vectorize = true;
            }
            return Ok(0);
        }
        let done = nest::splice_loop(root, &inner.var, |f| split(f, main_trip));
        Ok(done as usize)
    }

    // Returns the number of declarations padded.
    pub fn pad(&self, root: &mut Stmt) -> Forge<usize> {
        let shape = nest::explore(root)?;
        let Some(inner) = shape.loops.last() else {
            return Ok(0);
        };
        if self.width < 2 {
            return Ok(0);
        }
        // Unit stride: the last subscript of a reference is the innermost
        // iteration variable.
        let mut unit_stride: FxHashSet<Ident> = FxHashSet::default();
        collect_unit_stride(root, &inner.var, &mut unit_stride);
        let mut padded = 0;
        pad_decls(root, &unit_stride, self.width, &mut padded);
        Ok(padded)
    }
}

fn split(f: For, main_trip: i64) -> Vec<Stmt> {
    let mut main = f.clone();
    main.end = f.start.offset_by(main_trip * f.step);
    main.vectorize = true;

    let mut rem = f;
    rem.start = rem.start.offset_by(main_trip * rem.step);
    rem.vectorize = false;

    // Main first, remainder covering the tail after it.
    vec![Stmt::For(main), Stmt::For(rem)]
}

fn collect_unit_stride(s: &Stmt, var: &str, out: &mut FxHashSet<Ident>) {
    let mut note = |sym: &Symbol| {
        if let Some(last) = sym.rank.last() {
            if last.mentions(var) {
                out.insert(sym.name.clone());
            }
        }
    };
    match s {
        Stmt::Decl(_) => {}
        Stmt::Assign { lhs, rhs } | Stmt::Incr { lhs, rhs } => {
            note(lhs);
            rhs.each_symbol(&mut note);
        }
        Stmt::Block(b) => {
            for s in &b.stmts {
                collect_unit_stride(s, var, out);
            }
        }
        Stmt::For(f) => {
            for s in &f.body {
                collect_unit_stride(s, var, out);
            }
        }
    }
}

fn pad_decls(s: &mut Stmt, unit_stride: &FxHashSet<Ident>, w: i64, padded: &mut usize) {
    match s {
        Stmt::Decl(d) => {
            if !unit_stride.contains(&d.sym.name) {
                return;
            }
            if let Some(Subscript::Lit(n)) = d.sym.rank.last_mut() {
                if *n % w != 0 {
                    *n += w - *n % w;
                    *padded += 1;
                }
            }
        }
        Stmt::Assign { .. } | Stmt::Incr { .. } => {}
        Stmt::Block(b) => {
            for s in &mut b.stmts {
                pad_decls(s, unit_stride, w, padded);
            }
        }
        Stmt::For(f) => {
            for s in &mut f.body {
                pad_decls(s, unit_stride, w, padded);
            }
        }
    }
}
