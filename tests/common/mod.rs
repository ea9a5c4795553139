// Shared helpers for the integration tests: terse IR builders plus a small
// reference interpreter that executes a kernel over named arrays and counts
// arithmetic operations, so the tests can check both that a transformation
// preserves results and that it actually removed work.

#![allow(dead_code)]

use loopforge::ir::*;
use rustc_hash::FxHashMap;

pub fn ix(name: &str) -> Subscript {
    Subscript::var(name)
}

pub fn ix_off(name: &str, off: i64) -> Subscript {
    Subscript::Var {
        name: name.to_string(),
        off,
    }
}

pub fn a1(name: &str, i: &str) -> Symbol {
    Symbol::indexed(name, vec![ix(i)])
}

pub fn a2(name: &str, i: &str, j: &str) -> Symbol {
    Symbol::indexed(name, vec![ix(i), ix(j)])
}

pub fn e1(name: &str, i: &str) -> Expr {
    Expr::sym(a1(name, i))
}

pub fn e2(name: &str, i: &str, j: &str) -> Expr {
    Expr::sym(a2(name, i, j))
}

pub fn esc(name: &str) -> Expr {
    Expr::sym(Symbol::scalar(name))
}

pub fn mul(lhs: Expr, rhs: Expr) -> Expr {
    Expr::bin(BinOp::Mul, lhs, rhs)
}

pub fn add(lhs: Expr, rhs: Expr) -> Expr {
    Expr::bin(BinOp::Add, lhs, rhs)
}

// Builds a perfect nest over unit-stride zero-based loops, outermost first,
// with `body` as the terminal statement list.
pub fn nest(loops: &[(&str, i64)], body: Vec<Stmt>) -> Stmt {
    let mut node = Stmt::Block(Block::new(body));
    for (var, n) in loops.iter().rev() {
        node = Stmt::For(For::new(var, 0, *n, vec![node]));
    }
    node
}

#[derive(Debug, Clone, Default)]
pub struct Tape {
    pub arrays: FxHashMap<String, (Vec<usize>, Vec<f64>)>,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn array(&mut self, name: &str, shape: &[usize], data: Vec<f64>) {
        assert_eq!(shape.iter().product::<usize>(), data.len());
        self.arrays.insert(name.to_string(), (shape.to_vec(), data));
    }

    pub fn zeros(&mut self, name: &str, shape: &[usize]) {
        let n = shape.iter().product();
        self.array(name, shape, vec![0.0; n]);
    }

    pub fn scalar(&mut self, name: &str, v: f64) {
        self.array(name, &[], vec![v]);
    }

    // Deterministic non-trivial fill, so equivalence checks exercise every
    // cell with a distinct value.
    pub fn ramp(&mut self, name: &str, shape: &[usize]) {
        let n: usize = shape.iter().product();
        let data = (0..n).map(|k| 0.5 + 1.25 * k as f64).collect();
        self.array(name, shape, data);
    }

    pub fn values(&self, name: &str) -> &[f64] {
        &self
            .arrays
            .get(name)
            .unwrap_or_else(|| panic!("unknown array `{name}`"))
            .1
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalStats {
    pub muls: usize,
    pub adds: usize,
    pub subs: usize,
    pub divs: usize,
}

pub fn run(kernel: &Stmt, tape: &mut Tape) -> EvalStats {
    let mut env = FxHashMap::default();
    let mut stats = EvalStats::default();
    exec(kernel, tape, &mut env, &mut stats);
    stats
}

fn exec(s: &Stmt, tape: &mut Tape, env: &mut FxHashMap<String, i64>, stats: &mut EvalStats) {
    match s {
        Stmt::Decl(d) => {
            let shape: Vec<usize> = d
                .sym
                .rank
                .iter()
                .map(|sub| match sub {
                    Subscript::Lit(n) => *n as usize,
                    Subscript::Var { .. } => panic!("declaration extent is not a literal"),
                })
                .collect();
            tape.zeros(&d.sym.name, &shape);
        }
        Stmt::Assign { lhs, rhs } => {
            let v = eval(rhs, tape, env, stats);
            store(tape, env, lhs, v, false);
        }
        Stmt::Incr { lhs, rhs } => {
            let v = eval(rhs, tape, env, stats);
            stats.adds += 1;
            store(tape, env, lhs, v, true);
        }
        Stmt::Block(b) => {
            for s in &b.stmts {
                exec(s, tape, env, stats);
            }
        }
        Stmt::For(f) => {
            let start = bound(&f.start, env);
            let end = bound(&f.end, env);
            let mut i = start;
            while i < end {
                env.insert(f.var.clone(), i);
                for s in &f.body {
                    exec(s, tape, env, stats);
                }
                i += f.step;
            }
        }
    }
}

fn bound(b: &Bound, env: &FxHashMap<String, i64>) -> i64 {
    match b {
        Bound::Const(n) => *n,
        Bound::Affine { var, scale, offset } => env[var] * scale + offset,
    }
}

fn flat_index(sym: &Symbol, shape: &[usize], env: &FxHashMap<String, i64>) -> usize {
    assert_eq!(
        sym.rank.len(),
        shape.len(),
        "`{}` referenced with the wrong rank",
        sym.name
    );
    let mut idx = 0usize;
    for (sub, dim) in sym.rank.iter().zip(shape) {
        let k = match sub {
            Subscript::Var { name, off } => env[name] + off,
            Subscript::Lit(n) => *n,
        };
        assert!(
            (0..*dim as i64).contains(&k),
            "`{}` subscript {k} out of bounds 0..{dim}",
            sym.name
        );
        idx = idx * dim + k as usize;
    }
    idx
}

fn eval(e: &Expr, tape: &Tape, env: &FxHashMap<String, i64>, stats: &mut EvalStats) -> f64 {
    match e {
        Expr::Symbol(s) => {
            let (shape, data) = tape
                .arrays
                .get(&s.name)
                .unwrap_or_else(|| panic!("unknown symbol `{}`", s.name));
            data[flat_index(s, shape, env)]
        }
        Expr::Par(inner) => eval(inner, tape, env, stats),
        Expr::Binary { op, lhs, rhs } => {
            let l = eval(lhs, tape, env, stats);
            let r = eval(rhs, tape, env, stats);
            match op {
                BinOp::Add => {
                    stats.adds += 1;
                    l + r
                }
                BinOp::Sub => {
                    stats.subs += 1;
                    l - r
                }
                BinOp::Mul => {
                    stats.muls += 1;
                    l * r
                }
                BinOp::Div => {
                    stats.divs += 1;
                    l / r
                }
            }
        }
        Expr::Call { name, .. } => panic!("cannot evaluate call to `{name}`"),
    }
}

fn store(tape: &mut Tape, env: &FxHashMap<String, i64>, lhs: &Symbol, v: f64, incr: bool) {
    let (shape, data) = tape
        .arrays
        .get_mut(&lhs.name)
        .unwrap_or_else(|| panic!("assignment to undeclared `{}`", lhs.name));
    let idx = flat_index(lhs, shape, env);
    if incr {
        data[idx] += v;
    } else {
        data[idx] = v;
    }
}

// Runs both kernels on copies of the same tape and checks the named outputs
// agree. Padded temporaries may differ in extent, so comparison stops at the
// shorter array.
pub fn assert_equivalent(original: &Stmt, optimized: &Stmt, tape: &Tape, outputs: &[&str]) {
    let mut ta = tape.clone();
    let mut tb = tape.clone();
    run(original, &mut ta);
    run(optimized, &mut tb);
    for name in outputs {
        let a = ta.values(name);
        let b = tb.values(name);
        let n = a.len().min(b.len());
        for k in 0..n {
            assert!(
                (a[k] - b[k]).abs() < 1e-9,
                "`{name}`[{k}] diverged: {} vs {}",
                a[k],
                b[k]
            );
        }
    }
}
