#![no_main]

use loopforge::ir::*;
use loopforge::opt::nest;
use loopforge::{ForgeEngine, OptConfig};
use libfuzzer_sys::fuzz_target;

struct Bytes<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Bytes<'_> {
    fn next(&mut self) -> u8 {
        let b = self.data.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        b
    }
}

fn pick_sym(b: &mut Bytes, rank_vars: &[&str]) -> Symbol {
    let arrays = ["A", "B", "C", "D"];
    let name = arrays[b.next() as usize % arrays.len()];
    let rank = rank_vars
        .iter()
        .map(|v| Subscript::Var {
            name: v.to_string(),
            off: (b.next() % 3) as i64 - 1,
        })
        .collect();
    Symbol::indexed(name, rank)
}

// Turns the input bytes into a small random nest and runs the whole pass
// pipeline over it. The pipeline must never panic, and an accepted kernel
// must still be a walkable chain afterwards.
fuzz_target!(|data: &[u8]| {
    let mut b = Bytes { data, pos: 0 };

    let vars = ["i", "j", "k"];
    let depth = 1 + (b.next() as usize % 3);
    let nest_vars = &vars[..depth];

    let ops = [BinOp::Add, BinOp::Sub, BinOp::Mul, BinOp::Div];
    let nstmts = 1 + (b.next() as usize % 3);
    let mut stmts = Vec::new();
    for _ in 0..nstmts {
        // Subscripts draw from random tail subsets of the iteration
        // variables, so dependence sets of every shape come up.
        let lo = b.next() as usize % depth;
        let lhs = pick_sym(&mut b, &nest_vars[lo..]);
        let x = Expr::sym(pick_sym(&mut b, &nest_vars[b.next() as usize % depth..]));
        let y = Expr::sym(pick_sym(&mut b, &nest_vars[b.next() as usize % depth..]));
        let z = Expr::sym(pick_sym(&mut b, &nest_vars[b.next() as usize % depth..]));
        let rhs = Expr::bin(
            ops[b.next() as usize % ops.len()],
            Expr::par(Expr::bin(ops[b.next() as usize % ops.len()], x, y)),
            z,
        );
        stmts.push(if b.next() % 2 == 0 {
            Stmt::Assign { lhs, rhs }
        } else {
            Stmt::Incr { lhs, rhs }
        });
    }

    let mut kernel = Stmt::Block(Block::new(stmts));
    for v in nest_vars.iter().rev() {
        let start = (b.next() % 4) as i64;
        let span = 1 + (b.next() % 16) as i64;
        kernel = Stmt::For(For::with_bounds(
            v,
            Bound::Const(start),
            Bound::Const(start + span),
            1 + (b.next() % 3) as i64,
            vec![kernel],
        ));
    }

    let config = OptConfig {
        licm: b.next() % 2 == 0,
        tile: b.next() % 2 == 0,
        unroll: b.next() % 2 == 0,
        peel: b.next() % 2 == 0,
        tile_size: (b.next() % 8) as usize,
        unroll_factor: (b.next() % 6) as usize,
        vector_width: (b.next() % 10) as usize,
    };

    let symbols = SymbolTable::default();
    let engine = ForgeEngine::with_config(config);
    if engine.run(&mut kernel, &symbols).is_ok() {
        nest::explore(&kernel).expect("optimized kernel no longer explores");
    }
});
