// Register tiling: split the innermost loop into a tile loop over full tiles
// plus an affine inner loop of the tile width, bounding the live footprint of
// the inner iterations. The non-divisible tail runs as a scalar loop ahead of
// the tiled main, which is legal because tileable bodies carry no
// cross-iteration dependency beyond `Incr` accumulation.

use crate::error::Forge;
use crate::ir::*;
use crate::opt::dependence;
use crate::opt::nest;

pub struct RegisterTiler {
    tile: i64,
}

impl RegisterTiler {
    pub fn new(tile_size: usize) -> Self {
        Self {
            tile: tile_size as i64,
        }
    }

    // Returns the number of loops tiled (0 or 1).
    pub fn optimize(&self, root: &mut Stmt) -> Forge<usize> {
        let shape = nest::explore(root)?;
        let inner = shape.loops.last().cloned();
        let Some(inner) = inner else {
            return Ok(0);
        };
        if self.tile < 2 || inner.trip <= self.tile || inner.step != 1 {
            return Ok(0);
        }
        if !matches!(inner.start, Bound::Const(_)) || !matches!(inner.end, Bound::Const(_)) {
            return Ok(0);
        }
        {
            let block = nest::innermost_block(root)?;
            if !is_tileable(block, &inner.var) {
                return Ok(0);
            }
        }
        let tile = self.tile;
        let done = nest::splice_loop(root, &inner.var, |f| split(f, tile));
        Ok(done as usize)
    }
}

fn is_tileable(block: &Block, var: &str) -> bool {
    if dependence::rhs_reads_written(block) {
        return false;
    }
    block.stmts.iter().all(|s| match s {
        Stmt::Decl(_) => true,
        // A non-accumulating write must land in a distinct cell each
        // iteration.
        Stmt::Assign { lhs, .. } => lhs.mentions(var),
        Stmt::Incr { .. } => true,
        Stmt::Block(_) | Stmt::For(_) => false,
    })
}

fn split(f: For, t: i64) -> Vec<Stmt> {
    let (Bound::Const(s), Bound::Const(e)) = (f.start.clone(), f.end.clone()) else {
        return vec![Stmt::For(f)];
    };
    let full = (e - s) / t;
    let cut = s + full * t;
    let tile_var = format!("{}_b", f.var);

    let inner = For::with_bounds(
        &f.var,
        Bound::Affine {
            var: tile_var.clone(),
            scale: t,
            offset: s,
        },
        Bound::Affine {
            var: tile_var.clone(),
            scale: t,
            offset: s + t,
        },
        1,
        f.body.clone(),
    );
    let outer = For::new(&tile_var, 0, full, vec![Stmt::For(inner)]);

    let mut out = Vec::new();
    if cut < e {
        // Remainder first, so the chain continuation stays on the tiled main
        // for the later passes.
        out.push(Stmt::For(For::with_bounds(
            &f.var,
            Bound::Const(cut),
            Bound::Const(e),
            1,
            f.body,
        )));
    }
    out.push(Stmt::For(outer));
    out
}
