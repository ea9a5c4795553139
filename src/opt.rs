// Optimizer driver. Fixed pass order over one kernel's nest: hoister, tiler,
// unroll-and-jammer, peeler/padder, each gated by configuration. The engine
// owns the tree exclusively for the duration of one call and keeps no state
// across calls.

use crate::error::Forge;
use crate::ir::{Stmt, SymbolTable};
use std::env;

pub mod dependence;
pub mod licm;
pub mod nest;
pub mod peel;
pub mod tile;
pub mod unroll;

#[derive(Debug, Clone)]
pub struct OptConfig {
    pub licm: bool,
    pub tile: bool,
    pub unroll: bool,
    pub peel: bool,
    pub tile_size: usize,
    pub unroll_factor: usize,
    pub vector_width: usize,
}

impl Default for OptConfig {
    fn default() -> Self {
        Self {
            licm: true,
            tile: true,
            unroll: true,
            peel: true,
            tile_size: 4,
            unroll_factor: 2,
            vector_width: 4,
        }
    }
}

impl OptConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            licm: env_bool("LOOPFORGE_LICM", d.licm),
            tile: env_bool("LOOPFORGE_TILE", d.tile),
            unroll: env_bool("LOOPFORGE_UNROLL", d.unroll),
            peel: env_bool("LOOPFORGE_PEEL", d.peel),
            tile_size: env_usize("LOOPFORGE_TILE_SIZE", d.tile_size),
            unroll_factor: env_usize("LOOPFORGE_UNROLL_FACTOR", d.unroll_factor),
            vector_width: env_usize("LOOPFORGE_VECTOR_WIDTH", d.vector_width),
        }
    }

    pub fn passes_off() -> Self {
        Self {
            licm: false,
            tile: false,
            unroll: false,
            peel: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ForgePassStats {
    pub hoisted_exprs: usize,
    pub tiled_loops: usize,
    pub unrolled_loops: usize,
    pub peeled_loops: usize,
    pub padded_decls: usize,
}

impl ForgePassStats {
    pub fn accumulate(&mut self, other: Self) {
        self.hoisted_exprs += other.hoisted_exprs;
        self.tiled_loops += other.tiled_loops;
        self.unrolled_loops += other.unrolled_loops;
        self.peeled_loops += other.peeled_loops;
        self.padded_decls += other.padded_decls;
    }
}

pub struct ForgeEngine {
    config: OptConfig,
}

impl ForgeEngine {
    pub fn new() -> Self {
        Self {
            config: OptConfig::from_env(),
        }
    }

    pub fn with_config(config: OptConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptConfig {
        &self.config
    }

    pub fn run(&self, kernel: &mut Stmt, symbols: &SymbolTable) -> Forge<ForgePassStats> {
        let mut stats = ForgePassStats::default();

        // Validate the shape up front so a malformed tree fails before any
        // pass touches it.
        nest::explore(kernel)?;

        if self.config.licm {
            let mut licm = licm::Licm::new();
            stats.hoisted_exprs += licm.optimize(kernel, symbols)?;
            Self::trace("licm", kernel);
        }

        if self.config.tile {
            let tiler = tile::RegisterTiler::new(self.config.tile_size);
            stats.tiled_loops += tiler.optimize(kernel)?;
            Self::trace("tile", kernel);
        }

        if self.config.unroll {
            let jammer = unroll::UnrollJammer::new(self.config.unroll_factor);
            stats.unrolled_loops += jammer.optimize(kernel)?;
            Self::trace("unroll-and-jam", kernel);
        }

        if self.config.peel {
            let peeler = peel::Peeler::new(self.config.vector_width);
            stats.peeled_loops += peeler.peel(kernel)?;
            stats.padded_decls += peeler.pad(kernel)?;
            Self::trace("peel", kernel);
        }

        Ok(stats)
    }

    fn trace(stage: &str, kernel: &Stmt) {
        if env_bool("LOOPFORGE_TRACE_PASSES", false) {
            eprintln!("== after {} ==\n{}", stage, kernel);
        }
    }
}

impl Default for ForgeEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn env_bool(key: &str, default_v: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default_v,
    }
}

fn env_usize(key: &str, default_v: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default_v)
}
