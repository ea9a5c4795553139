pub mod error;
pub mod ir;
pub mod opt;

pub use error::{Forge, ForgeError, ForgeErrorKind};
pub use opt::{ForgeEngine, ForgePassStats, OptConfig};
