pub mod def;
pub mod display;

pub use def::*;
