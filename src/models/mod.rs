// Data models (structs)
pub mod analysis;
pub mod interview;

pub use analysis::*;
pub use interview::*;
