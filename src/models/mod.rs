//! Data models

pub mod equipment;
pub mod usage;
pub mod maintenance;
pub mod prediction;

pub use equipment::*;
pub use usage::*;
pub use maintenance::*;
pub use prediction::*;
