//! Work distribution: chunk planning, the worker pool and progress tracking

pub mod chunk;
pub mod pool;
pub mod progress;

pub use chunk::*;
pub use pool::*;
pub use progress::*;
