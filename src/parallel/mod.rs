pub mod batch;
pub mod pool;

pub use batch::{batch_ranges, map_isolated};
pub use pool::WorkerPool;
