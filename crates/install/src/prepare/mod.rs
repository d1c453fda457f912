pub mod context;
pub mod executor;
pub mod worker;

pub use context::ExecutionContext;
pub use executor::ParallelExecutor;
