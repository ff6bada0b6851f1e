mod executor;

pub use executor::ExecutorError;
