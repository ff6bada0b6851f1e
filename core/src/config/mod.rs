mod load;
mod types;

pub use load::{get_dagrun_data_dir, load_default};
pub use types::{AppConfig, ExecutorConfig, LoggingConfig};
