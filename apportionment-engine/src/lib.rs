pub mod config;
pub mod consumption;
pub mod diagnostic;
pub mod electricity;
pub mod error;
pub mod gas;
pub mod observability;
pub mod quota;
pub mod season;
pub mod settings;
pub mod source;
pub mod split;

#[cfg(test)]
mod test_support;

pub use error::SplitError;
pub use settings::SplitSettings;
pub use source::{load_csv_dir, MemorySource, PgSource, SplitDataSource};
pub use split::{apportion, SplitEngine, SplitKind, SplitResult};
