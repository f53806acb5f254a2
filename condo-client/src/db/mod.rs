pub mod split_queries;
pub mod split_snapshot_queries;

pub use split_queries::*;
pub use split_snapshot_queries::{save_split_snapshot, SplitSnapshot};
