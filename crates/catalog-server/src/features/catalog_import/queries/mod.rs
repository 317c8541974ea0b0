pub mod get_batch;
pub mod list_batches;

pub use get_batch::{GetBatchError, GetBatchQuery, GetBatchResponse, ImportRowView};
pub use list_batches::{ListBatchesError, ListBatchesQuery, ListBatchesResponse};
