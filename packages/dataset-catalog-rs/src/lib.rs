pub mod catalog;
pub mod store;

pub use catalog::{
    Catalog, ColumnSpec, NameResolver, PartitionConfigProvider, PartitionSpec, TableSpec,
};
pub use store::CatalogStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid catalog json: {0}")]
    Json(#[from] serde_json::Error),
}
