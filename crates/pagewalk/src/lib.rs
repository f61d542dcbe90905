//! Host-side plumbing around the `paging` walk: reading datasets, running query batches,
//! and writing results.

pub mod batch;
pub mod console;
pub mod dataset;
pub mod report;

pub use batch::{Schedule, Summary};
pub use dataset::{Dataset, DatasetError};
pub use report::ResultWriter;
