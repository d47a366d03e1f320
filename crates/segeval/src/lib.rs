//! `segeval`: drives the segmentation metrics engine over synthetic batches.
//!
//! The batches stand in for a model and a dataset, so the engine can be
//! exercised end to end on any backend without either.

pub mod backend;
pub mod evaluate;
pub mod synthetic;

#[doc(inline)]
pub use segeval_metric as metric;
