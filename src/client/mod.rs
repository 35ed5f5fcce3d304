//! Client side of the progress API: an HTTP client and the per-course cache
//! UI code reads completion state from.

pub mod api;
pub mod cache;

pub use api::{ClientError, CompletionSubmission, HttpProgressApi, ProgressApi};
pub use cache::{ProgressCache, ProgressSnapshot, SubjectAction};
