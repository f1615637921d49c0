pub mod finalize;
pub mod runner;

pub use finalize::{finalize, FinalizeError, ERROR_SUFFIX};
pub use runner::{FileError, FileOutcome, Pipeline, PipelineError, RunSummary};
