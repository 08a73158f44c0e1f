pub mod analysis;
pub mod config;
mod context;
mod error;
pub mod shutdown;

pub use argo_cfa as cfa;

pub use context::AnalysisContext;
pub use error::{CpaError, Reason, RefinementFailure};
