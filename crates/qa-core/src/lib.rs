#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Shared types for the autoqa browser-QA platform: the error taxonomy,
//! retry backoff, and the memory-pressure signal every other crate reacts
//! to.

mod error;
mod pressure;
mod retry;

pub use crate::error::{BoxError, Error, ErrorKind};
pub use crate::pressure::{MemoryThresholds, Pressure, ProcessMemoryMonitor, ResourceMonitor, Snapshot};
pub use crate::retry::RetryPolicy;

/// Specialized [`Result`] used across the platform's core layers.
pub type Result<T, E = Error> = std::result::Result<T, E>;
