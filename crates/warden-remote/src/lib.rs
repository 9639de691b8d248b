//! Warden remote service layer
//!
//! - [`RemoteService`]: the seam to the platform that owns every space
//! - [`ResilientExecutor`]: classification-driven retry with exponential backoff
//! - [`BatchExecutor`]: many operations under a shared permit pool
//! - [`InMemoryRemote`]: a faithful in-process service with fault injection

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod batch;
pub mod config;
pub mod error;
pub mod memory;
pub mod resilience;
pub mod service;

pub use batch::{BatchExecutor, BatchItem, BatchReport};
pub use config::{BatchConfig, RetryConfig};
pub use error::{FailureClass, RemoteError, RemoteResult};
pub use memory::{AppliedTimeout, InMemoryRemote, PostedMessage, RemoteCall, RemoteOp};
pub use resilience::{Backoff, OperationFailure, OperationOutcome, ResilientExecutor};
pub use service::RemoteService;
