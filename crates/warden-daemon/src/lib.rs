//! Warden daemon library
//!
//! - [`Warden`]: the core, implementing the command surface and the event
//!   handler seam on top of reconstruction and moderation
//! - [`WardenConfig`]: layered configuration

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod command;
pub mod config;
pub mod error;
pub mod warden;

pub use command::CommandSurface;
pub use config::{LoggingConfig, RemoteConfig, WardenConfig};
pub use error::{DaemonError, DaemonResult};
pub use warden::{RegistryFinalizer, Warden};
