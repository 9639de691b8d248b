//! Warden real-time moderation
//!
//! - [`ContentInspector`]: stateless content classifiers
//! - [`SecurityState`]: per-space burst, raid, warning and verification bookkeeping
//! - [`ModerationEngine`]: event handlers, escalation and audit logging
//! - [`SecuritySweeper`]: periodic verification and raid sweeps

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod config;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod inspector;
pub mod registry;
pub mod state;
pub mod sweeper;
pub mod window;

pub use config::{ModerationConfig, SweepConfig};
pub use engine::ModerationEngine;
pub use error::{ModerationError, ModerationResult};
pub use escalation::{AuditRecord, EscalationPolicy, EscalationStep, RemediationAction};
pub use inspector::{caps_ratio, combining_marks, ContentInspector, Violation, ViolationKind};
pub use registry::{Directory, SpaceContext, SpaceRegistry};
pub use state::SecurityState;
pub use sweeper::{SecuritySweeper, SweepHandles};
pub use window::SlidingWindow;
