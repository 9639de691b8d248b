//! Warden space reconstruction
//!
//! Brings a space to the layout described by a [`Catalog`]:
//! purge what exists, then create roles, categories, channels, alert hooks
//! and automation rules in phase order. Progress is broadcast as
//! [`ProgressEvent`]s and a [`HealthReport`] compares any live space against
//! the catalog.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod catalog;
pub mod config;
pub mod diff;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod overwrites;
pub mod progress;
pub mod state;

pub use catalog::{
    AutomationRuleKind, AutomationRuleTemplate, Catalog, CategoryTemplate, ChannelTemplate,
    RoleTemplate,
};
pub use config::{AutoModConfig, ReconcileConfig};
pub use diff::{diff_catalog, diff_names, CatalogDiff, NameDiff};
pub use error::{ReconcileError, ReconcileResult};
pub use health::{HealthReport, HealthVerdict, KindHealth, SecurityPosture};
pub use orchestrator::{DeploymentHook, NoopHook, Reconciler};
pub use progress::{DeploymentSummary, PhaseStatus, ProgressEvent};
pub use state::{DeploymentCounters, DeploymentPhase, DeploymentState};
