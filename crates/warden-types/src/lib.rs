//! Warden shared types
//!
//! Vocabulary shared by every warden crate:
//! - identifiers for spaces, members, resources and deployment runs
//! - the remote resource model and creation requests
//! - permission sets and overwrites
//! - inbound activity events and the handler seam that receives them
//! - audit log categories and sinks
//! - default content deny-lists

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod content;
pub mod events;
pub mod handler;
pub mod ids;
pub mod permissions;
pub mod resource;
pub mod sinks;

pub use events::{
    Actor, BanChanged, ChannelRef, MemberJoined, MemberLeft, MessageDeleted, MessageEdited,
    MessagePosted, ReactionAdded, VoicePresence, VoiceStateChanged, VoiceTransition,
};
pub use handler::SpaceEventHandler;
pub use ids::{DeploymentId, MessageId, ResourceId, SpaceId, UserId};
pub use permissions::{OverwriteTarget, Permission, PermissionOverwrite, PermissionSet};
pub use resource::{
    AutomationRuleSpec, CategorySpec, ChannelKind, ChannelSpec, RemoteResource, ResourceKind,
    RoleSpec, RuleAction, RuleTrigger, VerificationLevel,
};
pub use sinks::{LogCategory, LogSinks};
