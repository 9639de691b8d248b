//! Event ingestion seam
//!
//! The transport layer owns the session with the remote service and calls
//! into this trait once per inbound event. Implementations must not assume
//! events for one space arrive serially.

use async_trait::async_trait;

use crate::events::{
    BanChanged, MemberJoined, MemberLeft, MessageDeleted, MessageEdited, MessagePosted,
    ReactionAdded, VoiceStateChanged,
};
use crate::ids::SpaceId;

#[async_trait]
pub trait SpaceEventHandler: Send + Sync {
    /// The process gained access to a space
    async fn on_space_join(&self, space: SpaceId);

    /// The process lost access to a space; all per-space state is dropped
    async fn on_space_leave(&self, space: SpaceId);

    async fn on_member_join(&self, event: MemberJoined);

    async fn on_member_leave(&self, event: MemberLeft);

    async fn on_message(&self, event: MessagePosted);

    async fn on_reaction_add(&self, event: ReactionAdded);

    async fn on_message_edit(&self, event: MessageEdited);

    async fn on_message_delete(&self, event: MessageDeleted);

    async fn on_ban(&self, event: BanChanged);

    async fn on_unban(&self, event: BanChanged);

    async fn on_voice_state_change(&self, event: VoiceStateChanged);
}
