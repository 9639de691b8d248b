//! Inbound activity events delivered by the transport layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, ResourceId, SpaceId, UserId};

/// Identity of the account that triggered an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub display_name: String,
    #[serde(default)]
    pub is_bot: bool,
    /// Names of the roles the actor currently holds
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Actor {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            is_bot: false,
            roles: Vec::new(),
        }
    }

    pub fn bot(mut self) -> Self {
        self.is_bot = true;
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn holds_any(&self, roles: &[String]) -> bool {
        self.roles.iter().any(|r| roles.contains(r))
    }
}

/// A reference to a channel as seen in an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: ResourceId,
    pub name: String,
}

impl ChannelRef {
    pub fn new(id: ResourceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberJoined {
    pub space: SpaceId,
    pub member: Actor,
    pub account_created_at: DateTime<Utc>,
    pub has_avatar: bool,
    pub member_count: u64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberLeft {
    pub space: SpaceId,
    pub member: Actor,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePosted {
    pub space: SpaceId,
    pub channel: ChannelRef,
    pub message_id: MessageId,
    pub author: Actor,
    pub content: String,
    #[serde(default)]
    pub mention_count: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionAdded {
    pub space: SpaceId,
    pub channel: ChannelRef,
    pub message_id: MessageId,
    pub member: Actor,
    pub emoji: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEdited {
    pub space: SpaceId,
    pub channel: ChannelRef,
    pub message_id: MessageId,
    pub author: Actor,
    pub before: String,
    pub after: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeleted {
    pub space: SpaceId,
    pub channel: ChannelRef,
    pub message_id: MessageId,
    pub author: Actor,
    pub content: String,
    #[serde(default)]
    pub attachment_count: u32,
    pub at: DateTime<Utc>,
}

/// Ban or unban of an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanChanged {
    pub space: SpaceId,
    pub user: Actor,
    /// Reason recorded on the remote audit trail, if any
    #[serde(default)]
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// Voice presence snapshot on one side of a transition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoicePresence {
    pub channel: Option<ChannelRef>,
    #[serde(default)]
    pub self_mute: bool,
    #[serde(default)]
    pub self_deaf: bool,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub video: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceStateChanged {
    pub space: SpaceId,
    pub member: Actor,
    pub before: VoicePresence,
    pub after: VoicePresence,
    pub at: DateTime<Utc>,
}

/// Classified voice transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceTransition {
    Joined(ChannelRef),
    Left(ChannelRef),
    Moved { from: ChannelRef, to: ChannelRef },
    StateChanged { channel: ChannelRef, changes: Vec<String> },
}

impl VoiceStateChanged {
    /// Classify the transition; `None` when nothing observable changed
    pub fn transition(&self) -> Option<VoiceTransition> {
        match (&self.before.channel, &self.after.channel) {
            (None, Some(to)) => Some(VoiceTransition::Joined(to.clone())),
            (Some(from), None) => Some(VoiceTransition::Left(from.clone())),
            (Some(from), Some(to)) if from.id != to.id => Some(VoiceTransition::Moved {
                from: from.clone(),
                to: to.clone(),
            }),
            (Some(_), Some(channel)) => {
                let mut changes = Vec::new();
                if self.before.self_mute != self.after.self_mute {
                    changes.push(format!("self mute: {}", self.after.self_mute));
                }
                if self.before.self_deaf != self.after.self_deaf {
                    changes.push(format!("self deafen: {}", self.after.self_deaf));
                }
                if self.before.streaming != self.after.streaming {
                    changes.push(format!("streaming: {}", self.after.streaming));
                }
                if self.before.video != self.after.video {
                    changes.push(format!("video: {}", self.after.video));
                }
                if changes.is_empty() {
                    None
                } else {
                    Some(VoiceTransition::StateChanged {
                        channel: channel.clone(),
                        changes,
                    })
                }
            }
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(channel: Option<(u64, &str)>) -> VoicePresence {
        VoicePresence {
            channel: channel.map(|(id, name)| ChannelRef::new(ResourceId::new(id), name)),
            ..Default::default()
        }
    }

    fn change(before: VoicePresence, after: VoicePresence) -> VoiceStateChanged {
        VoiceStateChanged {
            space: SpaceId::new(1),
            member: Actor::new(UserId::new(2), "alice"),
            before,
            after,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_voice_transitions() {
        let joined = change(voice(None), voice(Some((10, "general-voice"))));
        assert!(matches!(joined.transition(), Some(VoiceTransition::Joined(_))));

        let left = change(voice(Some((10, "general-voice"))), voice(None));
        assert!(matches!(left.transition(), Some(VoiceTransition::Left(_))));

        let moved = change(voice(Some((10, "a"))), voice(Some((11, "b"))));
        assert!(matches!(moved.transition(), Some(VoiceTransition::Moved { .. })));

        let idle = change(voice(Some((10, "a"))), voice(Some((10, "a"))));
        assert_eq!(idle.transition(), None);
    }

    #[test]
    fn test_voice_state_change_lists_flags() {
        let mut after = voice(Some((10, "a")));
        after.self_mute = true;
        after.video = true;
        let event = change(voice(Some((10, "a"))), after);
        match event.transition() {
            Some(VoiceTransition::StateChanged { changes, .. }) => {
                assert_eq!(changes.len(), 2);
                assert!(changes[0].contains("self mute"));
            }
            other => panic!("unexpected transition: {:?}", other),
        }
    }

    #[test]
    fn test_actor_role_lookup() {
        let actor = Actor::new(UserId::new(1), "bob").with_roles(["Member", "Helper"]);
        assert!(actor.holds_any(&["Helper".to_string()]));
        assert!(!actor.holds_any(&["Admin".to_string()]));
    }
}
