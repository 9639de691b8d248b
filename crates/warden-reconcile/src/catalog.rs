//! Desired structure of a managed space.
//!
//! The catalog is pure data: roles, categories, channels and automation rule
//! templates, referencing each other by name. [`Catalog::standard`] ships the
//! default layout; deployments may load their own.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use warden_types::{ChannelKind, LogCategory, PermissionSet, RoleSpec};

use crate::error::{ReconcileError, ReconcileResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTemplate {
    pub name: String,
    pub color: u32,
    pub permissions: PermissionSet,
    pub position: u32,
    pub hoist: bool,
    pub mentionable: bool,
}

impl RoleTemplate {
    fn new(name: &str, color: u32, permissions: PermissionSet, position: u32) -> Self {
        Self {
            name: name.to_string(),
            color,
            permissions,
            position,
            hoist: true,
            mentionable: false,
        }
    }

    fn unhoisted(mut self) -> Self {
        self.hoist = false;
        self
    }

    fn mentionable(mut self) -> Self {
        self.mentionable = true;
        self
    }

    pub fn to_spec(&self) -> RoleSpec {
        RoleSpec {
            name: self.name.clone(),
            color: self.color,
            permissions: self.permissions.clone(),
            position: self.position,
            hoist: self.hoist,
            mentionable: self.mentionable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTemplate {
    pub name: String,
    pub position: u32,
    /// Roles granted access; everyone else is denied
    pub allowed_roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTemplate {
    pub name: String,
    pub category: String,
    pub kind: ChannelKind,
    #[serde(default)]
    pub topic: Option<String>,
    /// Posted once after creation
    #[serde(default)]
    pub initial_message: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub slowmode_secs: u32,
}

impl ChannelTemplate {
    fn text(name: &str, category: &str, topic: &str) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            kind: ChannelKind::Text,
            topic: Some(topic.to_string()),
            initial_message: None,
            read_only: false,
            slowmode_secs: 0,
        }
    }

    fn voice(name: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            kind: ChannelKind::Voice,
            topic: None,
            initial_message: None,
            read_only: false,
            slowmode_secs: 0,
        }
    }

    fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    fn slowmode(mut self, secs: u32) -> Self {
        self.slowmode_secs = secs;
        self
    }

    fn message(mut self, text: &str) -> Self {
        self.initial_message = Some(text.to_string());
        self
    }

    /// The audit log category this channel backs, if any
    pub fn log_category(&self) -> Option<LogCategory> {
        LogCategory::from_channel_name(&self.name)
    }
}

/// Which server-side filter a rule template describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationRuleKind {
    InviteLinks,
    ScamLinks,
    MassMentions,
    Profanity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationRuleTemplate {
    pub name: String,
    pub kind: AutomationRuleKind,
    /// Channel that receives alerts when the rule fires
    #[serde(default)]
    pub alert_channel: Option<String>,
    /// Whether a firing also times the author out
    #[serde(default)]
    pub applies_timeout: bool,
    pub exempt_roles: Vec<String>,
}

/// The full desired layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub roles: Vec<RoleTemplate>,
    pub categories: Vec<CategoryTemplate>,
    pub channels: Vec<ChannelTemplate>,
    pub automation_rules: Vec<AutomationRuleTemplate>,
    /// Channel whose initial message receives the verification reaction
    pub verification_channel: String,
}

const ADMIN_TIER: &[&str] = &["Admin", "Head Admin", "Co-Owner", "Server Owner"];
const MOD_TIER: &[&str] = &[
    "Moderator",
    "Senior Mod",
    "Admin",
    "Head Admin",
    "Co-Owner",
    "Server Owner",
];
const STAFF_TIER: &[&str] = &[
    "Helper",
    "Moderator",
    "Senior Mod",
    "Admin",
    "Head Admin",
    "Co-Owner",
    "Server Owner",
];

const INFO: &str = "SERVER INFO";
const GENERAL: &str = "GENERAL";
const OPERATIONS: &str = "OSINT OPERATIONS";
const ANALYSIS: &str = "ANALYSIS & REPORTS";
const VOICE: &str = "VOICE CHANNELS";
const COMMANDS: &str = "BOT COMMANDS";
const STAFF: &str = "STAFF AREA";
const ADMINISTRATION: &str = "ADMINISTRATION";

const RULES_TEXT: &str = "**SPACE RULES**

Not allowed:
- Sharing personal or private information
- NSFW, violent or illegal content
- Malicious tooling or attacks
- Harassment or coordinated raids
- Spam, flooding or excessive caps
- Invite links, scam links and mass mentions
- Alternate accounts used to evade bans

Research guidelines:
- Defensive research only, from public sources
- Respect privacy and document your methodology

Enforcement:
- Violations are removed immediately
- Three warnings result in a timeout
- Serious violations result in a ban
- Every action is logged";

const VERIFICATION_TEXT: &str = "**VERIFICATION REQUIRED**

React with ✅ below to unlock the rest of the space.

By verifying you confirm that you have read the rules, are not evading a ban \
with an alternate account, and will not engage in malicious activity.

Accounts younger than 7 days may be reviewed by staff.
Unverified members are removed after 60 minutes.";

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn with_bots(mut roles: Vec<String>) -> Vec<String> {
    roles.push("Bots".to_string());
    roles
}

impl Catalog {
    /// The default layout
    pub fn standard() -> Self {
        let roles = vec![
            RoleTemplate::new("Server Owner", 0x000001, PermissionSet::administrator(), 11),
            RoleTemplate::new("Co-Owner", 0x2C2F33, PermissionSet::administrator(), 10),
            RoleTemplate::new("Head Admin", 0xE74C3C, PermissionSet::administrator(), 9),
            RoleTemplate::new("Admin", 0xE67E22, PermissionSet::moderator(), 8),
            RoleTemplate::new("Senior Mod", 0xF39C12, PermissionSet::moderator(), 7),
            RoleTemplate::new("Moderator", 0xF1C40F, PermissionSet::moderator(), 6),
            RoleTemplate::new("Helper", 0x3498DB, PermissionSet::moderator(), 5),
            RoleTemplate::new("Verified", 0x2ECC71, PermissionSet::member(), 4),
            RoleTemplate::new("Member", 0x95A5A6, PermissionSet::member(), 3),
            RoleTemplate::new("Unverified", 0x99AAB5, PermissionSet::read_only(), 2).unhoisted(),
            RoleTemplate::new("Bots", 0x5865F2, PermissionSet::automation(), 1)
                .unhoisted()
                .mentionable(),
        ];

        let verified_up = {
            let mut v = vec!["Verified".to_string()];
            v.extend(names(STAFF_TIER));
            v
        };
        let member_up = {
            let mut v = vec!["Member".to_string()];
            v.extend(verified_up.clone());
            v
        };
        let everyone_up = {
            let mut v = vec!["Unverified".to_string()];
            v.extend(member_up.clone());
            v
        };

        let category = |name: &str, position: u32, allowed: Vec<String>| CategoryTemplate {
            name: name.to_string(),
            position,
            allowed_roles: with_bots(allowed),
        };

        let categories = vec![
            category(INFO, 0, everyone_up),
            category(GENERAL, 1, member_up.clone()),
            category(OPERATIONS, 2, verified_up.clone()),
            category(ANALYSIS, 3, verified_up),
            category(VOICE, 4, member_up.clone()),
            category(COMMANDS, 5, member_up),
            category(STAFF, 6, names(STAFF_TIER)),
            category(ADMINISTRATION, 7, names(ADMIN_TIER)),
        ];

        let channels = vec![
            ChannelTemplate::text("rules", INFO, "Rules and community guidelines")
                .read_only()
                .message(RULES_TEXT),
            ChannelTemplate::text("verify", INFO, "Complete verification to access the space")
                .read_only()
                .message(VERIFICATION_TEXT),
            ChannelTemplate::text("welcome", INFO, "Welcome new members").read_only(),
            ChannelTemplate::text("announcements", INFO, "Important updates and announcements")
                .read_only(),
            ChannelTemplate::text("updates", INFO, "Feature updates and changelog").read_only(),
            ChannelTemplate::text("roles", INFO, "Role and permission information").read_only(),
            ChannelTemplate::text("general", GENERAL, "Main discussion, stay on topic")
                .slowmode(5),
            ChannelTemplate::text("casual", GENERAL, "Off-topic conversation").slowmode(3),
            ChannelTemplate::text("media", GENERAL, "Images, video and other media").slowmode(10),
            ChannelTemplate::text("questions", GENERAL, "Ask the community for help"),
            ChannelTemplate::text("osint-general", OPERATIONS, "General techniques discussion"),
            ChannelTemplate::text("tools-resources", OPERATIONS, "Tools, scripts and resources"),
            ChannelTemplate::text("geoint", OPERATIONS, "Geospatial intelligence and mapping"),
            ChannelTemplate::text("socmint", OPERATIONS, "Social media intelligence"),
            ChannelTemplate::text("investigations", OPERATIONS, "Active investigation work"),
            ChannelTemplate::text("threat-intel", ANALYSIS, "Threat intelligence sharing"),
            ChannelTemplate::text("reports", ANALYSIS, "Investigation reports and findings"),
            ChannelTemplate::text("data-analysis", ANALYSIS, "Data processing and statistics"),
            ChannelTemplate::voice("general-voice", VOICE),
            ChannelTemplate::voice("meeting-room", VOICE),
            ChannelTemplate::voice("study-room", VOICE),
            ChannelTemplate::text("bot-commands", COMMANDS, "Use bot commands here"),
            ChannelTemplate::text("bot-spam", COMMANDS, "Bot output and testing"),
            ChannelTemplate::text("staff-chat", STAFF, "Private staff discussion"),
            ChannelTemplate::voice("staff-voice", STAFF),
            ChannelTemplate::text("admin-chat", ADMINISTRATION, "Admin-only discussion"),
            ChannelTemplate::text("audit-log", ADMINISTRATION, "Complete audit trail").read_only(),
            ChannelTemplate::text("message-logs", ADMINISTRATION, "Message edit and delete logs")
                .read_only(),
            ChannelTemplate::text("member-logs", ADMINISTRATION, "Member join, leave and ban logs")
                .read_only(),
            ChannelTemplate::text("mod-logs", ADMINISTRATION, "Moderation action logs").read_only(),
            ChannelTemplate::text("security-logs", ADMINISTRATION, "Security and anti-raid logs")
                .read_only(),
            ChannelTemplate::text("voice-logs", ADMINISTRATION, "Voice activity logs").read_only(),
            ChannelTemplate::text("automod-logs", ADMINISTRATION, "Automation rule alerts")
                .read_only(),
            ChannelTemplate::text("reports-inbox", ADMINISTRATION, "Member reports and tickets")
                .read_only(),
        ];

        let automation_rules = vec![
            AutomationRuleTemplate {
                name: "Block Discord Invites".to_string(),
                kind: AutomationRuleKind::InviteLinks,
                alert_channel: Some("automod-logs".to_string()),
                applies_timeout: false,
                exempt_roles: {
                    let mut v = vec!["Verified".to_string()];
                    v.extend(names(STAFF_TIER));
                    v
                },
            },
            AutomationRuleTemplate {
                name: "Block Scam Links".to_string(),
                kind: AutomationRuleKind::ScamLinks,
                alert_channel: Some("security-logs".to_string()),
                applies_timeout: true,
                exempt_roles: names(ADMIN_TIER),
            },
            AutomationRuleTemplate {
                name: "Block Mass Mentions".to_string(),
                kind: AutomationRuleKind::MassMentions,
                alert_channel: None,
                applies_timeout: true,
                exempt_roles: names(MOD_TIER),
            },
            AutomationRuleTemplate {
                name: "Profanity Filter".to_string(),
                kind: AutomationRuleKind::Profanity,
                alert_channel: Some("automod-logs".to_string()),
                applies_timeout: false,
                exempt_roles: names(STAFF_TIER),
            },
        ];

        Self {
            roles,
            categories,
            channels,
            automation_rules,
            verification_channel: "verify".to_string(),
        }
    }

    pub fn role_names(&self) -> BTreeSet<String> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }

    pub fn category_names(&self) -> BTreeSet<String> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }

    pub fn channel_names(&self) -> BTreeSet<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    /// Check that every cross-reference resolves
    pub fn validate(&self) -> ReconcileResult<()> {
        let roles = self.role_names();
        let categories = self.category_names();
        let channels = self.channel_names();

        if roles.len() != self.roles.len() {
            return Err(ReconcileError::Catalog("duplicate role names".into()));
        }
        if channels.len() != self.channels.len() {
            return Err(ReconcileError::Catalog("duplicate channel names".into()));
        }

        for category in &self.categories {
            if let Some(role) = category.allowed_roles.iter().find(|r| !roles.contains(*r)) {
                return Err(ReconcileError::Catalog(format!(
                    "category {} allows unknown role {}",
                    category.name, role
                )));
            }
        }

        for channel in &self.channels {
            if !categories.contains(&channel.category) {
                return Err(ReconcileError::Catalog(format!(
                    "channel {} references unknown category {}",
                    channel.name, channel.category
                )));
            }
        }

        for rule in &self.automation_rules {
            if let Some(alert) = &rule.alert_channel {
                if !channels.contains(alert) {
                    return Err(ReconcileError::Catalog(format!(
                        "rule {} alerts unknown channel {}",
                        rule.name, alert
                    )));
                }
            }
            if let Some(role) = rule.exempt_roles.iter().find(|r| !roles.contains(*r)) {
                return Err(ReconcileError::Catalog(format!(
                    "rule {} exempts unknown role {}",
                    rule.name, role
                )));
            }
        }

        if !channels.contains(&self.verification_channel) {
            return Err(ReconcileError::Catalog(format!(
                "verification channel {} is not in the catalog",
                self.verification_channel
            )));
        }

        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_shape() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.roles.len(), 11);
        assert_eq!(catalog.categories.len(), 8);
        assert_eq!(catalog.channels.len(), 34);
        assert_eq!(catalog.automation_rules.len(), 4);
        assert!(catalog.validate().is_ok());
    }

    #[test]
    fn test_every_log_category_has_a_channel() {
        let catalog = Catalog::standard();
        for category in LogCategory::ALL {
            assert!(catalog
                .channels
                .iter()
                .any(|c| c.log_category() == Some(category)));
        }
    }

    #[test]
    fn test_bots_reach_every_category() {
        let catalog = Catalog::standard();
        assert!(catalog
            .categories
            .iter()
            .all(|c| c.allowed_roles.iter().any(|r| r == "Bots")));
    }

    #[test]
    fn test_validate_rejects_dangling_category() {
        let mut catalog = Catalog::standard();
        catalog.channels[0].category = "NOWHERE".to_string();
        assert!(matches!(catalog.validate(), Err(ReconcileError::Catalog(_))));
    }

    #[test]
    fn test_unverified_only_sees_server_info() {
        let catalog = Catalog::standard();
        let visible: Vec<_> = catalog
            .categories
            .iter()
            .filter(|c| c.allowed_roles.iter().any(|r| r == "Unverified"))
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(visible, vec![INFO]);
    }
}
