//! Default content deny-lists shared by the local classifiers and the
//! server-side automation rules.

/// Invite link patterns (case-insensitive regex)
pub const INVITE_PATTERNS: &[&str] = &[
    r"discord\.gg/[a-zA-Z0-9]+",
    r"discord\.com/invite/[a-zA-Z0-9]+",
    r"discordapp\.com/invite/[a-zA-Z0-9]+",
];

/// Known phishing and scam domains
pub const SCAM_DOMAINS: &[&str] = &[
    "discordgift.com",
    "discord-nitro.com",
    "steamcommuntiy.com",
    "steampovered.com",
    "discordapp.ru",
    "discord-give.com",
    "discrd.gift",
    "dlscord.com",
    "discorcl.gift",
    "steam-nitro.com",
    "free-discord-nitro.com",
    "discord-gifts.com",
    "steamcommunuty.com",
];

/// Filtered words
pub const PROFANITY: &[&str] = &[
    "fuck", "shit", "bitch", "asshole", "dick", "pussy", "cunt", "fag", "nigger", "retard",
    "whore", "slut",
];

/// Reaction that completes verification
pub const VERIFICATION_EMOJI: &str = "✅";

/// Owned copy of a constant list, for config defaults
pub fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
