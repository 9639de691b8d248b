//! Content classifiers
//!
//! Each classifier is stateless and individually toggled by
//! [`ModerationConfig`]. [`ContentInspector::inspect`] runs every enabled
//! classifier and returns one [`Violation`] per firing.

use regex::{Regex, RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use warden_types::content::INVITE_PATTERNS;

use crate::config::ModerationConfig;
use crate::error::ModerationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Spam,
    InviteLink,
    ScamLink,
    ExcessiveCaps,
    CorruptedText,
    ExcessiveEmojis,
    ExcessiveMentions,
    Profanity,
    TooLong,
    TooManyLines,
    Manual,
}

/// A classifier firing with its human-readable label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub label: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
        }
    }

    pub fn spam() -> Self {
        Self::new(ViolationKind::Spam, "Spam detected")
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// Uppercase letters as an integer percentage of all letters; 0 when the
/// text has no letters.
pub fn caps_ratio(text: &str) -> u32 {
    let (letters, upper) = text
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0u64, 0u64), |(letters, upper), c| {
            (letters + 1, upper + u64::from(c.is_uppercase()))
        });
    if letters == 0 {
        return 0;
    }
    (upper * 100 / letters) as u32
}

fn is_combining_mark(c: char) -> bool {
    matches!(
        c,
        '\u{0300}'..='\u{036F}'
            | '\u{1AB0}'..='\u{1AFF}'
            | '\u{1DC0}'..='\u{1DFF}'
            | '\u{20D0}'..='\u{20FF}'
            | '\u{FE20}'..='\u{FE2F}'
    )
}

pub fn combining_marks(text: &str) -> usize {
    text.chars().filter(|c| is_combining_mark(*c)).count()
}

/// Stateless content classifier set
#[derive(Debug, Clone)]
pub struct ContentInspector {
    config: ModerationConfig,
    invites: RegexSet,
    custom_emoji: Regex,
}

impl ContentInspector {
    pub fn new(config: &ModerationConfig) -> ModerationResult<Self> {
        let invites = RegexSetBuilder::new(INVITE_PATTERNS)
            .case_insensitive(true)
            .build()?;
        let custom_emoji = Regex::new(r"<a?:\w+:\d+>")?;
        Ok(Self {
            config: config.clone(),
            invites,
            custom_emoji,
        })
    }

    /// Run every enabled classifier over a message
    pub fn inspect(&self, content: &str, mention_count: u32) -> Vec<Violation> {
        let mut violations = Vec::new();
        violations.extend(self.detect_links(content));
        violations.extend(self.detect_shape(content));
        violations.extend(self.detect_volume(content, mention_count));
        violations.extend(self.detect_profanity(content));
        violations
    }

    pub fn contains_invite(&self, content: &str) -> bool {
        self.invites.is_match(content)
    }

    pub fn contains_scam_link(&self, content: &str) -> bool {
        let lowered = content.to_lowercase();
        self.config
            .scam_domains
            .iter()
            .any(|domain| lowered.contains(&domain.to_lowercase()))
    }

    /// Custom emoji tokens plus characters above the emoji code point floor
    pub fn emoji_count(&self, content: &str) -> usize {
        let custom = self.custom_emoji.find_iter(content).count();
        let unicode = content.chars().filter(|c| u32::from(*c) > 127_000).count();
        custom + unicode
    }

    pub fn contains_profanity(&self, content: &str) -> bool {
        content
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .any(|word| self.config.profanity.iter().any(|p| p == word))
    }

    fn detect_links(&self, content: &str) -> Vec<Violation> {
        let mut violations = Vec::new();

        if self.config.block_invite_links && self.contains_invite(content) {
            violations.push(Violation::new(
                ViolationKind::InviteLink,
                "Unauthorized invite link",
            ));
        }

        if self.config.block_scam_links && self.contains_scam_link(content) {
            violations.push(Violation::new(
                ViolationKind::ScamLink,
                "Scam/phishing link detected",
            ));
        }

        violations
    }

    fn detect_shape(&self, content: &str) -> Vec<Violation> {
        let mut violations = Vec::new();

        if self.config.block_excessive_caps
            && content.chars().count() > self.config.caps_min_length
        {
            let ratio = caps_ratio(content);
            if ratio > self.config.max_caps_percent {
                violations.push(Violation::new(
                    ViolationKind::ExcessiveCaps,
                    format!("Excessive caps ({}%)", ratio),
                ));
            }
        }

        if self.config.block_corrupted_text
            && combining_marks(content) > self.config.max_combining_marks
        {
            violations.push(Violation::new(
                ViolationKind::CorruptedText,
                "Zalgo/corrupted text",
            ));
        }

        if self.config.detect_mass_emojis {
            let emojis = self.emoji_count(content);
            if emojis > self.config.max_emojis {
                violations.push(Violation::new(
                    ViolationKind::ExcessiveEmojis,
                    format!("Excessive emojis ({})", emojis),
                ));
            }
        }

        violations
    }

    fn detect_volume(&self, content: &str, mention_count: u32) -> Vec<Violation> {
        let mut violations = Vec::new();

        if self.config.block_mass_mentions && mention_count > self.config.max_mentions {
            violations.push(Violation::new(
                ViolationKind::ExcessiveMentions,
                format!("Excessive mentions ({})", mention_count),
            ));
        }

        if content.chars().count() > self.config.max_message_length {
            violations.push(Violation::new(ViolationKind::TooLong, "Message too long"));
        }

        let lines = content.matches('\n').count();
        if lines > self.config.max_lines {
            violations.push(Violation::new(
                ViolationKind::TooManyLines,
                format!("Excessive lines ({})", lines),
            ));
        }

        violations
    }

    fn detect_profanity(&self, content: &str) -> Vec<Violation> {
        if self.config.filter_profanity && self.contains_profanity(content) {
            vec![Violation::new(ViolationKind::Profanity, "Profanity")]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inspector() -> ContentInspector {
        ContentInspector::new(&ModerationConfig::default()).unwrap()
    }

    fn kinds(violations: &[Violation]) -> Vec<ViolationKind> {
        violations.iter().map(|v| v.kind).collect()
    }

    #[test]
    fn test_caps_ratio() {
        assert_eq!(caps_ratio("HELLO world"), 50);
        assert_eq!(caps_ratio("1234 !!!"), 0);
        assert_eq!(caps_ratio(""), 0);
        assert_eq!(caps_ratio("ABc"), 66);
    }

    #[test]
    fn test_clean_message_passes() {
        assert!(inspector().inspect("hello everyone, how is it going?", 0).is_empty());
    }

    #[test]
    fn test_invite_links_case_insensitive() {
        let v = inspector().inspect("join us at DISCORD.GG/abc123", 0);
        assert_eq!(kinds(&v), vec![ViolationKind::InviteLink]);
        assert_eq!(v[0].label, "Unauthorized invite link");
    }

    #[test]
    fn test_scam_domains() {
        let v = inspector().inspect("free nitro at https://Discord-Nitro.com/claim", 0);
        assert_eq!(kinds(&v), vec![ViolationKind::ScamLink]);
    }

    #[test]
    fn test_caps_needs_length() {
        let i = inspector();
        assert!(i.inspect("WOW OK", 0).is_empty());
        let v = i.inspect("THIS IS SO LOUD", 0);
        assert_eq!(kinds(&v), vec![ViolationKind::ExcessiveCaps]);
        assert_eq!(v[0].label, "Excessive caps (100%)");
    }

    #[test]
    fn test_digits_only_never_flag_caps() {
        assert!(inspector().inspect("1234567890123", 0).is_empty());
    }

    #[test]
    fn test_corrupted_text() {
        let zalgo: String = "h".chars().chain(std::iter::repeat('\u{0301}').take(11)).collect();
        let v = inspector().inspect(&zalgo, 0);
        assert_eq!(kinds(&v), vec![ViolationKind::CorruptedText]);
    }

    #[test]
    fn test_emoji_count() {
        let i = inspector();
        assert_eq!(i.emoji_count("<:pepe:123> <a:dance:456> 🎉"), 3);
        let flood = "🎉".repeat(16);
        assert_eq!(kinds(&i.inspect(&flood, 0)), vec![ViolationKind::ExcessiveEmojis]);
    }

    #[test]
    fn test_volume_limits() {
        let i = inspector();
        assert_eq!(kinds(&i.inspect("hi", 6)), vec![ViolationKind::ExcessiveMentions]);
        assert!(i.inspect("hi", 5).is_empty());

        let long = "a".repeat(2001);
        assert_eq!(kinds(&i.inspect(&long, 0)), vec![ViolationKind::TooLong]);

        let lines = "x\n".repeat(21);
        let v = i.inspect(&lines, 0);
        assert_eq!(kinds(&v), vec![ViolationKind::TooManyLines]);
        assert_eq!(v[0].label, "Excessive lines (21)");
    }

    #[test]
    fn test_profanity_toggle() {
        assert!(inspector().inspect("well shit", 0).is_empty());

        let config = ModerationConfig {
            filter_profanity: true,
            ..Default::default()
        };
        let i = ContentInspector::new(&config).unwrap();
        assert_eq!(kinds(&i.inspect("well SHIT", 0)), vec![ViolationKind::Profanity]);
        // Whole words only
        assert!(i.inspect("shitake mushrooms", 0).is_empty());
    }

    #[test]
    fn test_disabled_classifier_is_silent() {
        let config = ModerationConfig {
            block_invite_links: false,
            ..Default::default()
        };
        let i = ContentInspector::new(&config).unwrap();
        assert!(i.inspect("discord.gg/abc", 0).is_empty());
    }
}
