//! Post-deployment health report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use warden_types::{RemoteResource, ResourceKind, SpaceId};

use crate::catalog::Catalog;
use crate::diff::{diff_catalog, NameDiff};

/// Missing resources at or above this count make the report critical
pub const CRITICAL_MISSING: usize = 5;

/// Expected vs found for one resource kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindHealth {
    pub kind: ResourceKind,
    pub expected: usize,
    pub found: usize,
    pub missing: Vec<String>,
    pub extra: Vec<String>,
}

impl KindHealth {
    /// `expected` is the catalog's name count; everything observed is
    /// either expected and present or extra
    pub fn from_diff(kind: ResourceKind, expected: usize, diff: NameDiff) -> Self {
        Self {
            kind,
            expected,
            found: expected - diff.missing.len() + diff.extra.len(),
            missing: diff.missing.into_iter().collect(),
            extra: diff.extra.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "missing", rename_all = "snake_case")]
pub enum HealthVerdict {
    Perfect,
    MinorIssues(usize),
    Critical(usize),
}

impl HealthVerdict {
    pub fn from_missing(missing: usize) -> Self {
        match missing {
            0 => HealthVerdict::Perfect,
            n if n < CRITICAL_MISSING => HealthVerdict::MinorIssues(n),
            n => HealthVerdict::Critical(n),
        }
    }
}

impl fmt::Display for HealthVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthVerdict::Perfect => write!(f, "perfect"),
            HealthVerdict::MinorIssues(n) => write!(f, "minor issues ({} missing)", n),
            HealthVerdict::Critical(n) => write!(f, "critical ({} missing)", n),
        }
    }
}

/// Moderation-side facts folded into the report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPosture {
    pub lockdown_active: bool,
    pub pending_verifications: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub space: SpaceId,
    pub roles: KindHealth,
    pub categories: KindHealth,
    pub channels: KindHealth,
    pub automation_rules: usize,
    pub posture: SecurityPosture,
    pub verdict: HealthVerdict,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    /// Compare a live inventory against the catalog
    pub fn assess(
        space: SpaceId,
        catalog: &Catalog,
        observed: &[RemoteResource],
        posture: SecurityPosture,
        checked_at: DateTime<Utc>,
    ) -> Self {
        let diff = diff_catalog(catalog, observed);
        let missing = diff.total_missing();

        let roles = KindHealth::from_diff(ResourceKind::Role, catalog.role_names().len(), diff.roles);
        let categories = KindHealth::from_diff(
            ResourceKind::Category,
            catalog.category_names().len(),
            diff.categories,
        );
        let channels = KindHealth::from_diff(
            ResourceKind::Channel,
            catalog.channel_names().len(),
            diff.channels,
        );

        let automation_rules = observed
            .iter()
            .filter(|r| r.kind == ResourceKind::AutomationRule)
            .count();

        Self {
            space,
            roles,
            categories,
            channels,
            automation_rules,
            posture,
            verdict: HealthVerdict::from_missing(missing),
            checked_at,
        }
    }

    pub fn total_missing(&self) -> usize {
        self.roles.missing.len() + self.categories.missing.len() + self.channels.missing.len()
    }

    pub fn is_healthy(&self) -> bool {
        self.verdict == HealthVerdict::Perfect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_types::ResourceId;

    fn inventory(catalog: &Catalog) -> Vec<RemoteResource> {
        let mut next = 0u64;
        let mut id = || {
            next += 1;
            ResourceId::new(next)
        };
        let mut out = Vec::new();
        for r in &catalog.roles {
            out.push(RemoteResource::new(id(), ResourceKind::Role, r.name.clone()));
        }
        for c in &catalog.categories {
            out.push(RemoteResource::new(id(), ResourceKind::Category, c.name.clone()));
        }
        for c in &catalog.channels {
            out.push(RemoteResource::new(id(), ResourceKind::Channel, c.name.clone()));
        }
        out
    }

    #[test]
    fn test_verdict_thresholds() {
        assert_eq!(HealthVerdict::from_missing(0), HealthVerdict::Perfect);
        assert_eq!(HealthVerdict::from_missing(4), HealthVerdict::MinorIssues(4));
        assert_eq!(HealthVerdict::from_missing(5), HealthVerdict::Critical(5));
    }

    #[test]
    fn test_complete_space_is_perfect() {
        let catalog = Catalog::standard();
        let mut observed = inventory(&catalog);
        observed.push(RemoteResource::new(
            ResourceId::new(500),
            ResourceKind::AutomationRule,
            "Block Scam Links",
        ));

        let report = HealthReport::assess(
            SpaceId::new(1),
            &catalog,
            &observed,
            SecurityPosture::default(),
            Utc::now(),
        );

        assert!(report.is_healthy());
        assert_eq!(report.roles.found, 11);
        assert_eq!(report.channels.expected, 34);
        assert_eq!(report.automation_rules, 1);
    }

    #[test]
    fn test_missing_channels_degrade_verdict() {
        let catalog = Catalog::standard();
        let observed: Vec<_> = inventory(&catalog)
            .into_iter()
            .filter(|r| r.name != "general" && r.name != "casual")
            .collect();

        let report = HealthReport::assess(
            SpaceId::new(1),
            &catalog,
            &observed,
            SecurityPosture {
                lockdown_active: true,
                pending_verifications: 2,
            },
            Utc::now(),
        );

        assert_eq!(report.verdict, HealthVerdict::MinorIssues(2));
        assert_eq!(report.channels.missing, vec!["casual", "general"]);
        assert!(report.posture.lockdown_active);
    }

    #[test]
    fn test_report_follows_the_differ() {
        let catalog = Catalog::standard();
        let mut observed: Vec<_> = inventory(&catalog)
            .into_iter()
            .filter(|r| r.name != "Member")
            .collect();
        observed.push(RemoteResource::new(
            ResourceId::new(900),
            ResourceKind::Channel,
            "old-chat",
        ));
        let mut everyone = RemoteResource::new(ResourceId::new(901), ResourceKind::Role, "@everyone");
        everyone.system = true;
        observed.push(everyone);

        let diff = diff_catalog(&catalog, &observed);
        let report = HealthReport::assess(
            SpaceId::new(1),
            &catalog,
            &observed,
            SecurityPosture::default(),
            Utc::now(),
        );

        assert_eq!(report.total_missing(), diff.total_missing());
        assert_eq!(report.roles.missing, vec!["Member"]);
        assert_eq!(report.roles.found, 10);
        assert!(report.roles.extra.is_empty());
        assert_eq!(report.channels.extra, vec!["old-chat"]);
        assert_eq!(report.channels.found, 35);
        assert_eq!(report.verdict, HealthVerdict::MinorIssues(1));
    }

    #[test]
    fn test_empty_space_is_critical() {
        let report = HealthReport::assess(
            SpaceId::new(1),
            &Catalog::standard(),
            &[],
            SecurityPosture::default(),
            Utc::now(),
        );
        assert_eq!(report.verdict, HealthVerdict::Critical(53));
        assert_eq!(report.total_missing(), 53);
    }
}
