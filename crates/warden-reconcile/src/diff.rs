//! Catalog differ
//!
//! Pure set comparisons between what a space should contain and what it
//! does contain. Used to pick purge targets and to build health reports.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use warden_types::{RemoteResource, ResourceId, ResourceKind};

use crate::catalog::Catalog;

/// Names expected but absent, and names present but not expected
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameDiff {
    pub missing: BTreeSet<String>,
    pub extra: BTreeSet<String>,
}

impl NameDiff {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

pub fn diff_names(expected: &BTreeSet<String>, observed: &BTreeSet<String>) -> NameDiff {
    NameDiff {
        missing: expected.difference(observed).cloned().collect(),
        extra: observed.difference(expected).cloned().collect(),
    }
}

/// Per-kind comparison of a catalog against a live inventory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDiff {
    pub roles: NameDiff,
    pub categories: NameDiff,
    pub channels: NameDiff,
}

impl CatalogDiff {
    pub fn total_missing(&self) -> usize {
        self.roles.missing.len() + self.categories.missing.len() + self.channels.missing.len()
    }
}

/// Names of user-visible resources of one kind; system and managed roles
/// are never part of the comparison.
pub fn observed_names(observed: &[RemoteResource], kind: ResourceKind) -> BTreeSet<String> {
    observed
        .iter()
        .filter(|r| r.kind == kind)
        .filter(|r| kind != ResourceKind::Role || r.is_purgeable_role())
        .map(|r| r.name.clone())
        .collect()
}

pub fn diff_catalog(catalog: &Catalog, observed: &[RemoteResource]) -> CatalogDiff {
    CatalogDiff {
        roles: diff_names(
            &catalog.role_names(),
            &observed_names(observed, ResourceKind::Role),
        ),
        categories: diff_names(
            &catalog.category_names(),
            &observed_names(observed, ResourceKind::Category),
        ),
        channels: diff_names(
            &catalog.channel_names(),
            &observed_names(observed, ResourceKind::Channel),
        ),
    }
}

/// Resources of `kind` outside the keep-set, i.e. what a purge removes.
///
/// Keyed by id so duplicate names are all targeted.
pub fn purge_targets(
    observed: &[RemoteResource],
    kind: ResourceKind,
    keep: &HashSet<ResourceId>,
) -> Vec<RemoteResource> {
    observed
        .iter()
        .filter(|r| r.kind == kind && !keep.contains(&r.id))
        .filter(|r| kind != ResourceKind::Role || r.is_purgeable_role())
        .cloned()
        .collect()
}
