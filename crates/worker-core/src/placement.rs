// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Placement policy data model (§3, §4.3).
//!
//! A [`PlacementPolicy`] constrains where a pod is scheduled: node selector,
//! tolerations, and affinity. Keyed by `JobId` in the watcher's published
//! table; `JobId == 0` is the default/fallback policy.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// `node_selector`, `tolerations`, `affinity` — the triple applied to a pod
/// at creation time. All fields are optional: an empty policy means "no
/// constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,
}

impl PlacementPolicy {
    pub fn is_empty(&self) -> bool {
        self.node_selector.is_none() && self.tolerations.is_none() && self.affinity.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toleration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}

/// Node affinity, restricted to the `NotIn`/`In` selector shape the watcher
/// needs for both operator-supplied profiles and the auto-synthesized
/// anti-affinity (§4.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affinity {
    pub required_node_selector_terms: Vec<NodeSelectorTerm>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSelectorTerm {
    pub match_expressions: Vec<NodeSelectorRequirement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSelectorRequirement {
    pub key: String,
    pub operator: NodeSelectorOperator,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum NodeSelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// Kubernetes label-key qualified-name pattern, without the optional DNS
/// subdomain prefix: `[A-Za-z0-9]([A-Za-z0-9_.-]*[A-Za-z0-9])?`, max 63.
#[allow(clippy::expect_used)]
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9_.-]{0,61}[A-Za-z0-9])?$")
        .expect("constant regex pattern is valid")
});

/// DNS-subdomain prefix pattern for a label key's `prefix/name` form.
#[allow(clippy::expect_used)]
static PREFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)*$")
        .expect("constant regex pattern is valid")
});

/// Validate a label key: optional `<dns-subdomain>/` prefix (max 253
/// chars) followed by a qualified name (max 63 chars).
pub fn is_valid_label_key(key: &str) -> bool {
    match key.split_once('/') {
        Some((prefix, name)) => {
            !prefix.is_empty()
                && prefix.len() <= 253
                && PREFIX_PATTERN.is_match(prefix)
                && !name.is_empty()
                && name.len() <= 63
                && NAME_PATTERN.is_match(name)
        }
        None => !key.is_empty() && key.len() <= 63 && NAME_PATTERN.is_match(key),
    }
}

/// Validate a label value: empty, or a qualified name up to 63 chars.
pub fn is_valid_label_value(value: &str) -> bool {
    value.is_empty() || (value.len() <= 63 && NAME_PATTERN.is_match(value))
}
