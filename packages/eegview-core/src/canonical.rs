//! Mapping of raw channel labels onto catalog electrode names.
//!
//! Labels are matched in input order and each canonical name is consumed at
//! most once, so the resulting [`ChannelMapping`] is injective. A label that
//! would resolve to a name already taken stays unmapped.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::catalog::ElectrodeCatalog;
use crate::types::{ChannelDescriptor, ChannelType};

/// Substrings removed from labels, longest first so "CHANNEL" is not left as "ANNEL"
const DECORATION_TOKENS: &[&str] = &["CHANNEL", "CH", "EEG", "REF"];

const DECORATION_CHARS: &[char] = &['.', ' ', '-', '_'];

/// Separator between the two electrodes of a bipolar derivation
const BIPOLAR_SEPARATOR: char = '-';

/// Shortest string allowed to match by containment
const MIN_CONTAINMENT_LEN: usize = 2;

/// Which rule produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Exact,
    Bipolar,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedChannel {
    /// Position of the raw label in the input
    pub index: usize,
    pub raw_label: String,
    pub canonical: &'static str,
    pub rule: MatchRule,
}

/// Injective raw label → canonical name assignment for one recording
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelMapping {
    pub mapped: Vec<MappedChannel>,
    /// Indices of raw labels left without a canonical name
    pub unmapped: Vec<usize>,
}

impl ChannelMapping {
    pub fn get(&self, index: usize) -> Option<&MappedChannel> {
        self.mapped.iter().find(|m| m.index == index)
    }

    pub fn canonical_for(&self, raw_label: &str) -> Option<&'static str> {
        self.mapped
            .iter()
            .find(|m| m.raw_label == raw_label)
            .map(|m| m.canonical)
    }

    pub fn len(&self) -> usize {
        self.mapped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapped.is_empty()
    }
}

/// Uppercase a label and strip decoration tokens and separators.
pub fn normalize_label(raw: &str) -> String {
    let mut label = raw.to_uppercase();
    for token in DECORATION_TOKENS {
        label = label.replace(token, "");
    }
    label.retain(|c| !DECORATION_CHARS.contains(&c));
    label
}

/// First electrode token of a bipolar label such as "EEG Fp1-F7".
///
/// Both sides of the separator must normalize to something, which keeps
/// "Fp1-Ref" a referential label.
fn bipolar_first_token(raw: &str) -> Option<String> {
    let (first, second) = raw.split_once(BIPOLAR_SEPARATOR)?;
    let first = normalize_label(first);
    let second = normalize_label(second);
    if first.is_empty() || second.is_empty() {
        return None;
    }
    Some(first)
}

fn fuzzy_match(label: &str, key: &str) -> bool {
    if key.len() >= MIN_CONTAINMENT_LEN && label.contains(key) {
        return true;
    }
    if label.len() >= MIN_CONTAINMENT_LEN && key.contains(label) {
        return true;
    }
    let label_stripped = label.replace('Z', "");
    let key_stripped = key.replace('Z', "");
    !label_stripped.is_empty() && label_stripped == key_stripped
}

/// Map raw labels to catalog names, reserving each name on first use.
pub fn canonicalize(labels: &[String], catalog: &ElectrodeCatalog) -> ChannelMapping {
    let mut used: HashSet<&'static str> = HashSet::new();
    let mut mapping = ChannelMapping::default();

    for (index, raw) in labels.iter().enumerate() {
        let normalized = normalize_label(raw);
        if normalized.is_empty() {
            mapping.unmapped.push(index);
            continue;
        }

        let free = |name: &str| !used.contains(name);

        let found = catalog
            .index_of(&normalized)
            .map(|i| (i, MatchRule::Exact))
            .filter(|(i, _)| catalog.get(*i).is_some_and(|e| free(e.name)))
            .or_else(|| {
                let first = bipolar_first_token(raw)?;
                catalog
                    .index_of(&first)
                    .filter(|&i| catalog.get(i).is_some_and(|e| free(e.name)))
                    .map(|i| (i, MatchRule::Bipolar))
            })
            .or_else(|| {
                catalog
                    .iter()
                    .position(|e| free(e.name) && fuzzy_match(&normalized, e.name))
                    .map(|i| (i, MatchRule::Fuzzy))
            })
            .and_then(|(i, rule)| catalog.get(i).map(|e| (e.name, rule)));

        match found {
            Some((canonical, rule)) => {
                used.insert(canonical);
                mapping.mapped.push(MappedChannel {
                    index,
                    raw_label: raw.clone(),
                    canonical,
                    rule,
                });
            }
            None => {
                log::debug!(
                    "stage=canonicalizer left '{}' unmapped (normalized '{}')",
                    raw,
                    normalized
                );
                mapping.unmapped.push(index);
            }
        }
    }

    mapping
}

/// Pair every raw label with its mapping result, in input order.
pub fn describe_channels(
    labels: &[String],
    mapping: &ChannelMapping,
    catalog: &ElectrodeCatalog,
) -> Vec<ChannelDescriptor> {
    labels
        .iter()
        .enumerate()
        .map(|(index, raw)| match mapping.get(index) {
            Some(m) => ChannelDescriptor {
                raw_label: raw.clone(),
                canonical_label: Some(m.canonical.to_string()),
                position: catalog.position(m.canonical),
                channel_type: match m.rule {
                    MatchRule::Bipolar => ChannelType::Derived,
                    MatchRule::Exact | MatchRule::Fuzzy => ChannelType::Eeg,
                },
            },
            None => ChannelDescriptor {
                raw_label: raw.clone(),
                canonical_label: None,
                position: None,
                channel_type: ChannelType::Unknown,
            },
        })
        .collect()
}
