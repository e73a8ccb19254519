//! Data-quality audit over the raw element stream.
//!
//! Each accumulator folds one top-level element at a time and knows nothing
//! about the others; [`AuditReport`] bundles them so a single pass over the
//! input fills every report.

use crate::classify::{classify, KeyClass};
use crate::error::MalformedInputError;
use crate::models::RawElement;
use crate::normalize::{normalize_postcode, PostcodeRule, StreetNormalizer};
use crate::parser::{ElementReader, Selection};
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use rustc_hash::FxHashSet;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

const POSTCODE_KEY: &str = "addr:postcode";
const STREET_KEY: &str = "addr:street";

fn is_shaped(element: &RawElement) -> bool {
    element.name == "node" || element.name == "way"
}

/// `(key, value)` pairs of every `<tag>` at any depth under `element`.
fn tag_pairs(element: &RawElement) -> impl Iterator<Item = (&str, &str)> {
    element
        .descendants()
        .into_iter()
        .filter(|e| e.name == "tag")
        .filter_map(|e| Some((e.attr("k")?, e.attr("v")?)))
}

/// Element name to number of occurrences.
#[derive(Debug, Clone, Default)]
pub struct TagCounter {
    counts: BTreeMap<String, u64>,
}

impl TagCounter {
    pub fn observe(&mut self, element: &RawElement) {
        for e in element.descendants() {
            self.record(&e.name);
        }
    }

    /// Counts one occurrence of `name` outside any streamed subtree, such as the root.
    pub fn record(&mut self, name: &str) {
        *self.counts.entry(name.to_string()).or_default() += 1;
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }
}

/// Key shape class to number of tag keys in that class.
#[derive(Debug, Clone)]
pub struct KeyTypeCounts {
    counts: BTreeMap<KeyClass, u64>,
}

impl Default for KeyTypeCounts {
    fn default() -> Self {
        Self {
            counts: KeyClass::ALL.iter().map(|c| (*c, 0)).collect(),
        }
    }
}

impl KeyTypeCounts {
    pub fn observe(&mut self, element: &RawElement) {
        for e in element.descendants().into_iter().filter(|e| e.name == "tag") {
            let key = e.attr("k").unwrap_or_default();
            *self.counts.entry(classify(key)).or_default() += 1;
        }
    }

    pub fn get(&self, class: KeyClass) -> u64 {
        self.counts.get(&class).copied().unwrap_or(0)
    }
}

/// Postal codes that do not belong to the locality, with their counts.
#[derive(Debug, Clone)]
pub struct PostcodeAudit {
    rule: PostcodeRule,
    nonconforming: BTreeMap<String, u64>,
}

impl PostcodeAudit {
    pub fn new(locality_prefix: &str) -> Result<Self> {
        let rule = PostcodeRule::for_prefix(locality_prefix)
            .with_context(|| format!("Invalid locality prefix: {}", locality_prefix))?;
        Ok(Self {
            rule,
            nonconforming: BTreeMap::new(),
        })
    }

    pub fn observe(&mut self, element: &RawElement) {
        if !is_shaped(element) {
            return;
        }
        for (key, value) in tag_pairs(element) {
            if key == POSTCODE_KEY && !self.rule.conforms(value) {
                *self.nonconforming.entry(value.to_string()).or_default() += 1;
            }
        }
    }

    pub fn nonconforming(&self) -> &BTreeMap<String, u64> {
        &self.nonconforming
    }
}

/// Unrecognized street suffixes and the full names they appeared in.
#[derive(Debug, Clone, Default)]
pub struct StreetAudit {
    streets: StreetNormalizer,
    by_suffix: BTreeMap<String, BTreeSet<String>>,
}

impl StreetAudit {
    pub fn new(streets: StreetNormalizer) -> Self {
        Self {
            streets,
            by_suffix: BTreeMap::new(),
        }
    }

    pub fn observe(&mut self, element: &RawElement) {
        if !is_shaped(element) {
            return;
        }
        for (key, value) in tag_pairs(element) {
            if key != STREET_KEY {
                continue;
            }
            if let Some(suffix) = self.streets.unrecognized_suffix(value) {
                self.by_suffix
                    .entry(suffix.to_string())
                    .or_default()
                    .insert(value.to_string());
            }
        }
    }

    pub fn by_suffix(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.by_suffix
    }
}

/// Distinct contributor ids (`uid`) seen on top-level elements.
#[derive(Debug, Clone, Default)]
pub struct ContributorSet {
    uids: FxHashSet<String>,
}

impl ContributorSet {
    pub fn observe(&mut self, element: &RawElement) {
        if let Some(uid) = element.attr("uid") {
            if !self.uids.contains(uid) {
                self.uids.insert(uid.to_string());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.uids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.uids.contains(uid)
    }

    pub fn sorted(&self) -> Vec<&str> {
        let mut uids: Vec<&str> = self.uids.iter().map(String::as_str).collect();
        uids.sort_unstable();
        uids
    }
}

#[derive(Debug, Clone)]
pub struct AuditReport {
    pub tags: TagCounter,
    pub key_types: KeyTypeCounts,
    pub postcodes: PostcodeAudit,
    pub streets: StreetAudit,
    pub contributors: ContributorSet,
}

impl AuditReport {
    pub fn new(locality_prefix: &str) -> Result<Self> {
        Ok(Self {
            tags: TagCounter::default(),
            key_types: KeyTypeCounts::default(),
            postcodes: PostcodeAudit::new(locality_prefix)?,
            streets: StreetAudit::default(),
            contributors: ContributorSet::default(),
        })
    }

    pub fn observe(&mut self, element: &RawElement) {
        self.tags.observe(element);
        self.key_types.observe(element);
        self.postcodes.observe(element);
        self.streets.observe(element);
        self.contributors.observe(element);
    }

    /// Folds a whole element stream into this report.
    pub fn fold<I>(self, elements: I) -> Result<Self, MalformedInputError>
    where
        I: IntoIterator<Item = Result<RawElement, MalformedInputError>>,
    {
        elements.into_iter().try_fold(self, |mut report, element| {
            report.observe(&element?);
            Ok(report)
        })
    }

    pub fn print(&self) {
        println!("=== Element counts ===");
        for (name, count) in self.tags.counts() {
            println!("{:<12} {}", name, count);
        }

        println!();
        println!("=== Tag key shapes ===");
        for class in KeyClass::ALL {
            println!("{:<12} {}", class, self.key_types.get(class));
        }

        println!();
        println!("=== Postcodes outside the locality ===");
        for (code, count) in self.postcodes.nonconforming() {
            println!("{} ({}) => {}", code, count, normalize_postcode(code));
        }

        println!();
        println!("=== Unrecognized street suffixes ===");
        for (suffix, names) in self.streets.by_suffix() {
            println!("{}:", suffix);
            for name in names {
                println!("  {} => {}", name, self.streets.streets.normalize(name));
            }
        }

        println!();
        println!("=== Contributors ===");
        println!("Distinct uids: {}", self.contributors.len());
    }
}

/// Runs every audit over the file at `path` in one streaming pass. Every
/// child of the root is audited, and the root itself is counted once.
pub fn audit_file(path: &Path, locality_prefix: &str) -> Result<AuditReport> {
    let mut reader = ElementReader::open_selecting(path, Selection::TopLevel)?;
    let pb = ProgressBar::new_spinner();
    info!(input = %path.display(), "Auditing map");

    let mut seen = 0u64;
    let elements = reader.by_ref().inspect(|_| {
        seen += 1;
        if seen % crate::config::PROGRESS_INTERVAL == 0 {
            pb.tick();
        }
    });
    let mut report = AuditReport::new(locality_prefix)?
        .fold(elements)
        .context("Input is not well-formed")?;
    if let Some(root) = reader.root_name() {
        report.tags.record(root);
    }

    pb.finish_and_clear();
    info!(
        elements = seen,
        contributors = report.contributors.len(),
        "Audit complete"
    );
    Ok(report)
}
