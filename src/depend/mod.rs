//! Dependency engine: the parser & cache (component F) and the graph & ordering
//! (component G) that together compute a deterministic start/stop order from each
//! service's declared relations.

mod graph;
mod parser;

pub use graph::{depends, order, DependsOptions, Direction, OrderOptions};
pub use parser::{DependencyParser, MetadataProvider, ScriptMetadataProvider};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum_macros::{AsRefStr, EnumString};

/// The seven relation types a script may declare via its `depend` primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum RelationType {
    /// Hard requirement: start before, stop after; failure schedules the dependent.
    Need,
    /// Soft preference: start before if present in any runlevel.
    Use,
    /// Like `Use` but considered even if the peer is in no runlevel.
    Want,
    /// Ordering only, start after the peer, no requirement.
    After,
    /// Ordering only, inverted: start before the peer.
    Before,
    /// This service satisfies a named virtual capability.
    Provide,
    /// Implementation-level flags that modulate behaviour (e.g. `-timeout`).
    Keyword,
}

/// One service's declared relations, grouped by type, each an ordered peer list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyRecord {
    /// Peers declared via `need`.
    pub need: Vec<String>,
    /// Peers declared via `use`.
    pub use_: Vec<String>,
    /// Peers declared via `want`.
    pub want: Vec<String>,
    /// Peers declared via `after`.
    pub after: Vec<String>,
    /// Peers declared via `before`.
    pub before: Vec<String>,
    /// Virtuals declared via `provide`.
    pub provide: Vec<String>,
    /// Flags declared via `keyword`.
    pub keyword: Vec<String>,
}

impl DependencyRecord {
    /// Returns the peer list for a given relation type.
    pub fn peers(&self, relation: RelationType) -> &[String] {
        match relation {
            RelationType::Need => &self.need,
            RelationType::Use => &self.use_,
            RelationType::Want => &self.want,
            RelationType::After => &self.after,
            RelationType::Before => &self.before,
            RelationType::Provide => &self.provide,
            RelationType::Keyword => &self.keyword,
        }
    }

    fn peers_mut(&mut self, relation: RelationType) -> &mut Vec<String> {
        match relation {
            RelationType::Need => &mut self.need,
            RelationType::Use => &mut self.use_,
            RelationType::Want => &mut self.want,
            RelationType::After => &mut self.after,
            RelationType::Before => &mut self.before,
            RelationType::Provide => &mut self.provide,
            RelationType::Keyword => &mut self.keyword,
        }
    }

    fn push(&mut self, relation: RelationType, peer: String) {
        let list = self.peers_mut(relation);
        if !list.contains(&peer) {
            list.push(peer);
        }
    }
}

/// The full cached dependency graph: one record per known service, plus the resolved
/// `provide` map (virtual name -> providers, in declaration order).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyTree {
    /// Declared relations, keyed by service name.
    pub records: HashMap<String, DependencyRecord>,
    /// Virtual name -> ordered list of services that provide it.
    pub providers: HashMap<String, Vec<String>>,
    /// SHA-256 fingerprint of `records` at the time this tree was written, guarding
    /// against a truncated or bit-flipped cache file surviving the mtime check.
    #[serde(default)]
    pub fingerprint: String,
}

impl DependencyTree {
    /// Looks up a service's dependency record, if known.
    pub fn record(&self, service: &str) -> Option<&DependencyRecord> {
        self.records.get(service)
    }

    /// Whether `name` is a known real service (as opposed to a virtual/unknown name).
    pub fn is_service(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Stamps `fingerprint` with the current hash of `records`.
    fn stamp_fingerprint(&mut self) {
        self.fingerprint = fingerprint_of(&self.records);
    }

    /// Whether the stored fingerprint still matches `records` — false means the
    /// cache file was corrupted or hand-edited after being written.
    pub fn is_intact(&self) -> bool {
        self.fingerprint == fingerprint_of(&self.records)
    }
}

/// Deterministic SHA-256 fingerprint of a set of dependency records, independent of
/// `HashMap` iteration order.
fn fingerprint_of(records: &HashMap<String, DependencyRecord>) -> String {
    let mut names: Vec<&String> = records.keys().collect();
    names.sort();

    let mut hasher = Sha256::new();
    for name in names {
        hasher.update(name.as_bytes());
        for relation in [
            RelationType::Need,
            RelationType::Use,
            RelationType::Want,
            RelationType::After,
            RelationType::Before,
            RelationType::Provide,
            RelationType::Keyword,
        ] {
            for peer in records[name].peers(relation) {
                hasher.update(peer.as_bytes());
            }
        }
    }
    format!("{:x}", hasher.finalize())
}
