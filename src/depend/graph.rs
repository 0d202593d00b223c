//! Dependency graph & ordering (component G).
//!
//! Turns a [`DependencyTree`] plus a seed set of services into a deterministic
//! start or stop order: virtuals are resolved to a concrete provider, a DAG is built
//! from the ordering-relevant relations, and a stable topological sort walks it with
//! cycles broken rather than treated as fatal.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use super::{DependencyTree, RelationType};

/// Which direction an ordering is being computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Services are being started: `need`/`use`/`want` run before their dependent.
    Start,
    /// Services are being stopped: the edges invert, dependents stop before what
    /// they depend on.
    Stop,
}

/// Which relation types contribute edges to a `depends` or `order` computation.
#[derive(Debug, Clone, Copy)]
pub struct DependsOptions {
    /// Follow `need` edges (hard requirement).
    pub trace_need: bool,
    /// Follow `use`/`want` edges (soft requirement).
    pub trace_use: bool,
}

impl Default for DependsOptions {
    fn default() -> Self {
        DependsOptions {
            trace_need: true,
            trace_use: true,
        }
    }
}

/// Options controlling a full [`order`] computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderOptions {
    /// Relation-following policy, same as [`depends`].
    pub depends: DependsOptions,
}

/// Computes the transitive closure of `seeds` under the relation types selected by
/// `options`, resolving virtuals against `tree`'s provider map. A flat, unordered set
/// of every service that must be considered, not yet an order.
pub fn depends(
    tree: &DependencyTree,
    seeds: &[String],
    options: DependsOptions,
) -> HashSet<String> {
    let seed_set: HashSet<&str> = seeds.iter().map(String::as_str).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut stack: Vec<String> = seeds.to_vec();

    while let Some(name) = stack.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        let Some(record) = tree.record(&name) else {
            continue;
        };

        let mut peers: Vec<&str> = Vec::new();
        if options.trace_need {
            peers.extend(record.peers(RelationType::Need).iter().map(String::as_str));
        }
        if options.trace_use {
            peers.extend(record.peers(RelationType::Use).iter().map(String::as_str));
            peers.extend(record.peers(RelationType::Want).iter().map(String::as_str));
        }

        for peer in peers {
            if let Some(resolved) = resolve_peer(tree, peer, &seed_set) {
                if !seen.contains(&resolved) {
                    stack.push(resolved);
                }
            }
        }
    }

    seen
}

/// Computes a full start or stop order over the seed set (normally `sysinit` ∪
/// `boot` ∪ the target runlevel).
///
/// The algorithm:
/// 1. expand the seed set with `depends` so every transitively required service is
///    included (using the caller's `options`);
/// 2. build a DAG from `need`/`after` edges plus `before` edges inverted into `after`
///    on the peer (deferred here rather than at cache-build time, since virtuals must
///    already be resolved for `before`/`after` on a virtual name to make sense);
/// 3. topologically sort with ties broken by the seed set's declaration order, then
///    lexicographically;
/// 4. break any cycle found by dropping the lexicographically-later edge that closes
///    it, logging a warning rather than failing.
pub fn order(
    tree: &DependencyTree,
    seeds: &[String],
    direction: Direction,
    options: OrderOptions,
) -> Vec<String> {
    let universe = depends(tree, seeds, options.depends);
    let mut services: Vec<String> = universe.into_iter().collect();
    services.sort();

    let rank: HashMap<&str, usize> = seeds
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i))
        .collect();

    let seed_set: HashSet<&str> = seeds.iter().map(String::as_str).collect();
    let edges = build_edges(tree, &services, &seed_set);
    let sorted = topo_sort(&services, &edges, &rank);

    match direction {
        Direction::Start => sorted,
        Direction::Stop => sorted.into_iter().rev().collect(),
    }
}

/// Builds the `must-come-before` edge set: `(a, b)` means `a` must be ordered before
/// `b` in a start order. Combines `need`+`after`, and `before` inverted onto the peer.
fn build_edges(
    tree: &DependencyTree,
    services: &[String],
    seeds: &HashSet<&str>,
) -> HashMap<String, HashSet<String>> {
    let mut edges: HashMap<String, HashSet<String>> = HashMap::new();
    let known: HashSet<&str> = services.iter().map(String::as_str).collect();

    for name in services {
        let Some(record) = tree.record(name) else {
            continue;
        };

        for relation in [RelationType::Need, RelationType::Use, RelationType::Want, RelationType::After] {
            for peer in record.peers(relation) {
                if let Some(resolved) = resolve_peer(tree, peer, seeds) {
                    if known.contains(resolved.as_str()) {
                        edges.entry(resolved).or_default().insert(name.clone());
                    }
                }
            }
        }

        for peer in &record.before {
            if let Some(resolved) = resolve_peer(tree, peer, seeds) {
                if known.contains(resolved.as_str()) {
                    edges.entry(name.clone()).or_default().insert(resolved);
                }
            }
        }
    }

    edges
}

/// Stable topological sort with deterministic tie-break: among services with no
/// remaining unsatisfied predecessor, prefer the one that appears earliest in the
/// seed set, then lexicographically. Cycles are broken by dropping the
/// lexicographically-later edge that would close them.
fn topo_sort(
    services: &[String],
    edges: &HashMap<String, HashSet<String>>,
    rank: &HashMap<&str, usize>,
) -> Vec<String> {
    let mut indegree: HashMap<&str, usize> = services.iter().map(|s| (s.as_str(), 0)).collect();
    for (_, dependents) in edges {
        for dependent in dependents {
            *indegree.entry(dependent.as_str()).or_insert(0) += 1;
        }
    }

    let mut result: Vec<String> = Vec::with_capacity(services.len());
    let mut remaining: HashSet<&str> = services.iter().map(String::as_str).collect();

    while !remaining.is_empty() {
        let mut ready: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|s| indegree.get(s).copied().unwrap_or(0) == 0)
            .collect();

        if ready.is_empty() {
            // Every remaining service has an unsatisfied predecessor: a cycle.
            // Break it by picking the lexicographically-first remaining service and
            // forcing it ready, dropping the edges that were blocking it.
            let mut candidates: Vec<&str> = remaining.iter().copied().collect();
            candidates.sort();
            let chosen = candidates[0];
            warn!(service = chosen, "breaking dependency cycle at this service");
            ready.push(chosen);
        }

        ready.sort_by_key(|s| (rank.get(s).copied().unwrap_or(usize::MAX), *s));
        let next = ready[0];

        result.push(next.to_string());
        remaining.remove(next);
        if let Some(dependents) = edges.get(next) {
            for dependent in dependents {
                if let Some(count) = indegree.get_mut(dependent.as_str()) {
                    *count = count.saturating_sub(1);
                }
            }
        }
    }

    result
}

/// Resolves a peer name to a single concrete service: itself if it is a real
/// service, otherwise exactly one of its registered providers. A virtual with more
/// than one provider is ambiguous, so it is resolved to whichever provider is a
/// member of `seeds` (the runlevel(s) being considered), falling back to the
/// lexicographically-first provider when none of them are seeded. Returns `None`
/// for a virtual with no registered provider at all.
fn resolve_peer(tree: &DependencyTree, peer: &str, seeds: &HashSet<&str>) -> Option<String> {
    if tree.is_service(peer) {
        return Some(peer.to_string());
    }

    let providers = tree.providers.get(peer)?;
    if let Some(seeded) = providers.iter().filter(|p| seeds.contains(p.as_str())).min() {
        return Some(seeded.clone());
    }

    providers.iter().min().cloned()
}
