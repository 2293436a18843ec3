//! Lowest-version dependency resolution.
//!
//! Every package gets the lowest published version that satisfies all the
//! constraints placed on it by the roots and by the currently selected
//! versions of its dependents. Selection is repeated until it stops changing.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use semver::VersionReq;

use crate::error::PackageError;
use crate::identity::{is_host_provided, PackageIdentity, PackageReference};
use crate::source::{IndexEntry, PackageSource};

/// Selection rounds before giving up on convergence.
const MAX_ROUNDS: usize = 64;

struct Constraint {
    req: VersionReq,
    from: String,
}

struct Selected {
    id: String,
    entry: IndexEntry,
}

/// Registry indexes fetched during one resolution.
struct IndexCache<'a> {
    source: &'a dyn PackageSource,
    indexes: HashMap<String, Vec<IndexEntry>>,
}

impl<'a> IndexCache<'a> {
    fn new(source: &'a dyn PackageSource) -> Self {
        Self {
            source,
            indexes: HashMap::new(),
        }
    }

    fn versions(&mut self, id: &str) -> Result<&[IndexEntry], PackageError> {
        let key = id.to_ascii_lowercase();
        if !self.indexes.contains_key(&key) {
            let mut versions = self.source.versions(id)?;
            versions.sort_by(|a, b| a.version.cmp(&b.version));
            self.indexes.insert(key.clone(), versions);
        }
        Ok(self.indexes.get(&key).map(Vec::as_slice).unwrap_or_default())
    }
}

/// Picks the lowest published version of each root satisfying its constraint.
pub fn select_roots(
    source: &dyn PackageSource,
    roots: &[PackageReference],
) -> Result<Vec<PackageIdentity>, PackageError> {
    let mut cache = IndexCache::new(source);
    let mut selected = Vec::new();
    for root in roots {
        if is_host_provided(&root.id) {
            tracing::info!(package = %root.id, "package is provided by the host");
            continue;
        }
        let version = cache
            .versions(&root.id)?
            .iter()
            .find(|entry| root.req.matches(&entry.version))
            .map(|entry| entry.version.clone())
            .ok_or_else(|| PackageError::Resolution {
                reason: format!("no version of {} matches {}", root.id, root.req),
            })?;
        selected.push(PackageIdentity::new(root.id.clone(), version));
    }
    Ok(selected)
}

/// Resolves `roots` and their transitive dependencies.
///
/// Host-provided packages are neither selected nor expanded. The result is in
/// dependency order, dependencies first.
pub fn resolve_lowest(
    source: &dyn PackageSource,
    roots: &[PackageReference],
) -> Result<Vec<PackageIdentity>, PackageError> {
    let mut cache = IndexCache::new(source);
    let mut selected: BTreeMap<String, Selected> = BTreeMap::new();

    for round in 0..MAX_ROUNDS {
        let constraints = collect_constraints(roots, &selected);
        let mut next = BTreeMap::new();
        for (key, (id, reqs)) in constraints {
            let entry = cache
                .versions(&id)?
                .iter()
                .find(|entry| reqs.iter().all(|c| c.req.matches(&entry.version)))
                .cloned()
                .ok_or_else(|| PackageError::Resolution {
                    reason: format!(
                        "no version of {id} satisfies {}",
                        reqs.iter()
                            .map(|c| format!("{} (from {})", c.req, c.from))
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                })?;
            next.insert(key, Selected { id, entry });
        }

        let stable = next.len() == selected.len()
            && next.iter().all(|(key, choice)| {
                selected
                    .get(key)
                    .is_some_and(|prev| prev.entry.version == choice.entry.version)
            });
        selected = next;
        if stable {
            tracing::debug!(rounds = round + 1, packages = selected.len(), "package resolution converged");
            return order(&selected);
        }
    }

    Err(PackageError::Resolution {
        reason: format!("selection did not settle after {MAX_ROUNDS} rounds"),
    })
}

/// Gathers the constraints reachable from `roots` through `selected`.
fn collect_constraints(
    roots: &[PackageReference],
    selected: &BTreeMap<String, Selected>,
) -> BTreeMap<String, (String, Vec<Constraint>)> {
    let mut constraints: BTreeMap<String, (String, Vec<Constraint>)> = BTreeMap::new();
    let mut expanded = BTreeSet::new();
    let mut worklist: Vec<(String, VersionReq, String)> = roots
        .iter()
        .rev()
        .map(|r| (r.id.clone(), r.req.clone(), "root".to_string()))
        .collect();

    while let Some((id, req, from)) = worklist.pop() {
        if is_host_provided(&id) {
            continue;
        }
        let key = id.to_ascii_lowercase();
        constraints
            .entry(key.clone())
            .or_insert_with(|| (id.clone(), Vec::new()))
            .1
            .push(Constraint { req, from });
        if !expanded.insert(key.clone()) {
            continue;
        }
        if let Some(choice) = selected.get(&key) {
            let dependent = format!("{} {}", choice.id, choice.entry.version);
            for dep in choice.entry.dependencies.iter().rev() {
                worklist.push((dep.id.clone(), dep.req.clone(), dependent.clone()));
            }
        }
    }
    constraints
}

/// Fails on cycles, otherwise returns the selection dependencies first.
fn order(selected: &BTreeMap<String, Selected>) -> Result<Vec<PackageIdentity>, PackageError> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let nodes: HashMap<&str, NodeIndex> = selected
        .iter()
        .map(|(key, choice)| (key.as_str(), graph.add_node(choice.id.as_str())))
        .collect();
    for (key, choice) in selected {
        for dep in &choice.entry.dependencies {
            let dep_key = dep.id.to_ascii_lowercase();
            if let Some(&to) = nodes.get(dep_key.as_str()) {
                graph.add_edge(nodes[key.as_str()], to, ());
            }
        }
    }

    for component in tarjan_scc(&graph) {
        let is_cycle = component.len() > 1
            || component
                .first()
                .is_some_and(|&n| graph.contains_edge(n, n));
        if is_cycle {
            let mut members: Vec<String> =
                component.iter().map(|&n| graph[n].to_string()).collect();
            members.sort();
            tracing::error!(?members, "package dependency cycle");
            return Err(PackageError::Cycle { members });
        }
    }

    let sorted = toposort(&graph, None).map_err(|cycle| PackageError::Cycle {
        members: vec![graph[cycle.node_id()].to_string()],
    })?;
    Ok(sorted
        .into_iter()
        .rev()
        .map(|n| {
            let key = graph[n].to_ascii_lowercase();
            let choice = &selected[&key];
            PackageIdentity::new(choice.id.clone(), choice.entry.version.clone())
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::LocalRegistry;
    use crate::testing::RegistryBuilder;

    fn roots(pairs: &[(&str, &str)]) -> Vec<PackageReference> {
        pairs
            .iter()
            .map(|(id, req)| PackageReference::parse(id, req).unwrap())
            .collect()
    }

    fn rendered(resolved: &[PackageIdentity]) -> Vec<String> {
        resolved.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn picks_lowest_satisfying_version() {
        let dir = tempfile::tempdir().unwrap();
        RegistryBuilder::new(dir.path())
            .publish("json", "1.0.0", &[], &[])
            .publish("json", "1.4.0", &[], &[])
            .publish("json", "2.0.0", &[], &[]);
        let registry = LocalRegistry::new(dir.path());
        let resolved = resolve_lowest(&registry, &roots(&[("json", ">=1.2")])).unwrap();
        assert_eq!(rendered(&resolved), vec!["json 1.4.0"]);
    }

    #[test]
    fn transitive_dependencies_come_first() {
        let dir = tempfile::tempdir().unwrap();
        RegistryBuilder::new(dir.path())
            .publish("app", "1.0.0", &[("json", "^1.1")], &[])
            .publish("json", "1.0.0", &[], &[])
            .publish("json", "1.1.0", &[("text", "^0.3")], &[])
            .publish("text", "0.3.2", &[], &[]);
        let registry = LocalRegistry::new(dir.path());
        let resolved = resolve_lowest(&registry, &roots(&[("app", "^1")])).unwrap();
        assert_eq!(
            rendered(&resolved),
            vec!["text 0.3.2", "json 1.1.0", "app 1.0.0"]
        );
    }

    #[test]
    fn constraints_from_several_dependents_intersect() {
        let dir = tempfile::tempdir().unwrap();
        RegistryBuilder::new(dir.path())
            .publish("a", "1.0.0", &[("json", ">=1.0")], &[])
            .publish("b", "1.0.0", &[("json", ">=1.3")], &[])
            .publish("json", "1.0.0", &[], &[])
            .publish("json", "1.3.0", &[], &[])
            .publish("json", "1.5.0", &[], &[]);
        let registry = LocalRegistry::new(dir.path());
        let resolved = resolve_lowest(&registry, &roots(&[("a", "*"), ("b", "*")])).unwrap();
        assert!(rendered(&resolved).contains(&"json 1.3.0".to_string()));
    }

    #[test]
    fn unsatisfiable_constraint_is_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        RegistryBuilder::new(dir.path()).publish("json", "1.0.0", &[], &[]);
        let registry = LocalRegistry::new(dir.path());
        let err = resolve_lowest(&registry, &roots(&[("json", "^2")])).unwrap_err();
        assert!(matches!(err, PackageError::Resolution { .. }));
        assert!(err.to_string().contains("json"));
    }

    #[test]
    fn cycle_names_members() {
        let dir = tempfile::tempdir().unwrap();
        RegistryBuilder::new(dir.path())
            .publish("a", "1.0.0", &[("b", "^1")], &[])
            .publish("b", "1.0.0", &[("c", "^1")], &[])
            .publish("c", "1.0.0", &[("a", "^1")], &[]);
        let registry = LocalRegistry::new(dir.path());
        let err = resolve_lowest(&registry, &roots(&[("a", "^1")])).unwrap_err();
        let PackageError::Cycle { members } = err else {
            panic!("expected a cycle, got {err}");
        };
        assert_eq!(members, vec!["a", "b", "c"]);
    }

    #[test]
    fn host_provided_packages_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        RegistryBuilder::new(dir.path()).publish("app", "1.0.0", &[("Tinker.Runtime", "^1")], &[]);
        let registry = LocalRegistry::new(dir.path());
        let resolved = resolve_lowest(
            &registry,
            &roots(&[("app", "^1"), ("tinker.host", "*")]),
        )
        .unwrap();
        assert_eq!(rendered(&resolved), vec!["app 1.0.0"]);
    }

    #[test]
    fn select_roots_does_not_expand() {
        let dir = tempfile::tempdir().unwrap();
        RegistryBuilder::new(dir.path())
            .publish("app", "1.0.0", &[("json", "^1")], &[])
            .publish("json", "1.0.0", &[], &[]);
        let registry = LocalRegistry::new(dir.path());
        let selected = select_roots(&registry, &roots(&[("app", "^1")])).unwrap();
        assert_eq!(rendered(&selected), vec!["app 1.0.0"]);
    }
}
