//! Required-dependency graph and its deterministic linearization.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{ModError, Result};
use crate::types::ModKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Directed "requires" graph over ModKeys.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<ModKey, Vec<ModKey>>,
    roots: Vec<ModKey>,
    rank: HashMap<ModKey, usize>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an explicit profile entry. Insertion order is profile order and
    /// breaks ties between independent subtrees.
    pub fn add_root(&mut self, key: ModKey) {
        if self.rank.contains_key(&key) {
            return;
        }
        self.rank.insert(key.clone(), self.roots.len());
        self.edges.entry(key.clone()).or_default();
        self.roots.push(key);
    }

    pub fn add_node(&mut self, key: ModKey) {
        self.edges.entry(key).or_default();
    }

    /// `from` requires `to`.
    pub fn add_edge(&mut self, from: ModKey, to: ModKey) {
        self.add_node(to.clone());
        let deps = self.edges.entry(from).or_default();
        if !deps.contains(&to) {
            deps.push(to);
        }
    }

    pub fn contains(&self, key: &ModKey) -> bool {
        self.edges.contains_key(key)
    }

    pub fn dependencies(&self, key: &ModKey) -> &[ModKey] {
        self.edges.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Postorder topological sort: dependencies before dependents.
    ///
    /// Roots are visited in profile order; a node's dependencies are visited
    /// profile entries first (by profile position), then the rest by ModKey.
    /// Nodes unreachable from any root are appended in ModKey order.
    /// Fails with [`ModError::DependencyLoop`] on any cycle; see
    /// [`DependencyGraph::smallest_cycle`] for which one is reported.
    pub fn install_order(&self) -> Result<Vec<ModKey>> {
        let mut marks: HashMap<&ModKey, Mark> = HashMap::new();
        let mut order = Vec::with_capacity(self.edges.len());

        let sorted = self
            .roots
            .iter()
            .chain(self.edges.keys())
            .try_for_each(|key| self.visit(key, &mut marks, &mut order));

        match sorted {
            Ok(()) => Ok(order),
            Err(CycleFound) => Err(ModError::DependencyLoop {
                cycle: self.smallest_cycle().unwrap_or_default(),
            }),
        }
    }

    fn visit<'a>(
        &'a self,
        key: &'a ModKey,
        marks: &mut HashMap<&'a ModKey, Mark>,
        order: &mut Vec<ModKey>,
    ) -> std::result::Result<(), CycleFound> {
        match marks.get(key) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => return Err(CycleFound),
            None => {}
        }

        marks.insert(key, Mark::InProgress);
        for dep in self.sorted_dependencies(key) {
            self.visit(dep, marks, order)?;
        }
        marks.insert(key, Mark::Done);
        order.push(key.clone());
        Ok(())
    }

    fn sorted_dependencies(&self, key: &ModKey) -> Vec<&ModKey> {
        let mut deps: Vec<&ModKey> = self.dependencies(key).iter().collect();
        deps.sort_by(|a, b| {
            let ra = self.rank.get(*a).copied().unwrap_or(usize::MAX);
            let rb = self.rank.get(*b).copied().unwrap_or(usize::MAX);
            ra.cmp(&rb).then_with(|| a.cmp(b))
        });
        deps
    }

    /// The cycle through the smallest ModKey that lies on any cycle, starting
    /// and ending at that key. Only keys and edges are consulted, so the
    /// answer does not depend on profile order or on other cycles.
    pub fn smallest_cycle(&self) -> Option<Vec<ModKey>> {
        self.edges.keys().find_map(|start| {
            let mut path = vec![start];
            let mut seen = HashSet::new();
            self.walk_back_to(start, start, &mut path, &mut seen)
                .then(|| {
                    let mut cycle: Vec<ModKey> = path.into_iter().cloned().collect();
                    cycle.push(start.clone());
                    cycle
                })
        })
    }

    /// Depth-first search for an edge back to `start`, staying on keys
    /// greater than `start`. Dependencies are tried in ModKey order.
    fn walk_back_to<'a>(
        &'a self,
        start: &ModKey,
        node: &'a ModKey,
        path: &mut Vec<&'a ModKey>,
        seen: &mut HashSet<&'a ModKey>,
    ) -> bool {
        let mut deps: Vec<&ModKey> = self.dependencies(node).iter().collect();
        deps.sort();
        for dep in deps {
            if dep == start {
                return true;
            }
            if dep > start && seen.insert(dep) {
                path.push(dep);
                if self.walk_back_to(start, dep, path, seen) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }
}

struct CycleFound;

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> ModKey {
        ModKey::new("nexus", id)
    }

    fn ids(order: &[ModKey]) -> Vec<&str> {
        order.iter().map(|k| k.mod_id.as_str()).collect()
    }

    #[test]
    fn dependencies_come_first() {
        let mut graph = DependencyGraph::new();
        graph.add_root(key("app"));
        graph.add_edge(key("app"), key("lib"));
        graph.add_edge(key("lib"), key("core"));

        let order = graph.install_order().expect("acyclic graph should sort");
        assert_eq!(ids(&order), vec!["core", "lib", "app"]);
    }

    #[test]
    fn profile_order_breaks_ties_before_key_order() {
        let mut graph = DependencyGraph::new();
        graph.add_root(key("z-root"));
        graph.add_root(key("b"));
        graph.add_edge(key("z-root"), key("c"));
        graph.add_edge(key("z-root"), key("b"));
        graph.add_edge(key("z-root"), key("a"));

        let order = graph.install_order().expect("acyclic graph should sort");
        // b is a profile entry so it is visited before a and c.
        assert_eq!(ids(&order), vec!["b", "a", "c", "z-root"]);
    }

    #[test]
    fn shared_dependency_emitted_once() {
        let mut graph = DependencyGraph::new();
        graph.add_root(key("x"));
        graph.add_root(key("y"));
        graph.add_edge(key("x"), key("shared"));
        graph.add_edge(key("y"), key("shared"));

        let order = graph.install_order().expect("acyclic graph should sort");
        assert_eq!(ids(&order), vec!["shared", "x", "y"]);
    }

    #[test]
    fn cycle_reported_the_same_from_any_entry() {
        let build = |roots: &[&str]| {
            let mut graph = DependencyGraph::new();
            for root in roots {
                graph.add_root(key(root));
            }
            graph.add_edge(key("a"), key("b"));
            graph.add_edge(key("b"), key("c"));
            graph.add_edge(key("c"), key("a"));
            graph.install_order().unwrap_err()
        };

        for roots in [&["a"][..], &["b"][..], &["c", "a"][..]] {
            match build(roots) {
                ModError::DependencyLoop { cycle } => {
                    assert_eq!(ids(&cycle), vec!["a", "b", "c", "a"]);
                }
                other => panic!("expected DependencyLoop, got {other:?}"),
            }
        }
    }

    #[test]
    fn disjoint_cycles_report_the_smallest_one() {
        let build = |roots: &[&str]| {
            let mut graph = DependencyGraph::new();
            for root in roots {
                graph.add_root(key(root));
            }
            graph.add_edge(key("c"), key("d"));
            graph.add_edge(key("d"), key("c"));
            graph.add_edge(key("a"), key("b"));
            graph.add_edge(key("b"), key("a"));
            graph.install_order().unwrap_err()
        };

        for roots in [&["a", "c"][..], &["c", "a"][..], &["d"][..]] {
            match build(roots) {
                ModError::DependencyLoop { cycle } => {
                    assert_eq!(ids(&cycle), vec!["a", "b", "a"]);
                }
                other => panic!("expected DependencyLoop, got {other:?}"),
            }
        }
    }

    #[test]
    fn smallest_cycle_is_none_for_acyclic_graph() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(key("app"), key("lib"));
        assert!(graph.smallest_cycle().is_none());
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_root(key("a"));
        graph.add_edge(key("a"), key("a"));

        match graph.install_order().unwrap_err() {
            ModError::DependencyLoop { cycle } => assert_eq!(ids(&cycle), vec!["a", "a"]),
            other => panic!("expected DependencyLoop, got {other:?}"),
        }
    }
}
