//! Type hierarchy: aliases, parent/child edges and specificity levels.
//!
//! Levels are computed from the top-level parents downwards. A top-level
//! parent is a registered type that has children but is not itself the child
//! of a registered type. A type reached over several paths keeps the deepest
//! level. Types nothing reaches end up at level 0.
//!
//! Edges may point at names that were never registered, and the graph may
//! contain cycles. Missing children are skipped with a warning. A cycle is
//! cut where the walk would re-enter a type already on the current descent
//! path, so the re-entered type keeps the level it was first reached at.

use crate::registry::TypeId;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

/// Alias map and parent -> children edges, all keyed by name.
#[derive(Debug, Default, Clone)]
pub(crate) struct TypeGraph {
    aliases: HashMap<String, String>,
    children: HashMap<String, Vec<String>>,
}

impl TypeGraph {
    /// Canonical name for `name`, or `name` itself when it is not an alias.
    pub(crate) fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map_or(name, String::as_str)
    }

    pub(crate) fn add_alias(&mut self, alias: &str, canonical: &str) {
        self.aliases.insert(alias.to_string(), canonical.to_string());
    }

    /// Records `parent -> child`, resolving `parent` through the aliases known so far.
    pub(crate) fn add_edge(&mut self, parent: &str, child: &str) {
        let parent = self.resolve(parent).to_string();
        let children = self.children.entry(parent).or_default();
        if !children.iter().any(|c| c == child) {
            children.push(child.to_string());
        }
    }

    /// Assigns a level to each of the `type_count` registered types.
    pub(crate) fn determine_levels(
        &self,
        by_name: &HashMap<String, TypeId>,
        type_count: usize,
    ) -> Hierarchy {
        // Re-resolve edge keys: a parent's alias may have become known after
        // the edge was recorded.
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for (parent, children) in &self.children {
            let kids = adjacency.entry(self.resolve(parent)).or_default();
            for child in children {
                let child = self.resolve(child);
                if !kids.contains(&child) {
                    kids.push(child);
                }
            }
        }

        let mut parents = BTreeMap::new();
        let mut children = HashSet::new();
        for (&parent, kids) in &adjacency {
            match by_name.get(parent) {
                Some(&id) => {
                    parents.insert(parent, id);
                    children.extend(kids.iter().copied());
                }
                None => warn!(
                    "Inconsistent MIME hierarchy detected, parent {parent} of {kids:?} cannot be found"
                ),
            }
        }

        let mut walk = LevelWalk {
            adjacency: &adjacency,
            by_name,
            levels: vec![None; type_count],
            on_path: vec![false; type_count],
            max_level: 0,
        };
        for (top, id) in parents.into_iter().filter(|(p, _)| !children.contains(p)) {
            walk.raise(id, top, 0);
        }

        let levels: Vec<u32> = walk.levels.into_iter().map(|l| l.unwrap_or(0)).collect();
        let mut scan_order: Vec<TypeId> = (0..type_count).map(TypeId::from_index).collect();
        scan_order.sort_by(|a, b| levels[b.index()].cmp(&levels[a.index()]).then(a.cmp(b)));

        Hierarchy {
            levels,
            max_level: walk.max_level,
            scan_order,
        }
    }
}

struct LevelWalk<'a> {
    adjacency: &'a HashMap<&'a str, Vec<&'a str>>,
    by_name: &'a HashMap<String, TypeId>,
    levels: Vec<Option<u32>>,
    on_path: Vec<bool>,
    max_level: u32,
}

impl<'a> LevelWalk<'a> {
    fn raise(&mut self, id: TypeId, name: &'a str, level: u32) {
        let i = id.index();
        if self.on_path[i] {
            warn!("MIME hierarchy cycle detected at {name}, not descending further");
            return;
        }
        // Raising is monotone: a type already this deep has had its subtree walked.
        if matches!(self.levels[i], Some(current) if current >= level) {
            return;
        }
        self.levels[i] = Some(level);
        self.max_level = self.max_level.max(level);

        let adjacency = self.adjacency;
        let Some(children) = adjacency.get(name) else {
            return;
        };
        self.on_path[i] = true;
        for &child in children {
            match self.by_name.get(child) {
                Some(&child_id) => self.raise(child_id, child, level + 1),
                None => warn!(
                    "Inconsistent MIME hierarchy detected, child {child} of {name} cannot be found"
                ),
            }
        }
        self.on_path[i] = false;
    }
}

/// Resolved levels, valid until the next ingestion.
#[derive(Debug, Clone, Default)]
pub(crate) struct Hierarchy {
    levels: Vec<u32>,
    max_level: u32,
    scan_order: Vec<TypeId>,
}

impl Hierarchy {
    pub(crate) fn level(&self, id: TypeId) -> u32 {
        self.levels.get(id.index()).copied().unwrap_or(0)
    }

    pub(crate) fn max_level(&self) -> u32 {
        self.max_level
    }

    /// All types, most specific level first, registration order within a level.
    pub(crate) fn scan_order(&self) -> &[TypeId] {
        &self.scan_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    struct Fixture {
        graph: TypeGraph,
        by_name: HashMap<String, TypeId>,
    }

    impl Fixture {
        fn new(types: &[&str]) -> Self {
            let by_name = types
                .iter()
                .enumerate()
                .map(|(i, t)| (t.to_string(), TypeId::from_index(i)))
                .collect();
            Self {
                graph: TypeGraph::default(),
                by_name,
            }
        }

        fn edge(mut self, parent: &str, child: &str) -> Self {
            self.graph.add_edge(parent, child);
            self
        }

        fn levels(&self) -> Hierarchy {
            self.graph.determine_levels(&self.by_name, self.by_name.len())
        }

        fn level(&self, hierarchy: &Hierarchy, name: &str) -> u32 {
            hierarchy.level(self.by_name[name])
        }
    }

    #[test]
    fn test_linear_chain() {
        let f = Fixture::new(&["application/octet-stream", "text/plain", "text/x-csrc"])
            .edge("application/octet-stream", "text/plain")
            .edge("text/plain", "text/x-csrc");
        let h = f.levels();
        assert_eq!(f.level(&h, "application/octet-stream"), 0);
        assert_eq!(f.level(&h, "text/plain"), 1);
        assert_eq!(f.level(&h, "text/x-csrc"), 2);
        assert_eq!(h.max_level(), 2);
    }

    #[test]
    fn test_multiple_inheritance_keeps_deepest() {
        // shellscript < text/plain < octet-stream, shellscript < x-executable < octet-stream,
        // plus a shortcut edge straight from octet-stream.
        let f = Fixture::new(&[
            "application/octet-stream",
            "text/plain",
            "application/x-executable",
            "application/x-shellscript",
        ])
        .edge("application/octet-stream", "application/x-shellscript")
        .edge("application/octet-stream", "text/plain")
        .edge("application/octet-stream", "application/x-executable")
        .edge("text/plain", "application/x-shellscript")
        .edge("application/x-executable", "application/x-shellscript");
        let h = f.levels();
        assert_eq!(f.level(&h, "application/x-shellscript"), 2);
        assert_eq!(f.level(&h, "text/plain"), 1);
    }

    #[test]
    fn test_ingestion_order_does_not_matter() {
        let forward = Fixture::new(&["a/root", "a/mid", "a/leaf"])
            .edge("a/root", "a/mid")
            .edge("a/mid", "a/leaf");
        let backward = Fixture::new(&["a/root", "a/mid", "a/leaf"])
            .edge("a/mid", "a/leaf")
            .edge("a/root", "a/mid");
        let (hf, hb) = (forward.levels(), backward.levels());
        for name in ["a/root", "a/mid", "a/leaf"] {
            assert_eq!(forward.level(&hf, name), backward.level(&hb, name));
        }
    }

    #[test]
    #[traced_test]
    fn test_dangling_parent_floats_to_top() {
        // text/x-patch declares a parent that was never registered.
        let f = Fixture::new(&["text/x-patch"]).edge("text/plain", "text/x-patch");
        let h = f.levels();
        assert_eq!(f.level(&h, "text/x-patch"), 0);
        assert_eq!(h.max_level(), 0);
        assert!(logs_contain("parent text/plain"));
    }

    #[test]
    #[traced_test]
    fn test_registered_roots_walked_beside_dangling_parent() {
        let f = Fixture::new(&["a/root", "a/leaf", "a/orphan"])
            .edge("a/root", "a/leaf")
            .edge("a/ghost", "a/orphan");
        let h = f.levels();
        assert_eq!(f.level(&h, "a/root"), 0);
        assert_eq!(f.level(&h, "a/leaf"), 1);
        assert_eq!(f.level(&h, "a/orphan"), 0);
        assert!(logs_contain("parent a/ghost"));
        assert!(!logs_contain("a/root cannot be found"));
    }

    #[test]
    #[traced_test]
    fn test_missing_child_is_reported() {
        let f = Fixture::new(&["text/plain"]).edge("text/plain", "text/x-ghost");
        let h = f.levels();
        assert_eq!(f.level(&h, "text/plain"), 0);
        assert!(logs_contain("Inconsistent MIME hierarchy detected"));
        assert!(logs_contain("text/x-ghost"));
    }

    #[test]
    #[traced_test]
    fn test_cycle_below_root_terminates() {
        let f = Fixture::new(&["a/root", "a/x", "a/y"])
            .edge("a/root", "a/x")
            .edge("a/x", "a/y")
            .edge("a/y", "a/x");
        let h = f.levels();
        assert_eq!(f.level(&h, "a/root"), 0);
        assert_eq!(f.level(&h, "a/x"), 1);
        assert_eq!(f.level(&h, "a/y"), 2);
        assert!(logs_contain("MIME hierarchy cycle detected"));
    }

    #[test]
    fn test_rootless_cycle_is_level_zero() {
        let f = Fixture::new(&["a/x", "a/y"]).edge("a/x", "a/y").edge("a/y", "a/x");
        let h = f.levels();
        assert_eq!(f.level(&h, "a/x"), 0);
        assert_eq!(f.level(&h, "a/y"), 0);
    }

    #[test]
    fn test_self_parent_terminates() {
        let f = Fixture::new(&["a/root", "a/self"])
            .edge("a/root", "a/self")
            .edge("a/self", "a/self");
        let h = f.levels();
        assert_eq!(f.level(&h, "a/self"), 1);
    }

    #[test]
    fn test_alias_edges_resolve_late() {
        // The edge is recorded under the alias before the alias is known.
        let mut f = Fixture::new(&["application/xml", "image/svg+xml"])
            .edge("text/xml", "image/svg+xml");
        f.graph.add_alias("text/xml", "application/xml");
        let h = f.levels();
        assert_eq!(f.level(&h, "application/xml"), 0);
        assert_eq!(f.level(&h, "image/svg+xml"), 1);
    }

    #[test]
    fn test_scan_order_most_specific_first() {
        let f = Fixture::new(&["a/root", "a/leaf", "a/other", "a/mid"])
            .edge("a/root", "a/mid")
            .edge("a/mid", "a/leaf");
        let h = f.levels();
        let order: Vec<usize> = h.scan_order().iter().map(|id| id.index()).collect();
        // leaf (2), mid (1), then root and other at level 0 in registration order.
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_resolve_is_identity_for_unknown() {
        let mut graph = TypeGraph::default();
        graph.add_alias("text/xml", "application/xml");
        assert_eq!(graph.resolve("text/xml"), "application/xml");
        assert_eq!(graph.resolve("foo/bar"), "foo/bar");
    }
}
