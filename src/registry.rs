//! The type registry.
//!
//! [`MimeRegistry`] owns every ingested record, the alias map, the
//! parent/child edges and the glob index, all behind one read-write lock.
//! Queries share the read lock; ingestion takes the write lock and marks the
//! hierarchy dirty. The first content query after that recomputes the levels.

use crate::error::Result;
use crate::file_context::MAX_DATA;
use crate::glob::{GlobMatch, GlobPatternIndex, GlobRule};
use crate::hierarchy::{Hierarchy, TypeGraph};
use crate::magic::MagicRuleGroup;
use crate::mime_type::TypeRecord;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Handle of a registered type. Stable across re-ingestion of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct TypeId(u32);

impl TypeId {
    pub(crate) fn from_index(index: usize) -> Self {
        TypeId(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct State {
    records: Vec<Arc<TypeRecord>>,
    by_name: HashMap<String, TypeId>,
    graph: TypeGraph,
    globs: GlobPatternIndex,
    hierarchy: Hierarchy,
    hierarchy_dirty: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            by_name: HashMap::new(),
            graph: TypeGraph::default(),
            globs: GlobPatternIndex::new(),
            hierarchy: Hierarchy::default(),
            hierarchy_dirty: true,
        }
    }
}

impl State {
    fn id_of(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(self.graph.resolve(name)).copied()
    }

    fn find(&self, name: &str) -> Option<Arc<TypeRecord>> {
        self.id_of(name).map(|id| Arc::clone(&self.records[id.index()]))
    }

    fn insert(&mut self, record: TypeRecord) {
        let name = record.name().to_string();

        for glob in record.glob_rules() {
            if let Err(e) = self.globs.add(glob.clone(), &name) {
                warn!(mime_type = %name, error = %e, "Skipping glob pattern");
            }
        }
        for parent in record.parents() {
            self.graph.add_edge(parent, &name);
        }
        for alias in record.aliases() {
            self.graph.add_alias(alias, &name);
        }

        let record = Arc::new(record);
        match self.by_name.get(&name) {
            Some(&id) => self.records[id.index()] = record,
            None => {
                let id = TypeId::from_index(self.records.len());
                self.records.push(record);
                self.by_name.insert(name, id);
            }
        }
        self.hierarchy_dirty = true;
    }

    fn update(&mut self, name: &str, f: impl FnOnce(&mut TypeRecord)) -> bool {
        match self.id_of(name) {
            Some(id) => {
                f(Arc::make_mut(&mut self.records[id.index()]));
                true
            }
            None => false,
        }
    }

    fn ensure_levels(&mut self) {
        if !self.hierarchy_dirty {
            return;
        }
        self.hierarchy = self.graph.determine_levels(&self.by_name, self.records.len());
        self.hierarchy_dirty = false;
        debug!(
            types = self.records.len(),
            max_level = self.hierarchy.max_level(),
            "Determined MIME hierarchy levels"
        );
    }
}

/// Thread-safe store of MIME type records.
#[derive(Debug, Default)]
pub struct MimeRegistry {
    state: RwLock<State>,
}

impl MimeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_levels<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        {
            let state = self.read();
            if !state.hierarchy_dirty {
                return f(&*state);
            }
        }
        let mut state = self.write();
        state.ensure_levels();
        f(&*state)
    }

    /// Inserts or replaces the record stored under its name.
    ///
    /// Declared parents become `parent -> type` edges, aliases are registered
    /// and the record's own glob rules are indexed. Nothing registered for an
    /// earlier version of the same name is retracted.
    ///
    /// Returns `false` when the name is not a valid `media/subtype`.
    pub fn add_type(&self, record: TypeRecord) -> bool {
        if !record.is_valid() {
            return false;
        }
        self.write().insert(record);
        true
    }

    /// Adds a filename glob for `type_name`. Does not touch the hierarchy.
    pub fn add_glob_pattern(
        &self,
        pattern: &str,
        type_name: &str,
        weight: u32,
        case_sensitive: bool,
    ) -> Result<()> {
        let rule = GlobRule::new(pattern)
            .with_weight(weight)
            .case_sensitive(case_sensitive);
        self.write().globs.add(rule, type_name)
    }

    /// Appends a magic rule group to a registered type.
    pub fn add_magic_rule_group(&self, type_name: &str, group: MagicRuleGroup) -> bool {
        let added = self.write().update(type_name, |record| record.push_magic(group));
        if !added {
            warn!("Cannot add magic rules to unknown MIME type {type_name}");
        }
        added
    }

    /// Replaces all magic rule groups of a registered type.
    pub fn set_magic_rule_groups(&self, type_name: &str, groups: Vec<MagicRuleGroup>) -> bool {
        self.write().update(type_name, |record| record.set_magic(groups))
    }

    pub fn set_preferred_suffix(&self, type_name: &str, suffix: &str) -> bool {
        self.write()
            .update(type_name, |record| record.set_preferred_suffix(suffix.to_string()))
    }

    /// Canonical name for `name`; unknown names resolve to themselves.
    pub fn resolve(&self, name: &str) -> String {
        self.read().graph.resolve(name).to_string()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().id_of(name).is_some()
    }

    /// The record for a name or alias.
    pub fn find_by_type(&self, name: &str) -> Option<Arc<TypeRecord>> {
        self.read().find(name)
    }

    /// Glob candidates for a bare filename.
    pub fn candidates_by_filename(&self, file_name: &str) -> GlobMatch {
        self.read().globs.candidates(file_name)
    }

    /// Record of the last glob candidate for `file_name`, if it is registered.
    pub(crate) fn name_candidate(&self, file_name: &str) -> Option<Arc<TypeRecord>> {
        let state = self.read();
        let found = state.globs.candidates(file_name);
        state.find(found.mime_types.last()?)
    }

    /// Best magic match for `data` and its priority (0 when nothing matched).
    pub fn find_by_content(&self, data: &[u8]) -> (Option<Arc<TypeRecord>>, u32) {
        self.find_by_content_above(data, 0)
    }

    /// Best magic match whose priority is strictly above `floor`.
    ///
    /// Types are probed most specific level first; on equal priority the
    /// first one probed is kept.
    pub(crate) fn find_by_content_above(
        &self,
        data: &[u8],
        floor: u32,
    ) -> (Option<Arc<TypeRecord>>, u32) {
        let data = &data[..data.len().min(MAX_DATA)];
        self.with_levels(|state| {
            let mut best = None;
            let mut priority = floor;
            for &id in state.hierarchy.scan_order() {
                let record = &state.records[id.index()];
                if let Some(p) = record.matches_data(data) {
                    if p > priority {
                        priority = p;
                        best = Some(Arc::clone(record));
                    }
                }
            }
            (best, priority)
        })
    }

    /// Hierarchy level of a registered type (0 = most generic).
    pub fn level_of(&self, name: &str) -> Option<u32> {
        self.with_levels(|state| state.id_of(name).map(|id| state.hierarchy.level(id)))
    }

    pub fn max_level(&self) -> u32 {
        self.with_levels(|state| state.hierarchy.max_level())
    }

    /// All ancestors of a type, breadth first: direct parents first, least specific last.
    ///
    /// Parents that were never registered are listed but not expanded.
    pub fn all_parent_types(&self, name: &str) -> Vec<String> {
        let state = self.read();
        let Some(record) = state.find(name) else {
            return Vec::new();
        };

        let resolved = |r: &TypeRecord| -> Vec<String> {
            r.parents()
                .iter()
                .map(|p| state.graph.resolve(p).to_string())
                .collect()
        };
        let mut seen = HashSet::from([record.name().to_string()]);
        let mut queue: VecDeque<String> = resolved(record.as_ref()).into();
        let mut ancestors = Vec::new();

        while let Some(parent) = queue.pop_front() {
            if !seen.insert(parent.clone()) {
                continue;
            }
            if let Some(parent_record) = state.find(&parent) {
                queue.extend(resolved(parent_record.as_ref()));
            }
            ancestors.push(parent);
        }

        ancestors
    }

    /// Reports whether `name` is `ancestor` or descends from it (aliases allowed on both sides).
    pub fn inherits(&self, name: &str, ancestor: &str) -> bool {
        let (name, ancestor) = {
            let state = self.read();
            (state.graph.resolve(name).to_string(), state.graph.resolve(ancestor).to_string())
        };
        name == ancestor || self.all_parent_types(&name).contains(&ancestor)
    }

    /// Every registered record, sorted by name. Aliases are not listed.
    pub fn all_types(&self) -> Vec<Arc<TypeRecord>> {
        let mut types = self.read().records.clone();
        types.sort_by(|a, b| a.name().cmp(b.name()));
        types
    }

    /// Every `*.ext` suffix of every type, sorted and deduplicated.
    pub fn all_suffixes(&self) -> Vec<String> {
        let state = self.read();
        let mut suffixes: Vec<String> = state
            .records
            .iter()
            .flat_map(|r| r.suffixes().into_iter().map(str::to_string).collect::<Vec<_>>())
            .collect();
        suffixes.sort();
        suffixes.dedup();
        suffixes
    }

    /// File-dialog filter strings of every type that has globs, sorted and deduplicated.
    pub fn all_filter_strings(&self) -> Vec<String> {
        let state = self.read();
        let mut filters: Vec<String> = state
            .records
            .iter()
            .map(|r| r.filter_string())
            .filter(|f| !f.is_empty())
            .collect();
        filters.sort();
        filters.dedup();
        filters
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
