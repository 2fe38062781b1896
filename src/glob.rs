//! Filename glob rules and the weighted glob index.
//!
//! The index keeps three partitions:
//! - fast patterns: case-insensitive `*.ext` globs at the default weight
//!   whose `ext` has no dot, looked up by lowercased extension,
//! - high-weight globs (weight > 50), scanned first,
//! - low-weight globs (weight <= 50), scanned after the fast lookup.
//!
//! A longer matching pattern displaces shorter ones (`*.tar.bz2` beats
//! `*.bz2`), a higher weight beats any length, and equal matches accumulate.

use crate::error::{Error, Result};
use crate::grammar::simple_extension;
use globset::{GlobBuilder, GlobMatcher};
use std::collections::HashMap;

/// Weight of a glob that does not declare one, and of every fast pattern.
pub const DEFAULT_WEIGHT: u32 = 50;

/// Highest glob weight.
pub const MAX_WEIGHT: u32 = 100;

/// A filename rule as declared by a type: pattern, weight and case rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobRule {
    pub pattern: String,
    pub weight: u32,
    pub case_sensitive: bool,
}

impl GlobRule {
    /// Creates a case-insensitive rule at the default weight.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            weight: DEFAULT_WEIGHT,
            case_sensitive: false,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    // `*.ext` with a single dot: the fast lookup keys on the text after the last dot.
    fn is_fast(&self) -> bool {
        self.weight == DEFAULT_WEIGHT
            && !self.case_sensitive
            && simple_extension(&self.pattern).is_some_and(|ext| !ext.contains('.'))
    }
}

/// A rule compiled for one owning type.
#[derive(Debug, Clone)]
struct GlobPattern {
    rule: GlobRule,
    mime_type: String,
    matcher: GlobMatcher,
    pattern_len: usize,
}

impl GlobPattern {
    fn new(rule: GlobRule, mime_type: &str) -> Result<Self> {
        let matcher = GlobBuilder::new(&rule.pattern)
            .case_insensitive(!rule.case_sensitive)
            .literal_separator(false)
            .backslash_escape(true)
            .build()
            .map_err(|source| Error::InvalidGlob {
                pattern: rule.pattern.clone(),
                source,
            })?
            .compile_matcher();
        let pattern_len = rule.pattern.chars().count();

        Ok(Self {
            rule,
            mime_type: mime_type.to_string(),
            matcher,
            pattern_len,
        })
    }

    fn matches(&self, file_name: &str) -> bool {
        self.matcher.is_match(file_name)
    }

    fn is_same(&self, pattern: &str, mime_type: &str) -> bool {
        self.rule.pattern == pattern && self.mime_type == mime_type
    }
}

/// Result of a filename lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobMatch {
    /// Candidate type names, in accumulation order. More than one on a tie.
    pub mime_types: Vec<String>,
    /// Extension of the winning `*.ext` pattern, if the winner had that shape.
    pub extension: Option<String>,
}

impl GlobMatch {
    pub fn is_empty(&self) -> bool {
        self.mime_types.is_empty()
    }
}

/// Running best match while scanning a pattern list.
#[derive(Default)]
struct Accumulator {
    found: GlobMatch,
    weight: u32,
    pattern_len: usize,
}

impl Accumulator {
    fn push(&mut self, mime_type: &str) {
        if !self.found.mime_types.iter().any(|t| t == mime_type) {
            self.found.mime_types.push(mime_type.to_string());
        }
    }

    fn scan(&mut self, patterns: &[GlobPattern], file_name: &str) {
        for glob in patterns {
            if !glob.matches(file_name) {
                continue;
            }
            // Lists are sorted by descending weight, nothing further can win.
            if glob.rule.weight < self.weight {
                break;
            }
            if glob.pattern_len < self.pattern_len {
                continue;
            }
            if glob.pattern_len > self.pattern_len {
                self.found.mime_types.clear();
                self.found.extension = None;
                self.pattern_len = glob.pattern_len;
            }
            self.weight = glob.rule.weight;
            self.push(&glob.mime_type);
            if let Some(ext) = simple_extension(&glob.rule.pattern) {
                self.found.extension = Some(ext.to_string());
            }
        }
    }
}

/// A fast `*.ext` entry, keyed in the index by its lowercased extension.
#[derive(Debug, Clone)]
struct FastEntry {
    pattern: String,
    mime_type: String,
}

/// Maps filenames to the type names their glob rules imply.
#[derive(Debug, Default, Clone)]
pub struct GlobPatternIndex {
    fast_patterns: HashMap<String, Vec<FastEntry>>,
    high_weight_globs: Vec<GlobPattern>,
    low_weight_globs: Vec<GlobPattern>,
}

impl GlobPatternIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `rule` for `mime_type`.
    ///
    /// Re-adding the same pattern for the same type replaces the earlier entry.
    pub fn add(&mut self, rule: GlobRule, mime_type: &str) -> Result<()> {
        if rule.weight == 0 || rule.weight > MAX_WEIGHT {
            return Err(Error::WeightOutOfRange(rule.weight));
        }

        if rule.is_fast() {
            // Still compiled so a bad pattern is rejected the same way everywhere.
            GlobPattern::new(rule.clone(), mime_type)?;
            self.remove(&rule.pattern, mime_type);
            let ext = simple_extension(&rule.pattern)
                .unwrap_or_default()
                .to_lowercase();
            self.fast_patterns.entry(ext).or_default().push(FastEntry {
                pattern: rule.pattern,
                mime_type: mime_type.to_string(),
            });
            return Ok(());
        }

        let glob = GlobPattern::new(rule, mime_type)?;
        self.remove(&glob.rule.pattern, mime_type);
        let list = if glob.rule.weight > DEFAULT_WEIGHT {
            &mut self.high_weight_globs
        } else {
            &mut self.low_weight_globs
        };
        let at = list.partition_point(|g| g.rule.weight >= glob.rule.weight);
        list.insert(at, glob);
        Ok(())
    }

    fn remove(&mut self, pattern: &str, mime_type: &str) {
        if let Some(ext) = simple_extension(pattern) {
            let ext = ext.to_lowercase();
            if let Some(entries) = self.fast_patterns.get_mut(&ext) {
                entries.retain(|e| e.pattern != pattern || e.mime_type != mime_type);
                if entries.is_empty() {
                    self.fast_patterns.remove(&ext);
                }
            }
        }
        self.high_weight_globs.retain(|g| !g.is_same(pattern, mime_type));
        self.low_weight_globs.retain(|g| !g.is_same(pattern, mime_type));
    }

    /// Returns the candidate types for a bare filename (no directory part).
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_mimedb::glob::{GlobPatternIndex, GlobRule};
    ///
    /// let mut index = GlobPatternIndex::new();
    /// index.add(GlobRule::new("*.bz2"), "application/x-bzip").unwrap();
    /// index.add(GlobRule::new("*.tar.bz2"), "application/x-bzip-compressed-tar").unwrap();
    ///
    /// let found = index.candidates("foo.tar.bz2");
    /// assert_eq!(found.mime_types, vec!["application/x-bzip-compressed-tar"]);
    /// assert_eq!(found.extension.as_deref(), Some("tar.bz2"));
    /// ```
    pub fn candidates(&self, file_name: &str) -> GlobMatch {
        let mut acc = Accumulator::default();
        acc.scan(&self.high_weight_globs, file_name);
        if !acc.found.is_empty() {
            return acc.found;
        }

        if let Some((_, ext)) = file_name.rsplit_once('.') {
            let ext = ext.to_lowercase();
            if let Some(entries) = self.fast_patterns.get(&ext) {
                // Seed the baseline: *.ext has ext.len() + 2 characters.
                acc.pattern_len = ext.chars().count() + 2;
                acc.weight = DEFAULT_WEIGHT;
                for entry in entries {
                    acc.push(&entry.mime_type);
                }
                acc.found.extension = Some(ext);
            }
        }

        // A longer low-weight pattern (*.tar.bz2) must still displace a fast hit (*.bz2).
        acc.scan(&self.low_weight_globs, file_name);
        acc.found
    }

    /// Number of registered `(pattern, type)` entries.
    pub fn len(&self) -> usize {
        self.fast_patterns.values().map(Vec::len).sum::<usize>()
            + self.high_weight_globs.len()
            + self.low_weight_globs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
