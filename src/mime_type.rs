//! MIME type records.
//!
//! A [`TypeRecord`] is everything the database knows about one type: its
//! canonical name, aliases, direct parents, comments, icons, glob rules and
//! magic rule groups. Records are plain values; relationships between them
//! are kept by name in the registry.

use crate::glob::GlobRule;
use crate::grammar::{is_valid_type_name, media_of, simple_extension};
use crate::magic::{best_priority, MagicRuleGroup};
use std::collections::HashMap;

/// Name of the generic binary type every lookup falls back to.
pub const DEFAULT_TYPE: &str = "application/octet-stream";

/// One MIME type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeRecord {
    name: String,
    aliases: Vec<String>,
    parents: Vec<String>,
    comment: String,
    localized_comments: HashMap<String, String>,
    generic_icon_name: Option<String>,
    icon_name: Option<String>,
    globs: Vec<GlobRule>,
    magic: Vec<MagicRuleGroup>,
    preferred_suffix: Option<String>,
}

impl TypeRecord {
    /// Creates an empty record for `name`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_mimedb::{GlobRule, TypeRecord};
    ///
    /// let pdf = TypeRecord::new("application/pdf")
    ///     .with_comment("PDF document")
    ///     .with_glob(GlobRule::new("*.pdf"));
    /// assert_eq!(pdf.preferred_suffix(), Some("pdf"));
    /// assert_eq!(pdf.filter_string(), "PDF document (*.pdf)");
    /// ```
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parents.push(parent.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_localized_comment(
        mut self,
        locale: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        self.localized_comments.insert(locale.into(), comment.into());
        self
    }

    pub fn with_generic_icon_name(mut self, icon: impl Into<String>) -> Self {
        self.generic_icon_name = Some(icon.into());
        self
    }

    pub fn with_icon_name(mut self, icon: impl Into<String>) -> Self {
        self.icon_name = Some(icon.into());
        self
    }

    pub fn with_glob(mut self, glob: GlobRule) -> Self {
        self.globs.push(glob);
        self
    }

    pub fn with_magic(mut self, group: MagicRuleGroup) -> Self {
        self.magic.push(group);
        self
    }

    pub fn with_preferred_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.preferred_suffix = Some(suffix.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reports whether the name is of the form `media/subtype`.
    pub fn is_valid(&self) -> bool {
        is_valid_type_name(&self.name)
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_TYPE
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Direct parents, as declared.
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// The default (untranslated) comment.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// The comment for exactly `locale`, or the default comment.
    pub fn localized_comment(&self, locale: &str) -> &str {
        self.localized_comments
            .get(locale)
            .map_or(self.comment.as_str(), String::as_str)
    }

    /// Declared generic icon, or `<media>-x-generic`.
    pub fn generic_icon_name(&self) -> String {
        match &self.generic_icon_name {
            Some(icon) => icon.clone(),
            None => format!("{}-x-generic", media_of(&self.name)),
        }
    }

    /// Declared icon, or the name with `/` replaced by `-`.
    pub fn icon_name(&self) -> String {
        match &self.icon_name {
            Some(icon) => icon.clone(),
            None => self.name.replace('/', "-"),
        }
    }

    pub fn glob_rules(&self) -> &[GlobRule] {
        &self.globs
    }

    pub fn glob_patterns(&self) -> Vec<&str> {
        self.globs.iter().map(|g| g.pattern.as_str()).collect()
    }

    pub fn magic_groups(&self) -> &[MagicRuleGroup] {
        &self.magic
    }

    /// Extensions named by plain `*.ext` globs, in declaration order.
    pub fn suffixes(&self) -> Vec<&str> {
        self.globs
            .iter()
            .filter_map(|g| simple_extension(&g.pattern))
            .collect()
    }

    /// The explicitly set suffix, or the first of [`suffixes`](Self::suffixes).
    pub fn preferred_suffix(&self) -> Option<&str> {
        match &self.preferred_suffix {
            Some(suffix) => Some(suffix.as_str()),
            None => self.suffixes().first().copied(),
        }
    }

    /// File-dialog filter, e.g. `"plain text document (*.txt *.asc)"`.
    ///
    /// Empty when the type has no glob patterns.
    pub fn filter_string(&self) -> String {
        if self.globs.is_empty() {
            return String::new();
        }
        let label = if self.comment.is_empty() {
            &self.name
        } else {
            &self.comment
        };
        format!("{} ({})", label, self.glob_patterns().join(" "))
    }

    /// Highest priority among this type's magic groups that match `data`.
    pub fn matches_data(&self, data: &[u8]) -> Option<u32> {
        best_priority(&self.magic, data)
    }

    pub(crate) fn push_alias(&mut self, alias: String) {
        self.aliases.push(alias);
    }

    pub(crate) fn push_parent(&mut self, parent: String) {
        self.parents.push(parent);
    }

    pub(crate) fn set_comment(&mut self, locale: Option<String>, comment: String) {
        match locale {
            Some(locale) => {
                self.localized_comments.insert(locale, comment);
            }
            None => self.comment = comment,
        }
    }

    pub(crate) fn set_generic_icon_name(&mut self, icon: String) {
        self.generic_icon_name = Some(icon);
    }

    pub(crate) fn set_icon_name(&mut self, icon: String) {
        self.icon_name = Some(icon);
    }

    pub(crate) fn push_glob(&mut self, glob: GlobRule) {
        self.globs.push(glob);
    }

    pub(crate) fn push_magic(&mut self, group: MagicRuleGroup) {
        self.magic.push(group);
    }

    pub(crate) fn set_magic(&mut self, groups: Vec<MagicRuleGroup>) {
        self.magic = groups;
    }

    pub(crate) fn set_preferred_suffix(&mut self, suffix: String) {
        self.preferred_suffix = Some(suffix);
    }
}
