//! The lookup facade.
//!
//! [`MimeDatabase`] answers "what type is this?" from a filename, from
//! content, or from both. Every query resolves to some type: when nothing
//! matches, the answer is [`MimeDatabase::default_type`].

use crate::error::{Error, Result};
use crate::file_context::{FileMatchContext, MAX_DATA};
use crate::globs2::load_globs2;
use crate::magic::MagicRuleGroup;
use crate::mime_type::{TypeRecord, DEFAULT_TYPE};
use crate::parser::parse_mime_info;
use crate::registry::MimeRegistry;
use bytes::Bytes;
use once_cell::sync::Lazy;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Content priority a name candidate's own magic must exceed to be accepted
/// without scanning every type. Also the implied priority of a name match.
pub const MIN_MATCH_WEIGHT: u32 = 50;

const DIRECTORY_TYPE: &str = "inode/directory";

/// How [`MimeDatabase::mime_type_for_file`] decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Filename first, refined by content.
    #[default]
    Default,
    /// Filename only; the file is never opened.
    Extension,
    /// Content only; the filename is ignored.
    Content,
}

/// The types every seeded database starts with.
const BUILTIN_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mime-info xmlns="http://www.freedesktop.org/standards/shared-mime-info">
  <mime-type type="application/octet-stream">
    <comment>unknown</comment>
  </mime-type>
  <mime-type type="text/plain">
    <comment>plain text document</comment>
    <glob pattern="*.txt"/>
    <glob pattern="*.asc"/>
  </mime-type>
  <mime-type type="text/html">
    <comment>HTML document</comment>
    <glob pattern="*.html"/>
    <glob pattern="*.htm"/>
    <magic priority="50">
      <match type="string" value="&lt;!DOCTYPE html" offset="0:256"/>
      <match type="string" value="&lt;html" offset="0:256"/>
    </magic>
  </mime-type>
  <mime-type type="application/xml">
    <comment>XML document</comment>
    <sub-class-of type="text/plain"/>
    <alias type="text/xml"/>
    <glob pattern="*.xml"/>
    <magic priority="50">
      <match type="string" value="&lt;?xml" offset="0"/>
    </magic>
  </mime-type>
  <mime-type type="application/json">
    <comment>JSON document</comment>
    <glob pattern="*.json"/>
  </mime-type>
  <mime-type type="application/pdf">
    <comment>PDF document</comment>
    <generic-icon name="x-office-document"/>
    <glob pattern="*.pdf"/>
    <magic priority="50">
      <match type="string" value="%PDF-" offset="0"/>
    </magic>
  </mime-type>
  <mime-type type="image/png">
    <comment>PNG image</comment>
    <glob pattern="*.png"/>
    <magic priority="50">
      <match type="string" value="\x89PNG" offset="0"/>
    </magic>
  </mime-type>
  <mime-type type="image/jpeg">
    <comment>JPEG image</comment>
    <glob pattern="*.jpg"/>
    <glob pattern="*.jpeg"/>
    <glob pattern="*.jpe"/>
    <magic priority="50">
      <match type="string" value="\377\330\377" offset="0"/>
    </magic>
  </mime-type>
  <mime-type type="image/gif">
    <comment>GIF image</comment>
    <glob pattern="*.gif"/>
    <magic priority="50">
      <match type="string" value="GIF8" offset="0"/>
    </magic>
  </mime-type>
  <mime-type type="application/gzip">
    <comment>Gzip archive</comment>
    <glob pattern="*.gz"/>
    <magic priority="50">
      <match type="string" value="\037\213" offset="0"/>
    </magic>
  </mime-type>
  <mime-type type="application/x-bzip">
    <comment>Bzip archive</comment>
    <glob pattern="*.bz2"/>
    <glob pattern="*.bz"/>
    <magic priority="50">
      <match type="string" value="BZh" offset="0"/>
    </magic>
  </mime-type>
  <mime-type type="application/x-bzip-compressed-tar">
    <comment>Tar archive (bzip-compressed)</comment>
    <sub-class-of type="application/x-bzip"/>
    <glob pattern="*.tar.bz2"/>
    <glob pattern="*.tbz2"/>
  </mime-type>
  <mime-type type="application/x-tar">
    <comment>Tar archive</comment>
    <glob pattern="*.tar"/>
    <magic priority="50">
      <match type="string" value="ustar" offset="257"/>
    </magic>
  </mime-type>
  <mime-type type="inode/directory">
    <comment>folder</comment>
    <generic-icon name="folder"/>
  </mime-type>
</mime-info>
"#;

static GLOBAL: Lazy<MimeDatabase> = Lazy::new(MimeDatabase::with_builtin_types);

/// A MIME database. Clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct MimeDatabase {
    registry: Arc<MimeRegistry>,
}

impl MimeDatabase {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a database seeded with a small table of common types.
    pub fn with_builtin_types() -> Self {
        let db = Self::new();
        if let Err(e) = db.add_types_from_stream(BUILTIN_TYPES.as_bytes(), "<builtin>") {
            warn!(error = %e, "Failed to load builtin MIME types");
        }
        db
    }

    /// The process-wide database, seeded with the builtin types on first use.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_mimedb::MimeDatabase;
    ///
    /// let db = MimeDatabase::global();
    /// let found = db.mime_type_for_file_name("archive.tar.bz2");
    /// assert_eq!(found.name(), "application/x-bzip-compressed-tar");
    /// assert_eq!(db.mime_type_for_data(b"%PDF-1.7").name(), "application/pdf");
    /// ```
    pub fn global() -> &'static MimeDatabase {
        &GLOBAL
    }

    pub fn registry(&self) -> &MimeRegistry {
        &self.registry
    }

    /// The registered `application/octet-stream`, or a bare record of that name.
    pub fn default_type(&self) -> Arc<TypeRecord> {
        self.registry
            .find_by_type(DEFAULT_TYPE)
            .unwrap_or_else(|| Arc::new(TypeRecord::new(DEFAULT_TYPE)))
    }

    fn or_default(&self, record: Option<Arc<TypeRecord>>) -> Arc<TypeRecord> {
        record.unwrap_or_else(|| self.default_type())
    }

    pub fn add_type(&self, record: TypeRecord) -> bool {
        self.registry.add_type(record)
    }

    pub fn add_glob_pattern(
        &self,
        pattern: &str,
        type_name: &str,
        weight: u32,
        case_sensitive: bool,
    ) -> Result<()> {
        self.registry
            .add_glob_pattern(pattern, type_name, weight, case_sensitive)
    }

    pub fn add_magic_rule_group(&self, type_name: &str, group: MagicRuleGroup) -> bool {
        self.registry.add_magic_rule_group(type_name, group)
    }

    /// Ingests a `mime-info` XML document.
    ///
    /// On error, the types read before the failure stay registered.
    #[instrument(skip(self, data), fields(len = data.len()))]
    pub fn add_types_from_stream(&self, data: &[u8], label: &str) -> Result<()> {
        let mut added = 0usize;
        let result = parse_mime_info(data, label, |record| {
            if self.registry.add_type(record) {
                added += 1;
            }
        });
        debug!(types = added, "Loaded MIME type definitions");
        result
    }

    /// Reads and ingests a `mime-info` XML file.
    pub async fn add_types_from_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| Error::parse(&label, format!("Cannot open: {e}")))?;
        self.add_types_from_stream(&data, &label)
    }

    /// Ingests a `globs2` file. Returns the number of globs added.
    pub fn add_globs2<R: BufRead>(&self, reader: R) -> Result<usize> {
        load_globs2(reader, &self.registry)
    }

    /// The record for a name or alias.
    pub fn resolve_by_name(&self, name: &str) -> Option<Arc<TypeRecord>> {
        self.registry.find_by_type(name)
    }

    /// Glob candidates for a filename; several on a tie.
    pub fn candidates_by_filename(&self, file_name: &str) -> Vec<String> {
        self.registry.candidates_by_filename(file_name).mime_types
    }

    /// Registered records of every glob candidate.
    pub fn mime_types_for_file_name(&self, file_name: &str) -> Vec<Arc<TypeRecord>> {
        self.candidates_by_filename(file_name)
            .iter()
            .filter_map(|name| self.registry.find_by_type(name))
            .collect()
    }

    /// The type of a filename alone.
    ///
    /// Ties are broken by taking the alphabetically first candidate: arbitrary but stable.
    pub fn mime_type_for_file_name(&self, file_name: &str) -> Arc<TypeRecord> {
        let mut names = self.candidates_by_filename(file_name);
        names.sort();
        self.or_default(names.first().and_then(|name| self.registry.find_by_type(name)))
    }

    /// Extension of the `*.ext` pattern that matched, e.g. `tar.bz2` for `foo.tar.bz2`.
    pub fn suffix_for_file_name(&self, file_name: &str) -> Option<String> {
        self.registry.candidates_by_filename(file_name).extension
    }

    /// Best content match and its priority (0 when nothing matched).
    pub fn match_by_content(&self, data: &[u8]) -> (Option<Arc<TypeRecord>>, u32) {
        self.registry.find_by_content(data)
    }

    pub fn mime_type_for_data(&self, data: &[u8]) -> Arc<TypeRecord> {
        self.or_default(self.match_by_content(data).0)
    }

    /// Combined filename and content lookup.
    ///
    /// `data` is only called when `is_readable` is true, and at most once.
    /// Returning `None` from it counts as unreadable.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytes::Bytes;
    /// use tokio_mimedb::MimeDatabase;
    ///
    /// let db = MimeDatabase::with_builtin_types();
    /// let found = db.match_by_file_and_content("scan.bin", true, || {
    ///     Some(Bytes::from_static(b"%PDF-1.4"))
    /// });
    /// assert_eq!(found.name(), "application/pdf");
    /// ```
    pub fn match_by_file_and_content<F>(
        &self,
        path: impl AsRef<Path>,
        is_readable: bool,
        data: F,
    ) -> Arc<TypeRecord>
    where
        F: FnOnce() -> Option<Bytes>,
    {
        let candidate = self.registry.name_candidate(&file_name_of(path.as_ref()));
        let data = if is_readable { data() } else { None };
        self.refine(candidate, data.as_deref())
    }

    /// Combined lookup over data already in memory.
    pub fn mime_type_for_file_name_and_data(
        &self,
        file_name: &str,
        data: &[u8],
    ) -> Arc<TypeRecord> {
        let candidate = self.registry.name_candidate(file_name);
        self.refine(candidate, Some(data))
    }

    fn refine(&self, candidate: Option<Arc<TypeRecord>>, data: Option<&[u8]>) -> Arc<TypeRecord> {
        let Some(data) = data else {
            return self.or_default(candidate);
        };
        let data = &data[..data.len().min(MAX_DATA)];

        let name_priority = match &candidate {
            Some(record) => {
                if record.matches_data(data).is_some_and(|p| p > MIN_MATCH_WEIGHT) {
                    return Arc::clone(record);
                }
                MIN_MATCH_WEIGHT
            }
            None => 0,
        };

        // Only strictly higher content priority displaces the name match.
        let (found, _) = self.registry.find_by_content_above(data, name_priority);
        self.or_default(found.or(candidate))
    }

    /// Identifies a file on disk.
    ///
    /// Directories are `inode/directory`. Read failures fall back to the filename.
    pub async fn mime_type_for_file(
        &self,
        path: impl AsRef<Path>,
        mode: MatchMode,
    ) -> Arc<TypeRecord> {
        let path = path.as_ref();
        if let Ok(metadata) = tokio::fs::metadata(path).await {
            if metadata.is_dir() {
                return self.or_default(self.registry.find_by_type(DIRECTORY_TYPE));
            }
        }

        let mut ctx = FileMatchContext::new(path);
        match mode {
            MatchMode::Extension => self.mime_type_for_file_name(ctx.file_name()),
            MatchMode::Content => {
                let data = ctx.data().await;
                self.mime_type_for_data(&data)
            }
            MatchMode::Default => {
                let candidate = self.registry.name_candidate(ctx.file_name());
                let data = if ctx.is_readable().await {
                    Some(ctx.data().await)
                } else {
                    None
                };
                self.refine(candidate, data.as_deref())
            }
        }
    }

    /// Every registered type, sorted by name.
    pub fn all_types(&self) -> Vec<Arc<TypeRecord>> {
        self.registry.all_types()
    }

    pub fn all_suffixes(&self) -> Vec<String> {
        self.registry.all_suffixes()
    }

    pub fn all_filter_strings(&self) -> Vec<String> {
        self.registry.all_filter_strings()
    }

    /// All filters for a file dialog, `"All Files (*)"` first, separated by `;;`.
    pub fn all_filters_string(&self) -> String {
        let filters = self.all_filter_strings();
        if filters.is_empty() {
            return String::new();
        }
        std::iter::once("All Files (*)".to_string())
            .chain(filters)
            .collect::<Vec<_>>()
            .join(";;")
    }

    pub fn all_parent_types(&self, name: &str) -> Vec<String> {
        self.registry.all_parent_types(name)
    }

    pub fn inherits(&self, name: &str, ancestor: &str) -> bool {
        self.registry.inherits(name, ancestor)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
