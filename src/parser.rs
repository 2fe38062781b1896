//! Reader for freedesktop.org `mime-info` XML documents.
//!
//! ```xml
//! <mime-info xmlns="http://www.freedesktop.org/standards/shared-mime-info">
//!   <mime-type type="application/pdf">
//!     <comment>PDF document</comment>
//!     <comment xml:lang="fr">document PDF</comment>
//!     <generic-icon name="x-office-document"/>
//!     <glob pattern="*.pdf"/>
//!     <magic priority="50">
//!       <match type="string" value="%PDF-" offset="0"/>
//!     </magic>
//!   </mime-type>
//! </mime-info>
//! ```
//!
//! Records are handed out as soon as their `</mime-type>` is read, so an
//! error later in the document does not undo what was already delivered.

use crate::error::{Error, Result};
use crate::glob::{GlobRule, DEFAULT_WEIGHT};
use crate::grammar::{is_valid_type_name, media_of};
use crate::magic::{MagicRule, MagicRuleGroup, DEFAULT_PRIORITY};
use crate::mime_type::{TypeRecord, DEFAULT_TYPE};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::mem;

/// Parses a `mime-info` document, calling `on_type` for each complete type.
///
/// `label` names the input in error messages.
///
/// # Examples
///
/// ```
/// use tokio_mimedb::parser::parse_mime_info;
///
/// let xml = br#"<mime-info>
///   <mime-type type="text/x-csrc">
///     <comment>C source code</comment>
///     <glob pattern="*.c" case-sensitive="true"/>
///   </mime-type>
/// </mime-info>"#;
///
/// let mut types = Vec::new();
/// parse_mime_info(xml, "c.xml", |t| types.push(t)).unwrap();
/// assert_eq!(types[0].name(), "text/x-csrc");
/// assert_eq!(types[0].parents(), ["text/plain"]);
/// ```
pub fn parse_mime_info(
    data: &[u8],
    label: &str,
    mut on_type: impl FnMut(TypeRecord),
) -> Result<()> {
    let mut reader = Reader::from_reader(data);
    reader.config_mut().trim_text(true);

    let mut state = ReaderState::new(label);
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| state.error(format!("at position {}: {e}", reader.buffer_position())))?;
        match event {
            Event::Start(e) => state.open(&e)?,
            Event::Empty(e) => {
                state.open(&e)?;
                state.close(e.name().as_ref(), &mut on_type)?;
            }
            Event::End(e) => state.close(e.name().as_ref(), &mut on_type)?,
            Event::Text(e) => {
                if state.comment.is_some() {
                    let text = e.unescape().map_err(|e| state.error(e.to_string()))?;
                    state.text.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    match &state.current {
        Some(record) => Err(state.error(format!("unterminated <mime-type> {}", record.name()))),
        None => Ok(()),
    }
}

struct ReaderState<'a> {
    label: &'a str,
    current: Option<TypeRecord>,
    // Some(locale) while inside <comment>.
    comment: Option<Option<String>>,
    text: String,
    magic: Option<MagicRuleGroup>,
    matches: Vec<MagicRule>,
}

impl<'a> ReaderState<'a> {
    fn new(label: &'a str) -> Self {
        Self {
            label,
            current: None,
            comment: None,
            text: String::new(),
            magic: None,
            matches: Vec::new(),
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::parse(self.label, message)
    }

    fn record(&mut self, element: &str) -> Result<&mut TypeRecord> {
        match self.current.as_mut() {
            Some(record) => Ok(record),
            None => Err(Error::parse(self.label, format!("<{element}> outside of <mime-type>"))),
        }
    }

    fn open(&mut self, e: &BytesStart<'_>) -> Result<()> {
        match e.name().as_ref() {
            b"mime-type" => {
                if let Some(record) = &self.current {
                    return Err(self.error(format!("<mime-type> nested inside {}", record.name())));
                }
                let name = self.required(e, "mime-type", "type")?;
                if !is_valid_type_name(&name) {
                    return Err(self.error(Error::InvalidTypeName(name).to_string()));
                }
                self.current = Some(TypeRecord::new(name));
            }
            b"comment" => {
                self.record("comment")?;
                let locale = self.optional(e, "xml:lang")?;
                self.comment = Some(locale);
                self.text.clear();
            }
            b"generic-icon" => {
                let icon = self.required(e, "generic-icon", "name")?;
                self.record("generic-icon")?.set_generic_icon_name(icon);
            }
            b"icon" => {
                let icon = self.required(e, "icon", "name")?;
                self.record("icon")?.set_icon_name(icon);
            }
            b"glob" => {
                let pattern = self.required(e, "glob", "pattern")?;
                let weight = match self.optional(e, "weight")? {
                    Some(w) => w
                        .trim()
                        .parse()
                        .map_err(|_| self.error(format!("invalid glob weight {w:?}")))?,
                    None => DEFAULT_WEIGHT,
                };
                let case_sensitive = self.optional(e, "case-sensitive")?.as_deref() == Some("true");
                let rule = GlobRule::new(pattern)
                    .with_weight(weight)
                    .case_sensitive(case_sensitive);
                self.record("glob")?.push_glob(rule);
            }
            b"sub-class-of" => {
                let parent = self.required(e, "sub-class-of", "type")?;
                self.record("sub-class-of")?.push_parent(parent);
            }
            b"alias" => {
                let alias = self.required(e, "alias", "type")?;
                self.record("alias")?.push_alias(alias);
            }
            b"magic" => {
                self.record("magic")?;
                let priority = match self.optional(e, "priority")? {
                    Some(p) => p
                        .trim()
                        .parse()
                        .map_err(|_| self.error(format!("invalid magic priority {p:?}")))?,
                    None => DEFAULT_PRIORITY,
                };
                let group = MagicRuleGroup::new(priority).map_err(|e| self.error(e.to_string()))?;
                self.magic = Some(group);
            }
            b"match" => {
                if self.magic.is_none() {
                    return Err(self.error("<match> outside of <magic>"));
                }
                let kind = self.required(e, "match", "type")?;
                let value = self.required(e, "match", "value")?;
                let offset = self.required(e, "match", "offset")?;
                let mask = self.optional(e, "mask")?;
                let rule = MagicRule::parse(&kind, &value, &offset, mask.as_deref())
                    .map_err(|e| self.error(e.to_string()))?;
                self.matches.push(rule);
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8], on_type: &mut impl FnMut(TypeRecord)) -> Result<()> {
        match name {
            b"mime-type" => {
                if let Some(mut record) = self.current.take() {
                    apply_implicit_parent(&mut record);
                    on_type(record);
                }
            }
            b"comment" => {
                if let Some(locale) = self.comment.take() {
                    let text = mem::take(&mut self.text);
                    self.record("comment")?.set_comment(locale, text);
                }
            }
            b"magic" => {
                if let Some(group) = self.magic.take() {
                    self.record("magic")?.push_magic(group);
                }
            }
            b"match" => {
                if let Some(rule) = self.matches.pop() {
                    match (self.matches.last_mut(), self.magic.as_mut()) {
                        (Some(parent), _) => parent.push_child(rule),
                        (None, Some(group)) => group.push(rule),
                        (None, None) => {}
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn optional(&self, e: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
        let attr = e
            .try_get_attribute(key)
            .map_err(|err| self.error(format!("bad attribute {key}: {err}")))?;
        match attr {
            Some(attr) => {
                let value = attr
                    .unescape_value()
                    .map_err(|err| self.error(format!("bad attribute {key}: {err}")))?;
                Ok(Some(value.into_owned()))
            }
            None => Ok(None),
        }
    }

    fn required(&self, e: &BytesStart<'_>, element: &str, key: &str) -> Result<String> {
        self.optional(e, key)?
            .ok_or_else(|| self.error(format!("missing {key} attribute in <{element}>")))
    }
}

/// Gives a type without declared parents the parent the XDG rules imply.
fn apply_implicit_parent(record: &mut TypeRecord) {
    if !record.parents().is_empty() {
        return;
    }
    let name = record.name();
    let parent = match media_of(name) {
        "inode" | "all" | "x-content" => return,
        "text" if name != "text/plain" => "text/plain",
        _ if name == DEFAULT_TYPE => return,
        _ => DEFAULT_TYPE,
    };
    record.push_parent(parent.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Result<Vec<TypeRecord>> {
        let mut types = Vec::new();
        parse_mime_info(xml.as_bytes(), "test.xml", |t| types.push(t))?;
        Ok(types)
    }

    #[test]
    fn test_full_record() {
        let types = parse(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <mime-info xmlns="http://www.freedesktop.org/standards/shared-mime-info">
              <mime-type type="application/xml">
                <comment>XML document</comment>
                <comment xml:lang="de">XML-Dokument</comment>
                <sub-class-of type="text/plain"/>
                <alias type="text/xml"/>
                <generic-icon name="text-x-generic"/>
                <icon name="xml-icon"/>
                <glob pattern="*.xml"/>
                <glob pattern="*.xbl" weight="40" case-sensitive="true"/>
                <magic priority="80">
                  <match type="string" value="&lt;?xml" offset="0"/>
                </magic>
              </mime-type>
            </mime-info>"#,
        )
        .unwrap();

        assert_eq!(types.len(), 1);
        let xml = &types[0];
        assert_eq!(xml.name(), "application/xml");
        assert_eq!(xml.comment(), "XML document");
        assert_eq!(xml.localized_comment("de"), "XML-Dokument");
        assert_eq!(xml.parents(), ["text/plain"]);
        assert_eq!(xml.aliases(), ["text/xml"]);
        assert_eq!(xml.generic_icon_name(), "text-x-generic");
        assert_eq!(xml.icon_name(), "xml-icon");
        assert_eq!(
            xml.glob_rules()[1],
            GlobRule::new("*.xbl").with_weight(40).case_sensitive(true)
        );
        assert_eq!(xml.matches_data(b"<?xml version=\"1.0\"?>"), Some(80));
    }

    #[test]
    fn test_nested_matches() {
        let types = parse(
            r#"<mime-info>
              <mime-type type="audio/x-wav">
                <magic>
                  <match type="string" value="RIFF" offset="0">
                    <match type="string" value="WAVE" offset="8"/>
                  </match>
                  <match type="big32" value="0x2e736e64" offset="0"/>
                </magic>
              </mime-type>
            </mime-info>"#,
        )
        .unwrap();

        let wav = &types[0];
        let group = &wav.magic_groups()[0];
        assert_eq!(group.priority(), DEFAULT_PRIORITY);
        assert_eq!(group.rules().len(), 2);
        assert_eq!(group.rules()[0].children().len(), 1);
        assert_eq!(wav.matches_data(b"RIFF\0\0\0\0WAVEfmt "), Some(50));
        assert_eq!(wav.matches_data(b"RIFF\0\0\0\0AVI "), None);
        assert_eq!(wav.matches_data(b".snd"), Some(50));
    }

    #[test]
    fn test_implicit_parents() {
        let types = parse(
            r#"<mime-info>
              <mime-type type="text/x-python"/>
              <mime-type type="text/plain"/>
              <mime-type type="image/png"/>
              <mime-type type="inode/directory"/>
              <mime-type type="x-content/video-dvd"/>
              <mime-type type="all/allfiles"/>
              <mime-type type="application/octet-stream"/>
              <mime-type type="application/x-shellscript">
                <sub-class-of type="application/x-executable"/>
              </mime-type>
            </mime-info>"#,
        )
        .unwrap();

        let parents: Vec<(&str, Vec<String>)> = types
            .iter()
            .map(|t| (t.name(), t.parents().to_vec()))
            .collect();
        assert_eq!(parents[0].1, ["text/plain"]);
        assert_eq!(parents[1].1, [DEFAULT_TYPE]);
        assert_eq!(parents[2].1, [DEFAULT_TYPE]);
        assert!(parents[3].1.is_empty());
        assert!(parents[4].1.is_empty());
        assert!(parents[5].1.is_empty());
        assert!(parents[6].1.is_empty());
        assert_eq!(parents[7].1, ["application/x-executable"]);
    }

    #[test]
    fn test_error_keeps_delivered_records() {
        let mut types = Vec::new();
        let err = parse_mime_info(
            br#"<mime-info>
              <mime-type type="text/x-first"><glob pattern="*.first"/></mime-type>
              <mime-type type="text/x-second"><glob pattern="*.second" weight="heavy"/></mime-type>
            </mime-info>"#,
            "broken.xml",
            |t| types.push(t),
        )
        .unwrap_err();

        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name(), "text/x-first");
        let message = err.to_string();
        assert!(message.starts_with("broken.xml: "), "{message}");
        assert!(message.contains("invalid glob weight"), "{message}");
    }

    #[test]
    fn test_malformed_documents() {
        assert!(parse(r#"<mime-info><mime-type type="text/x-a"></mime-info>"#).is_err());
        assert!(parse(r#"<mime-info><mime-type><comment>x</comment></mime-type></mime-info>"#)
            .is_err());
        assert!(parse(r#"<mime-info><mime-type type="nonsense"/></mime-info>"#).is_err());
        assert!(parse(r#"<mime-info><glob pattern="*.x"/></mime-info>"#).is_err());
        assert!(parse(
            r#"<mime-info><mime-type type="a/b"><magic priority="101"/></mime-type></mime-info>"#
        )
        .is_err());
        assert!(parse(
            r#"<mime-info><mime-type type="a/b">
                 <magic><match type="regex" value="x" offset="0"/></magic>
               </mime-type></mime-info>"#
        )
        .is_err());
        assert!(parse(r#"<mime-info><mime-type type="a/b">"#).is_err());
    }

    #[test]
    fn test_unknown_elements_are_ignored() {
        let types = parse(
            r#"<mime-info>
              <mime-type type="application/x-foo">
                <acronym>FOO</acronym>
                <expanded-acronym>Foo Object Output</expanded-acronym>
                <treemagic><treematch path="foo" type="file"/></treemagic>
                <glob pattern="*.foo"/>
              </mime-type>
            </mime-info>"#,
        )
        .unwrap();
        assert_eq!(types[0].glob_patterns(), ["*.foo"]);
        assert_eq!(types[0].comment(), "");
    }
}
