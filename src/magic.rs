//! Byte-signature ("magic") rules.
//!
//! A [`MagicRuleGroup`] carries a priority and a list of alternative rules;
//! it matches when any rule matches. A [`MagicRule`] looks for a (masked)
//! byte sequence starting anywhere inside an inclusive offset range, and if
//! it has nested rules, one of them must match too.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::ops::RangeInclusive;

/// Highest magic priority.
pub const MAX_PRIORITY: u32 = 100;

/// Priority of a `<magic>` element that does not declare one.
pub const DEFAULT_PRIORITY: u32 = 50;

/// One byte-signature test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicRule {
    value: Bytes,
    mask: Option<Bytes>,
    start: usize,
    end: usize,
    children: Vec<MagicRule>,
}

impl MagicRule {
    /// Creates a rule looking for `value` at any start position in `offset`.
    pub fn new(value: impl Into<Bytes>, offset: RangeInclusive<usize>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::InvalidMagic("empty value".to_string()));
        }
        let (start, end) = offset.into_inner();
        if start > end {
            return Err(Error::InvalidMagic(format!("empty offset range {start}:{end}")));
        }

        Ok(Self {
            value,
            mask: None,
            start,
            end,
            children: Vec::new(),
        })
    }

    /// Creates a rule looking for `value` at exactly `offset`.
    pub fn at(value: impl Into<Bytes>, offset: usize) -> Result<Self> {
        Self::new(value, offset..=offset)
    }

    /// Applies `mask` to both the data and the value before comparing.
    pub fn with_mask(mut self, mask: impl Into<Bytes>) -> Result<Self> {
        let mask = mask.into();
        if mask.len() != self.value.len() {
            return Err(Error::InvalidMagic(format!(
                "mask length {} does not match value length {}",
                mask.len(),
                self.value.len()
            )));
        }
        self.mask = Some(mask);
        Ok(self)
    }

    /// Adds a nested rule; at least one nested rule must match as well.
    pub fn with_child(mut self, child: MagicRule) -> Self {
        self.children.push(child);
        self
    }

    pub(crate) fn push_child(&mut self, child: MagicRule) {
        self.children.push(child);
    }

    /// Builds a rule from the attributes of a shared-mime-info `<match>` element.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_mimedb::magic::MagicRule;
    ///
    /// let png = MagicRule::parse("string", "\\x89PNG", "0", None).unwrap();
    /// assert!(png.matches(b"\x89PNG\r\n\x1a\n"));
    ///
    /// let id3 = MagicRule::parse("string", "ID3", "0:64", None).unwrap();
    /// assert!(id3.matches(b"\0\0\0ID3"));
    /// ```
    pub fn parse(kind: &str, value: &str, offset: &str, mask: Option<&str>) -> Result<Self> {
        let offset = parse_offset(offset)?;
        let (value, mask) = match kind {
            "string" => {
                let value = unescape_string(value);
                let mask = mask.map(parse_hex_bytes).transpose()?;
                (value, mask)
            }
            "byte" => numeric(value, mask, |n| encode(n, 1, Endian::Big))?,
            "big16" => numeric(value, mask, |n| encode(n, 2, Endian::Big))?,
            "big32" => numeric(value, mask, |n| encode(n, 4, Endian::Big))?,
            "little16" => numeric(value, mask, |n| encode(n, 2, Endian::Little))?,
            "little32" => numeric(value, mask, |n| encode(n, 4, Endian::Little))?,
            "host16" => numeric(value, mask, |n| encode(n, 2, Endian::Host))?,
            "host32" => numeric(value, mask, |n| encode(n, 4, Endian::Host))?,
            other => return Err(Error::InvalidMagic(format!("unsupported match type {other:?}"))),
        };

        let rule = Self::new(value, offset)?;
        match mask {
            Some(mask) => rule.with_mask(mask),
            None => Ok(rule),
        }
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn mask(&self) -> Option<&[u8]> {
        self.mask.as_deref()
    }

    pub fn offset(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }

    pub fn children(&self) -> &[MagicRule] {
        &self.children
    }

    /// Reports whether this rule, and one of its nested rules if any, match `data`.
    pub fn matches(&self, data: &[u8]) -> bool {
        self.matches_here(data)
            && (self.children.is_empty() || self.children.iter().any(|c| c.matches(data)))
    }

    fn matches_here(&self, data: &[u8]) -> bool {
        let len = self.value.len();
        if data.len() < len {
            return false;
        }
        let last = self.end.min(data.len() - len);
        if self.start > last {
            return false;
        }
        (self.start..=last).any(|pos| self.matches_at(&data[pos..pos + len]))
    }

    fn matches_at(&self, window: &[u8]) -> bool {
        match &self.mask {
            None => window == &self.value[..],
            Some(mask) => window
                .iter()
                .zip(self.value.iter())
                .zip(mask.iter())
                .all(|((d, v), m)| d & m == v & m),
        }
    }
}

/// A prioritised set of alternative rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicRuleGroup {
    priority: u32,
    rules: Vec<MagicRule>,
}

impl MagicRuleGroup {
    pub fn new(priority: u32) -> Result<Self> {
        if priority > MAX_PRIORITY {
            return Err(Error::PriorityOutOfRange(priority));
        }
        Ok(Self {
            priority,
            rules: Vec::new(),
        })
    }

    pub fn with_rule(mut self, rule: MagicRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub(crate) fn push(&mut self, rule: MagicRule) {
        self.rules.push(rule);
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn rules(&self) -> &[MagicRule] {
        &self.rules
    }

    pub fn matches(&self, data: &[u8]) -> bool {
        self.rules.iter().any(|rule| rule.matches(data))
    }
}

/// Highest priority among the groups that match `data`.
pub(crate) fn best_priority(groups: &[MagicRuleGroup], data: &[u8]) -> Option<u32> {
    groups
        .iter()
        .filter(|group| group.matches(data))
        .map(MagicRuleGroup::priority)
        .max()
}

#[derive(Clone, Copy)]
enum Endian {
    Big,
    Little,
    Host,
}

fn encode(n: u64, width: usize, endian: Endian) -> Result<Vec<u8>> {
    if width < 8 && n >> (width * 8) != 0 {
        return Err(Error::InvalidMagic(format!("{n:#x} does not fit in {width} byte(s)")));
    }
    let bytes = n.to_be_bytes();
    let mut out = bytes[8 - width..].to_vec();
    let little = match endian {
        Endian::Big => false,
        Endian::Little => true,
        Endian::Host => cfg!(target_endian = "little"),
    };
    if little {
        out.reverse();
    }
    Ok(out)
}

fn numeric(
    value: &str,
    mask: Option<&str>,
    encode: impl Fn(u64) -> Result<Vec<u8>>,
) -> Result<(Vec<u8>, Option<Vec<u8>>)> {
    let value = encode(parse_number(value)?)?;
    let mask = mask.map(|m| parse_number(m).and_then(&encode)).transpose()?;
    Ok((value, mask))
}

/// Parses a decimal, `0x` hexadecimal or leading-zero octal number.
fn parse_number(s: &str) -> Result<u64> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        u64::from_str_radix(&s[1..], 8)
    } else {
        s.parse()
    };
    parsed.map_err(|_| Error::InvalidMagic(format!("invalid number {s:?}")))
}

fn parse_offset(s: &str) -> Result<RangeInclusive<usize>> {
    let invalid = || Error::InvalidMagic(format!("invalid offset {s:?}"));
    let (start, end) = match s.split_once(':') {
        Some((start, end)) => (start, end),
        None => (s, s),
    };
    let start: usize = start.trim().parse().map_err(|_| invalid())?;
    let end: usize = end.trim().parse().map_err(|_| invalid())?;
    if start > end {
        return Err(invalid());
    }
    Ok(start..=end)
}

fn parse_hex_bytes(s: &str) -> Result<Vec<u8>> {
    let hex = s.trim();
    let hex = hex.strip_prefix("0x").or_else(|| hex.strip_prefix("0X")).unwrap_or(hex);
    if hex.is_empty() || hex.len() % 2 != 0 || !hex.is_ascii() {
        return Err(Error::InvalidMagic(format!("invalid mask {s:?}")));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| Error::InvalidMagic(format!("invalid mask {s:?}")))
        })
        .collect()
}

/// Decodes the C-style escapes used by string values (`\n`, `\xHH`, `\NNN`, ...).
fn unescape_string(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        i += 1;
        let Some(&c) = bytes.get(i) else {
            out.push(b'\\');
            break;
        };
        match c {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'x' => {
                let digits = take_digits(&bytes[i + 1..], 2, |b| b.is_ascii_hexdigit());
                if digits.is_empty() {
                    out.push(b'x');
                } else {
                    out.push(radix_value(digits, 16) as u8);
                    i += digits.len();
                }
            }
            b'0'..=b'7' => {
                let digits = take_digits(&bytes[i..], 3, |b| (b'0'..=b'7').contains(&b));
                out.push((radix_value(digits, 8) & 0xff) as u8);
                i += digits.len() - 1;
            }
            other => out.push(other),
        }
        i += 1;
    }

    out
}

fn take_digits(bytes: &[u8], max: usize, accept: impl Fn(u8) -> bool) -> &[u8] {
    let n = bytes.iter().take(max).take_while(|&&b| accept(b)).count();
    &bytes[..n]
}

fn radix_value(digits: &[u8], radix: u32) -> u32 {
    digits
        .iter()
        .filter_map(|&d| (d as char).to_digit(radix))
        .fold(0, |acc, d| acc * radix + d)
}
