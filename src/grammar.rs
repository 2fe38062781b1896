//! Grammar helpers for MIME type names and glob patterns.
//!
//! Type names follow the RFC 2045 token definition: `token "/" token`.

/// Reports whether the character is in 'tspecials' as defined by RFC 1521 and RFC 2045.
///
/// tspecials := "(" / ")" / "<" / ">" / "@" / "," / ";" / ":" / "\" / <"> / "/" / "[" / "]" / "?" / "="
pub fn is_tspecial(c: char) -> bool {
    matches!(c, '(' | ')' | '<' | '>' | '@' | ',' | ';' | ':' | '\\' | '"' | '/' | '[' | ']' | '?' | '=')
}

/// Reports whether the character is in 'token' as defined by RFC 1521 and RFC 2045.
pub fn is_token_char(c: char) -> bool {
    c > '\x20' && c < '\x7f' && !is_tspecial(c)
}

/// Reports whether the string is a valid 'token': non-empty, token characters only.
pub fn is_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_token_char)
}

/// Reports whether `name` is a usable MIME type name, `media/subtype`.
///
/// ```
/// use tokio_mimedb::grammar::is_valid_type_name;
///
/// assert!(is_valid_type_name("image/svg+xml"));
/// assert!(!is_valid_type_name("text"));
/// assert!(!is_valid_type_name("text/plain; charset=utf-8"));
/// ```
pub fn is_valid_type_name(name: &str) -> bool {
    match name.split_once('/') {
        Some((media, subtype)) => is_token(media) && is_token(subtype),
        None => false,
    }
}

/// Reports whether the pattern uses any glob metacharacter.
pub fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Returns `ext` when the pattern is a plain `*.ext` suffix glob.
///
/// `*.tar.bz2` yields `tar.bz2`; `README*` and `*.[ch]` yield nothing.
pub fn simple_extension(pattern: &str) -> Option<&str> {
    let ext = pattern.strip_prefix("*.")?;
    if ext.is_empty() || has_glob_meta(ext) {
        return None;
    }
    Some(ext)
}

/// Returns the media part of a type name (`"text"` for `"text/plain"`).
pub fn media_of(name: &str) -> &str {
    name.split_once('/').map_or(name, |(media, _)| media)
}
