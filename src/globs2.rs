//! Loader for the shared-mime-info `globs2` file.
//!
//! Format: `weight:mimetype:glob[:flags[:morefields...]]`, one glob per line.
//! Example: `50:text/plain:*.txt`, or `50:text/x-csrc:*.c:cs` for a
//! case-sensitive pattern.
//!
//! See https://specifications.freedesktop.org/shared-mime-info-spec/latest/ar01s02.html

use crate::error::Result;
use crate::registry::MimeRegistry;
use std::io::BufRead;
use tracing::debug;

/// Adds every glob of a `globs2` stream to `registry`.
///
/// Comment and malformed lines are skipped. Returns the number of globs added.
pub fn load_globs2<R: BufRead>(reader: R, registry: &MimeRegistry) -> Result<usize> {
    let mut added = 0;

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 3 || fields[1].is_empty() || fields[2].is_empty() {
            debug!(line = number + 1, "Skipping malformed globs2 line");
            continue;
        }
        let Ok(weight) = fields[0].parse::<u32>() else {
            debug!(line = number + 1, weight = fields[0], "Skipping globs2 line with bad weight");
            continue;
        };
        let case_sensitive = fields
            .get(3)
            .is_some_and(|flags| flags.split(',').any(|flag| flag == "cs"));

        match registry.add_glob_pattern(fields[2], fields[1], weight, case_sensitive) {
            Ok(()) => added += 1,
            Err(e) => debug!(line = number + 1, error = %e, "Skipping globs2 line"),
        }
    }

    Ok(added)
}
