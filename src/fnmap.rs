//! External function map: joins the mapping tool's listings.
//!
//! `definedFns.txt` has one `name file` record per defined function, with a `!`
//! prefix marking the entry point. `externalFns.txt` has one referenced but
//! undefined function name per line. The map keeps only external functions that
//! some translation unit defines, pointing at the definer's AST file.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::error::{Result, XtuError};
use crate::layout::XtuLayout;

/// Prefix the mapping tool puts on the program's entry-point function.
pub const ENTRY_POINT_MARKER: char = '!';

/// Parse the defined-functions listing into function name → defining file.
///
/// A later record for the same name replaces the earlier one.
pub fn parse_defined_functions(text: &str) -> HashMap<String, String> {
    let mut defined = HashMap::new();

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split(' ');
        let (name, file) = match (fields.next(), fields.next(), fields.next()) {
            (Some(name), Some(file), None) => (name, file),
            _ => {
                tracing::warn!(line = lineno + 1, record = line, "malformed defined-function record");
                continue;
            }
        };

        let name = name.strip_prefix(ENTRY_POINT_MARKER).unwrap_or(name);
        defined.insert(name.to_string(), file.to_string());
    }

    defined
}

/// Keep each external function that has a definer, once, in listing order.
pub fn merge_external_functions(
    defined: &HashMap<String, String>,
    external_text: &str,
) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for line in external_text.lines() {
        let name = line.trim();
        if name.is_empty() || seen.contains(name) {
            continue;
        }
        if let Some(file) = defined.get(name) {
            seen.insert(name.to_string());
            entries.push((name.to_string(), file.clone()));
        }
    }

    entries
}

/// Render map entries as `name file.ast` lines.
pub fn render_map(entries: &[(String, String)]) -> String {
    let mut out = String::new();
    for (name, file) in entries {
        out.push_str(name);
        out.push(' ');
        out.push_str(file);
        out.push_str(".ast\n");
    }
    out
}

/// Build `externalFnMap.txt` from the two listings. Returns the entry count.
///
/// The mapping tool only creates a listing when it has something to write.
/// With `missing_as_empty`, an absent listing reads as empty; otherwise it is
/// a [`XtuError::MissingListing`].
pub fn write_external_function_map(layout: &XtuLayout, missing_as_empty: bool) -> Result<usize> {
    let defined_text = read_listing(&layout.defined_fns(), missing_as_empty)?;
    let external_text = read_listing(&layout.external_fns(), missing_as_empty)?;

    let defined = parse_defined_functions(&defined_text);
    let entries = merge_external_functions(&defined, &external_text);

    let out_path = layout.external_fn_map();
    fs::write(&out_path, render_map(&entries))?;

    tracing::info!(
        defined = defined.len(),
        mapped = entries.len(),
        path = %out_path.display(),
        "wrote external function map"
    );
    Ok(entries.len())
}

fn read_listing(path: &Path, missing_as_empty: bool) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if missing_as_empty {
                tracing::debug!(path = %path.display(), "listing absent, treating as empty");
                Ok(String::new())
            } else {
                Err(XtuError::MissingListing(path.to_path_buf()))
            }
        }
        Err(e) => Err(e.into()),
    }
}
