//! Name derivation from IDL spellings.
//!
//! Display names are what the generator exposes (exported, upper camel
//! case); internal names are the hidden counterpart (lower camel case).

use std::path::Path;

/// `getElementById` -> `GetElementById`, `_interface` -> `Interface`.
pub fn display_name(idl: &str) -> String {
    // A leading underscore escapes IDL keywords and is not part of the name.
    let trimmed = idl.strip_prefix('_').unwrap_or(idl);
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `HTMLElement` -> `hTMLElement`, used for unexported helpers.
pub fn internal_name(idl: &str) -> String {
    let trimmed = idl.strip_prefix('_').unwrap_or(idl);
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `ELEMENT_NODE` -> `ElementNode`.
///
/// Names that are not entirely upper case are only capitalized.
pub fn const_name(idl: &str) -> String {
    let is_screaming = idl
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    if !is_screaming {
        return display_name(idl);
    }
    idl.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let lower = part.to_ascii_lowercase();
            display_name(&lower)
        })
        .collect()
}

/// `webidl/html.idl` -> `html`, `Fetch-API.json` -> `fetch_api`.
pub fn package_from_file(file: &str) -> String {
    let stem = Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file);
    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Levenshtein distance between two names, counted in chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == *cb {
                diagonal
            } else {
                1 + diagonal.min(above).min(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}
