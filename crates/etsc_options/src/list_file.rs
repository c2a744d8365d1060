//! `@listfile` inputs: one source per line, as
//! `file;record;module-kind;source-file;output`.

use crate::error::{OptionsError, OptionsResult};
use serde::{Deserialize, Serialize};

const FIELD_COUNT: usize = 5;

/// Module kind of a list file entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Script,
    CommonJs,
    Esm,
    Module,
}

impl EntryKind {
    fn parse(text: &str) -> Self {
        match text {
            "script" => EntryKind::Script,
            "commonjs" => EntryKind::CommonJs,
            "esm" => EntryKind::Esm,
            _ => EntryKind::Module,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntry {
    pub file: String,
    pub record_name: String,
    pub kind: EntryKind,
    /// Name recorded as the origin of the compiled code.
    pub source_file: String,
    pub output: String,
}

/// Parse the text of a list file. `path` only labels errors.
pub fn parse_list_file(path: &str, text: &str) -> OptionsResult<Vec<SourceEntry>> {
    let mut entries = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(';').collect();
        if fields.len() != FIELD_COUNT {
            return Err(OptionsError::ListFileLine { path: path.to_string(), line: index + 1, found: fields.len() });
        }
        entries.push(SourceEntry {
            file: fields[0].to_string(),
            record_name: fields[1].to_string(),
            kind: EntryKind::parse(fields[2]),
            source_file: fields[3].to_string(),
            output: fields[4].to_string(),
        });
    }
    Ok(entries)
}

pub fn read_list_file(path: &str) -> OptionsResult<Vec<SourceEntry>> {
    let text = std::fs::read_to_string(path).map_err(|_| OptionsError::MissingListFile(path.to_string()))?;
    parse_list_file(path, &text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entries() {
        let text = "a.ets;main;esm;src/a.ets;a.abc\n\nb.ets;lib;script;src/b.ets;b.abc\n";
        let entries = parse_list_file("files.txt", text).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::Esm);
        assert_eq!(entries[1].record_name, "lib");
        assert_eq!(entries[1].output, "b.abc");
    }

    #[test]
    fn test_unknown_kind_is_module() {
        let entries = parse_list_file("l", "a;b;weird;c;d").unwrap();
        assert_eq!(entries[0].kind, EntryKind::Module);
    }

    #[test]
    fn test_wrong_field_count_names_line() {
        let err = parse_list_file("files.txt", "a;b;esm;c;d\na;b;esm\n").unwrap_err();
        assert_eq!(err, OptionsError::ListFileLine { path: "files.txt".into(), line: 2, found: 3 });
        assert_eq!(err.to_string(), "files.txt:2: expected 5 fields separated by ';', found 3");
    }
}
