//! Following payload rows into the directory tree.

use rustc_hash::{FxHashMap, FxHashSet};
use rwix_core::fs::is_plain_file_name;
use rwix_diagnostics::{messages, Diagnostic};
use rwix_ir::{symbol_name, LinkedRow, ResolvedIntermediate, Row};
use rwix_schema::{TableDefinition, TableRegistry};
use std::path::PathBuf;

/// The volume a directory name denotes, as `X:`, if any.
pub(crate) fn volume_name(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let is_volume = bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'\\' || bytes[2] == b'/');
    is_volume.then(|| format!("{}:", (bytes[0] as char).to_ascii_uppercase()))
}

/// The target directory name from a `short|long` or `target:source` value.
fn directory_name(value: &str) -> &str {
    let target = value.split(':').next().unwrap_or(value);
    target.rsplit('|').next().unwrap_or(target)
}

/// Report every authored name that would be placed outside the output
/// directory: external container names, directory names and loose file
/// names must each be a single path component.
pub(crate) fn check_names(registry: &TableRegistry, resolved: &ResolvedIntermediate) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    for table in registry.iter() {
        for (i, linked) in resolved.rows(&table.name).iter().enumerate() {
            let mut reject = |column: &str, value: &str| {
                let subject = linked
                    .symbol
                    .clone()
                    .unwrap_or_else(|| format!("{}#{}", table.name, i + 1));
                let reason = format!("'{}' is not a plain file name", value);
                out.push(
                    Diagnostic::about(
                        subject.clone(),
                        &messages::INVALID_COLUMN_VALUE,
                        &[&subject, column, &reason],
                    )
                    .at(linked.provenance.clone()),
                );
            };
            let row = &linked.row;

            if let Some(ref binding) = table.container {
                if let Some(cabinet) = row.get_str(&binding.cabinet) {
                    if !cabinet.is_empty() && !cabinet.starts_with('#') && !is_plain_file_name(cabinet) {
                        reject(&binding.cabinet, cabinet);
                    }
                }
            }

            if let Some(ref binding) = table.directory {
                if let Some(value) = row.get_str(&binding.name) {
                    let name = directory_name(value);
                    if volume_name(value).is_none() && !name.is_empty() && name != "." && !is_plain_file_name(name) {
                        reject(&binding.name, value);
                    }
                }
            }

            if let Some(ref binding) = table.payload {
                let named = binding
                    .name
                    .as_deref()
                    .and_then(|column| Some((column, row.get_str(column)?)))
                    .filter(|(_, value)| !value.is_empty());
                match named {
                    Some((column, value)) => {
                        let name = value.rsplit('|').next().unwrap_or(value);
                        if !is_plain_file_name(name) {
                            reject(column, value);
                        }
                    }
                    None => {
                        // Composite key parts become nested directories.
                        if let Some(key) = row.key(table) {
                            if !key.split('/').all(is_plain_file_name) {
                                let column = table.primary_keys().next().map_or("", |c| c.name.as_str());
                                reject(column, &key);
                            }
                        }
                    }
                }
            }
        }
    }
    out
}

/// Read-only view over a resolved intermediate for walking foreign keys.
pub(crate) struct Tree<'a> {
    registry: &'a TableRegistry,
    index: FxHashMap<&'a str, &'a LinkedRow>,
}

impl<'a> Tree<'a> {
    pub(crate) fn new(registry: &'a TableRegistry, resolved: &'a ResolvedIntermediate) -> Self {
        Self {
            registry,
            index: resolved.symbol_index(),
        }
    }

    pub(crate) fn lookup(&self, table: &str, key: &str) -> Option<&'a LinkedRow> {
        self.index.get(symbol_name(table, key).as_str()).copied()
    }

    /// Follow `chain` from `row` and return the directory row it ends at.
    pub(crate) fn follow(
        &self,
        table: &'a TableDefinition,
        row: &'a Row,
        chain: &[String],
    ) -> Option<(&'a TableDefinition, &'a Row)> {
        let mut current = (table, row);
        for hop in chain {
            let target = current.0.column(hop)?.foreign_key.as_deref()?;
            let value = current.1.get(hop)?.to_string();
            let next = self.lookup(target, &value)?;
            current = (self.registry.get(target)?, &next.row);
        }
        current.0.directory.as_ref().map(|_| current)
    }

    /// The directory and its ancestors, nearest first.
    fn ancestors(&self, table: &'a TableDefinition, row: &'a Row) -> Vec<&'a Row> {
        let Some(ref binding) = table.directory else {
            return vec![row];
        };
        let mut chain = vec![row];
        let mut seen = FxHashSet::default();
        let mut current = row;
        while let Some(key) = current.key(table) {
            if !seen.insert(key.clone()) {
                break;
            }
            let Some(parent) = current.get(&binding.parent).map(|v| v.to_string()) else {
                break;
            };
            if parent == key {
                break;
            }
            let Some(next) = self.lookup(&table.name, &parent) else {
                break;
            };
            current = &next.row;
            chain.push(current);
        }
        chain
    }

    /// The volume a directory lives on: the nearest `X:` ancestor, else the
    /// root directory's key.
    pub(crate) fn volume(&self, table: &'a TableDefinition, row: &'a Row) -> String {
        let ancestors = self.ancestors(table, row);
        if let Some(ref binding) = table.directory {
            for dir in &ancestors {
                if let Some(volume) = dir.get_str(&binding.name).and_then(volume_name) {
                    return volume;
                }
            }
        }
        ancestors
            .last()
            .and_then(|root| root.key(table))
            .unwrap_or_default()
    }

    /// The path of a directory relative to its root.
    pub(crate) fn relative_path(&self, table: &'a TableDefinition, row: &'a Row) -> PathBuf {
        let mut path = PathBuf::new();
        let Some(ref binding) = table.directory else {
            return path;
        };
        let ancestors = self.ancestors(table, row);
        for dir in ancestors.iter().rev().skip(1) {
            let Some(value) = dir.get_str(&binding.name) else {
                continue;
            };
            if volume_name(value).is_some() {
                continue;
            }
            let name = directory_name(value);
            if !name.is_empty() && name != "." {
                path.push(name);
            }
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rwix_ir::{Provenance, SectionKind};

    fn linked(row: Row, table: &TableDefinition) -> LinkedRow {
        LinkedRow {
            symbol: row.symbol_name(table),
            row,
            provenance: Provenance::new("a", "s"),
        }
    }

    fn tree_fixture(registry: &TableRegistry) -> ResolvedIntermediate {
        let dir = registry.get("Directory").unwrap();
        let comp = registry.get("Component").unwrap();
        let mut resolved = ResolvedIntermediate::new(SectionKind::Product);
        resolved.tables.insert(
            "Directory".to_string(),
            vec![
                linked(Row::new("Directory").with("Directory", "TARGETDIR").with("DefaultDir", "SourceDir"), dir),
                linked(
                    Row::new("Directory")
                        .with("Directory", "APP")
                        .with("Directory_Parent", "TARGETDIR")
                        .with("DefaultDir", "APP~1|My App"),
                    dir,
                ),
                linked(
                    Row::new("Directory")
                        .with("Directory", "BIN")
                        .with("Directory_Parent", "APP")
                        .with("DefaultDir", "bin"),
                    dir,
                ),
                linked(Row::new("Directory").with("Directory", "DDRIVE").with("DefaultDir", "d:"), dir),
                linked(
                    Row::new("Directory")
                        .with("Directory", "DATA")
                        .with("Directory_Parent", "DDRIVE")
                        .with("DefaultDir", "data"),
                    dir,
                ),
            ],
        );
        resolved.tables.insert(
            "Component".to_string(),
            vec![linked(
                Row::new("Component")
                    .with("Component", "Core")
                    .with("Directory_", "BIN")
                    .with("Attributes", 0),
                comp,
            )],
        );
        resolved
    }

    #[test]
    fn test_volume_names() {
        assert_eq!(volume_name("C:").as_deref(), Some("C:"));
        assert_eq!(volume_name("d:\\data").as_deref(), Some("D:"));
        assert_eq!(volume_name("SourceDir"), None);
        assert_eq!(volume_name("a:b"), None);
    }

    #[test]
    fn test_follow_and_walk() {
        let registry = TableRegistry::standard();
        let resolved = tree_fixture(&registry);
        let tree = Tree::new(&registry, &resolved);
        let file_table = registry.get("File").unwrap();
        let file = Row::new("File").with("File", "app").with("Component_", "Core");
        let chain = file_table.payload.as_ref().unwrap().target.clone();

        let (dir_table, dir) = tree.follow(file_table, &file, &chain).unwrap();
        assert_eq!(dir.get_str("Directory"), Some("BIN"));
        assert_eq!(tree.volume(dir_table, dir), "TARGETDIR");
        assert_eq!(tree.relative_path(dir_table, dir), PathBuf::from("My App").join("bin"));

        let data = &tree.lookup("Directory", "DATA").unwrap().row;
        assert_eq!(tree.volume(dir_table, data), "D:");
        assert_eq!(tree.relative_path(dir_table, data), PathBuf::from("data"));
    }

    #[test]
    fn test_broken_chain() {
        let registry = TableRegistry::standard();
        let resolved = tree_fixture(&registry);
        let tree = Tree::new(&registry, &resolved);
        let file_table = registry.get("File").unwrap();
        let file = Row::new("File").with("File", "x").with("Component_", "Ghost");
        let chain = file_table.payload.as_ref().unwrap().target.clone();
        assert!(tree.follow(file_table, &file, &chain).is_none());
    }

    fn rejected(resolved: &ResolvedIntermediate) -> Vec<(String, u32)> {
        let registry = TableRegistry::standard();
        check_names(&registry, resolved)
            .into_iter()
            .map(|d| (d.subject.unwrap_or_default(), d.code))
            .collect()
    }

    #[test]
    fn test_plain_names_pass() {
        let registry = TableRegistry::standard();
        let resolved = tree_fixture(&registry);
        assert!(rejected(&resolved).is_empty());
    }

    #[test]
    fn test_names_leaving_the_output_are_rejected() {
        let registry = TableRegistry::standard();
        let mut resolved = tree_fixture(&registry);
        let dir = registry.get("Directory").unwrap();
        resolved.tables.get_mut("Directory").unwrap().push(linked(
            Row::new("Directory")
                .with("Directory", "UP")
                .with("Directory_Parent", "TARGETDIR")
                .with("DefaultDir", "UP~1|.."),
            dir,
        ));
        let media = registry.get("Media").unwrap();
        resolved.tables.insert(
            "Media".to_string(),
            vec![
                linked(Row::new("Media").with("DiskId", 1).with("Cabinet", "../x.cab"), media),
                linked(Row::new("Media").with("DiskId", 2).with("Cabinet", "#../embedded.cab"), media),
                linked(Row::new("Media").with("DiskId", 3).with("Cabinet", "disk3.cab"), media),
            ],
        );
        let file = registry.get("File").unwrap();
        resolved.tables.insert(
            "File".to_string(),
            vec![
                linked(
                    Row::new("File")
                        .with("File", "evil")
                        .with("Component_", "Core")
                        .with("FileName", "EVIL~1|..\\evil.dll")
                        .with("Source", "evil.dll"),
                    file,
                ),
                linked(
                    Row::new("File")
                        .with("File", "ok")
                        .with("Component_", "Core")
                        .with("FileName", "OK~1|ok.dll")
                        .with("Source", "ok.dll"),
                    file,
                ),
            ],
        );

        let mut found = rejected(&resolved);
        found.sort();
        assert_eq!(
            found,
            vec![
                ("Directory.UP".to_string(), 1007),
                ("File.evil".to_string(), 1007),
                ("Media.1".to_string(), 1007),
            ]
        );
    }
}
