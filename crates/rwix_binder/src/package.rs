//! Packaging: container grouping, sequence numbers, container assembly and
//! loose file placement.

use crate::layout::Tree;
use crate::BindError;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use rwix_backend::{CompressionLevel, Container, PackagedContainer};
use rwix_core::{fs::atomic_write, CancellationToken};
use rwix_ir::{ResolvedIntermediate, Value};
use rwix_schema::{TableDefinition, TableRegistry};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A resolved file payload: a row of a payload table and its bytes.
pub(crate) struct PayloadFile<'a> {
    pub table: &'a TableDefinition,
    pub row_index: usize,
    pub key: String,
    pub bytes: Vec<u8>,
}

/// A row of a container table and the payloads packaged under it.
pub(crate) struct Group<'a> {
    table: &'a TableDefinition,
    row_index: usize,
    /// File name and whether it is embedded; `None` for rows without a
    /// cabinet, whose payloads stay loose.
    cabinet: Option<(String, bool)>,
    compression: CompressionLevel,
    members: Vec<usize>,
    last_sequence: u32,
}

/// How payloads are packaged and numbered.
pub(crate) struct Plan<'a> {
    groups: Vec<Group<'a>>,
    /// 1-based sequence number per payload file.
    sequences: Vec<u32>,
    /// Payload files not placed in any container, in sequence order.
    loose: Vec<usize>,
    containerized: Vec<bool>,
}

/// Where a container ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerLayout {
    pub name: String,
    pub embedded: bool,
    /// Where an external container was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub compression: CompressionLevel,
    /// Member names in sequence order.
    pub members: Vec<String>,
    pub last_sequence: u32,
}

impl<'a> Plan<'a> {
    /// Group payloads by container; number them container by container in
    /// the container table's row order, then the loose remainder.
    pub(crate) fn new(
        registry: &'a TableRegistry,
        resolved: &ResolvedIntermediate,
        files: &[PayloadFile<'a>],
        default_compression: CompressionLevel,
    ) -> Self {
        let mut groups = Vec::new();
        let mut by_key: FxHashMap<(&str, String), usize> = FxHashMap::default();
        for table in registry.iter() {
            let Some(ref binding) = table.container else {
                continue;
            };
            for (row_index, linked) in resolved.rows(&table.name).iter().enumerate() {
                let Some(key) = linked.row.key(table) else {
                    continue;
                };
                let cabinet = linked
                    .row
                    .get_str(&binding.cabinet)
                    .filter(|c| !c.is_empty())
                    .map(|c| match c.strip_prefix('#') {
                        Some(name) => (name.to_string(), true),
                        None => (c.to_string(), false),
                    });
                let compression = binding
                    .compression
                    .as_deref()
                    .and_then(|col| linked.row.get_str(col))
                    .and_then(|level| match level.parse() {
                        Ok(level) => Some(level),
                        Err(e) => {
                            log::warn!("{}; using {}", e, default_compression);
                            None
                        }
                    })
                    .unwrap_or(default_compression);
                by_key.insert((table.name.as_str(), key), groups.len());
                groups.push(Group {
                    table,
                    row_index,
                    cabinet,
                    compression,
                    members: Vec::new(),
                    last_sequence: 0,
                });
            }
        }

        let mut unassigned = Vec::new();
        for (i, file) in files.iter().enumerate() {
            let group = file.table.payload.as_ref().and_then(|binding| {
                let column = binding.container.as_deref()?;
                let target = file.table.column(column)?.foreign_key.as_deref()?;
                let row = &resolved.rows(&file.table.name)[file.row_index].row;
                let value = row.get(column)?.to_string();
                by_key.get(&(target, value)).copied()
            });
            match group {
                Some(g) => groups[g].members.push(i),
                None => unassigned.push(i),
            }
        }

        let mut sequences = vec![0; files.len()];
        let mut loose = Vec::new();
        let mut next = 0u32;
        for group in &mut groups {
            for &member in &group.members {
                next += 1;
                sequences[member] = next;
                if group.cabinet.is_none() {
                    loose.push(member);
                }
            }
            group.last_sequence = next;
        }
        for member in unassigned {
            next += 1;
            sequences[member] = next;
            loose.push(member);
        }

        let mut containerized = vec![true; files.len()];
        for &member in &loose {
            containerized[member] = false;
        }
        Self {
            groups,
            sequences,
            loose,
            containerized,
        }
    }

    pub(crate) fn is_containerized(&self, file: usize) -> bool {
        self.containerized.get(file).copied().unwrap_or(false)
    }

    /// Fill size, sequence and last-sequence columns.
    pub(crate) fn apply(&self, bound: &mut ResolvedIntermediate, files: &[PayloadFile<'_>]) {
        for (i, file) in files.iter().enumerate() {
            let Some(ref binding) = file.table.payload else {
                continue;
            };
            let Some(rows) = bound.rows_mut(&file.table.name) else {
                continue;
            };
            let row = &mut rows[file.row_index].row;
            if let Some(ref column) = binding.size {
                row.set(column.clone(), Value::Integer(file.bytes.len() as i64));
            }
            if let Some(ref column) = binding.sequence {
                row.set(column.clone(), Value::Integer(i64::from(self.sequences[i])));
            }
        }
        for group in &self.groups {
            let Some(column) = group
                .table
                .container
                .as_ref()
                .and_then(|b| b.last_sequence.as_ref())
            else {
                continue;
            };
            if let Some(rows) = bound.rows_mut(&group.table.name) {
                rows[group.row_index]
                    .row
                    .set(column.clone(), Value::Integer(i64::from(group.last_sequence)));
            }
        }
    }

    /// Assemble every container, one task per container. External
    /// containers are written into `dir`.
    pub(crate) fn build_containers(
        &self,
        files: &[PayloadFile<'_>],
        dir: &Path,
        cancellation: &CancellationToken,
    ) -> Result<(Vec<PackagedContainer>, Vec<ContainerLayout>), BindError> {
        let built: Vec<Option<Result<(PackagedContainer, ContainerLayout), BindError>>> = self
            .groups
            .par_iter()
            .filter(|g| g.cabinet.is_some())
            .map(|group| {
                if cancellation.is_cancelled() {
                    return None;
                }
                Some(build_container(group, files, dir))
            })
            .collect();

        let mut packaged = Vec::new();
        let mut layouts = Vec::new();
        let mut written = Vec::new();
        let mut skipped = false;
        let mut failure = None;
        for result in built {
            match result {
                Some(Ok((container, layout))) => {
                    written.extend(layout.path.clone());
                    packaged.push(container);
                    layouts.push(layout);
                }
                Some(Err(e)) => {
                    failure.get_or_insert(e);
                }
                None => skipped = true,
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }
        if skipped {
            return Err(BindError::Cancelled { written });
        }
        Ok((packaged, layouts))
    }

    /// Copy loose payloads under `dir` following the directory tree.
    pub(crate) fn copy_loose(
        &self,
        tree: &Tree<'_>,
        resolved: &ResolvedIntermediate,
        files: &[PayloadFile<'_>],
        dir: &Path,
        cancellation: &CancellationToken,
    ) -> Result<Vec<PathBuf>, BindError> {
        let copied: Vec<Option<Result<PathBuf, BindError>>> = self
            .loose
            .par_iter()
            .map(|&i| {
                if cancellation.is_cancelled() {
                    return None;
                }
                let file = &files[i];
                let path = dir.join(loose_path(tree, resolved, file));
                Some(
                    atomic_write(&path, &file.bytes)
                        .map(|()| path.clone())
                        .map_err(|source| BindError::Io { path, source }),
                )
            })
            .collect();

        let mut written = Vec::new();
        let mut skipped = false;
        let mut failure = None;
        for result in copied {
            match result {
                Some(Ok(path)) => written.push(path),
                Some(Err(e)) => {
                    failure.get_or_insert(e);
                }
                None => skipped = true,
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }
        if skipped {
            return Err(BindError::Cancelled { written });
        }
        Ok(written)
    }
}

fn build_container(
    group: &Group<'_>,
    files: &[PayloadFile<'_>],
    dir: &Path,
) -> Result<(PackagedContainer, ContainerLayout), BindError> {
    let (name, embedded) = group.cabinet.clone().unwrap_or_default();
    let mut container = Container::new(group.compression);
    for &member in &group.members {
        container.push(files[member].key.clone(), files[member].bytes.clone());
    }
    let bytes = container.encode();
    log::trace!(
        "container '{}': {} members, {} bytes",
        name,
        group.members.len(),
        bytes.len()
    );

    let path = if embedded {
        None
    } else {
        let path = dir.join(&name);
        atomic_write(&path, &bytes).map_err(|source| BindError::Io {
            path: path.clone(),
            source,
        })?;
        Some(path)
    };

    let layout = ContainerLayout {
        name: name.clone(),
        embedded,
        path,
        compression: group.compression,
        members: container.entries.iter().map(|e| e.name.clone()).collect(),
        last_sequence: group.last_sequence,
    };
    Ok((PackagedContainer { name, embedded, bytes }, layout))
}

/// `<directory path>/<file name>` for a loose payload.
fn loose_path(tree: &Tree<'_>, resolved: &ResolvedIntermediate, file: &PayloadFile<'_>) -> PathBuf {
    let row = &resolved.rows(&file.table.name)[file.row_index].row;
    let Some(ref binding) = file.table.payload else {
        return PathBuf::from(&file.key);
    };
    let name = binding
        .name
        .as_deref()
        .and_then(|column| row.get_str(column))
        .map(|n| n.rsplit('|').next().unwrap_or(n))
        .filter(|n| !n.is_empty())
        .unwrap_or(file.key.as_str());
    match tree.follow(file.table, row, &binding.target) {
        Some((table, dir)) => tree.relative_path(table, dir).join(name),
        None => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rwix_ir::{LinkedRow, Provenance, Row, SectionKind};

    fn linked(row: Row) -> LinkedRow {
        LinkedRow {
            row,
            symbol: None,
            provenance: Provenance::new("a", "s"),
        }
    }

    #[test]
    fn test_plan_marks_loose_files() {
        let registry = TableRegistry::standard();
        let mut resolved = ResolvedIntermediate::new(SectionKind::Product);
        resolved.tables.insert(
            "Media".to_string(),
            vec![
                linked(Row::new("Media").with("DiskId", 1).with("Cabinet", "#one.cab")),
                linked(Row::new("Media").with("DiskId", 2)),
            ],
        );
        resolved.tables.insert(
            "File".to_string(),
            vec![
                linked(Row::new("File").with("File", "a").with("DiskId", 1)),
                linked(Row::new("File").with("File", "b").with("DiskId", 2)),
                linked(Row::new("File").with("File", "c")),
                linked(Row::new("File").with("File", "d").with("DiskId", 1)),
            ],
        );
        let table = registry.get("File").unwrap();
        let files: Vec<PayloadFile<'_>> = ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(row_index, key)| PayloadFile {
                table,
                row_index,
                key: key.to_string(),
                bytes: vec![0; 4],
            })
            .collect();

        let plan = Plan::new(&registry, &resolved, &files, CompressionLevel::default());
        let containerized: Vec<bool> = (0..files.len()).map(|i| plan.is_containerized(i)).collect();
        assert_eq!(containerized, vec![true, false, false, true]);
        assert_eq!(plan.loose, vec![1, 2]);
        // Container members first, then the loose remainder.
        assert_eq!(plan.sequences, vec![1, 3, 4, 2]);
        assert!(!plan.is_containerized(files.len()));
    }
}
