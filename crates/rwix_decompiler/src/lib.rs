//! rwix_decompiler: Reconstructing intermediates from binary artifacts.
//!
//! The backend ingests the artifact into tables; the decompiler turns those
//! tables back into rows of one section, reads the platform out of the
//! Template summary property, and extracts every embedded stream and
//! container member into a destination directory. Tables are interpreted
//! through the registry, so extension tables decompile like core ones.

mod extract;

pub use extract::ExtractionError;

use extract::{Job, Outcome};
use rustc_hash::{FxHashMap, FxHashSet};
use rwix_backend::{stream_name, Backend, BackendError, Capabilities, Container, DatabaseImage};
use rwix_core::{fs::is_plain_file_name, CancellationToken, Platform};
use rwix_diagnostics::{messages, Diagnostic, DiagnosticCollection};
use rwix_ir::{Intermediate, Row, Section};
use rwix_schema::{summary, TableDefinition, TableRegistry};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory under the destination for streams no row refers to.
pub const ORPHAN_STREAM_DIR: &str = "_Streams";

#[derive(Debug, Error)]
pub enum DecompileError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("decompile cancelled after extracting {} file(s)", .extracted.len())]
    Cancelled { extracted: Vec<PathBuf> },
}

#[derive(Debug)]
pub struct DecompileResult {
    /// The reconstructed intermediate: one section of the artifact's kind.
    pub document: Intermediate,
    /// Files written before extraction finished or stopped.
    pub extracted_files: Vec<PathBuf>,
    pub platform: Option<Platform>,
    /// Warnings about content that was skipped or could not be found.
    pub diagnostics: DiagnosticCollection,
    /// Set when writing an entry failed; no entries were started after it.
    pub extraction_error: Option<ExtractionError>,
}

#[derive(Debug, Clone, Default)]
pub struct DecompileOptions {
    pub cancellation: CancellationToken,
}

pub struct Decompiler<'a> {
    registry: &'a TableRegistry,
    options: DecompileOptions,
}

impl<'a> Decompiler<'a> {
    pub fn new(registry: &'a TableRegistry, options: DecompileOptions) -> Self {
        Self { registry, options }
    }

    /// Decompile `artifact`, extracting payloads under `destination`.
    pub fn decompile(
        &self,
        artifact: &Path,
        backend: &dyn Backend,
        destination: &Path,
    ) -> Result<DecompileResult, DecompileError> {
        backend.require(Capabilities::DECOMPILE_INGEST)?;
        let bytes = std::fs::read(artifact).map_err(|source| DecompileError::Read {
            path: artifact.to_path_buf(),
            source,
        })?;
        let image = backend.ingest(&bytes)?;
        let mut diagnostics = DiagnosticCollection::new();

        let id = artifact
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let platform = image
            .summary
            .get(&summary::TEMPLATE)
            .and_then(|t| Platform::from_template(t));

        let mut section = Section::new(id.clone(), image.kind);
        let mut referenced: FxHashSet<&str> = FxHashSet::default();
        let mut jobs = Vec::new();
        let mut tables: Vec<(&TableDefinition, Vec<Row>)> = Vec::new();

        for table in &image.tables {
            let definition = self.registry.get(table.name()).unwrap_or(&table.definition);
            if !definition.round_trip {
                diagnostics.add(Diagnostic::about(
                    table.name().to_string(),
                    &messages::UNSUPPORTED_DECOMPILATION,
                    &[table.name(), "the table has no lossless source form"],
                ));
                continue;
            }
            let rows: Vec<Row> = table.iter_rows().map(|r| r.normalized(definition)).collect();
            for row in &rows {
                let Some(key) = row.key(definition) else {
                    continue;
                };
                for column in definition.stream_columns() {
                    if row.get(&column.name).is_none() {
                        continue;
                    }
                    let name = stream_name(&definition.name, &key);
                    if let Some((stored, data)) = image.streams.get_key_value(&name) {
                        referenced.insert(stored.as_str());
                        if let Some(path) = entry_path(destination, &definition.name, &key, &mut diagnostics) {
                            jobs.push(Job {
                                path,
                                data: data.as_slice(),
                            });
                        }
                    }
                }
            }
            section.rows.extend(rows.iter().cloned());
            tables.push((definition, rows));
        }

        let containers = self.open_containers(&image, &tables, artifact, &mut referenced, &mut diagnostics)?;
        for (definition, rows) in &tables {
            let Some(ref binding) = definition.payload else {
                continue;
            };
            let Some(ref column) = binding.container else {
                continue;
            };
            let Some(target) = definition.column(column).and_then(|c| c.foreign_key.as_deref()) else {
                continue;
            };
            for row in rows {
                let (Some(key), Some(value)) = (row.key(definition), row.get(column)) else {
                    continue;
                };
                let Some(container) = containers.get(&(target, value.to_string())) else {
                    continue;
                };
                let Some(entry) = container.get(&key) else {
                    continue;
                };
                if let Some(path) = entry_path(destination, &definition.name, &key, &mut diagnostics) {
                    jobs.push(Job {
                        path,
                        data: entry.data.as_slice(),
                    });
                }
            }
        }

        for (name, data) in &image.streams {
            if referenced.contains(name.as_str()) {
                continue;
            }
            if !is_plain_file_name(name) {
                diagnostics.add(unusable_name(name));
                continue;
            }
            diagnostics.add(Diagnostic::about(
                name.clone(),
                &messages::UNSUPPORTED_DECOMPILATION,
                &[name.as_str(), "no row refers to this stream; it was extracted as-is"],
            ));
            jobs.push(Job {
                path: destination.join(ORPHAN_STREAM_DIR).join(name),
                data: data.as_slice(),
            });
        }

        log::debug!(
            "decompiled {} rows from {}; extracting {} entries",
            section.rows.len(),
            artifact.display(),
            jobs.len()
        );
        let (extracted_files, extraction_error) = match extract::run(&jobs, &self.options.cancellation) {
            Outcome::Done(paths) => (paths, None),
            Outcome::Failed(extracted, e) => {
                log::warn!("{}", e);
                (extracted, Some(e))
            }
            Outcome::Cancelled(extracted) => return Err(DecompileError::Cancelled { extracted }),
        };

        diagnostics.sort();
        let mut document = Intermediate::new(id).with_section(section);
        document.platform = platform;
        Ok(DecompileResult {
            document,
            extracted_files,
            platform,
            diagnostics,
            extraction_error,
        })
    }

    /// Decode every container a container table names, keyed by
    /// `(table, key)`. Embedded containers come from streams; external ones
    /// are read from beside the artifact.
    fn open_containers<'t>(
        &self,
        image: &'t DatabaseImage,
        tables: &[(&'t TableDefinition, Vec<Row>)],
        artifact: &Path,
        referenced: &mut FxHashSet<&'t str>,
        diagnostics: &mut DiagnosticCollection,
    ) -> Result<FxHashMap<(&'t str, String), Container>, DecompileError> {
        let dir = artifact.parent().unwrap_or_else(|| Path::new(""));
        let mut containers = FxHashMap::default();
        for (definition, rows) in tables {
            let Some(ref binding) = definition.container else {
                continue;
            };
            for row in rows {
                let (Some(key), Some(cabinet)) = (row.key(definition), row.get_str(&binding.cabinet)) else {
                    continue;
                };
                let container = if let Some(name) = cabinet.strip_prefix('#') {
                    let Some((stored, data)) = image.streams.get_key_value(name) else {
                        continue;
                    };
                    referenced.insert(stored.as_str());
                    Container::decode(data)?
                } else if cabinet.is_empty() {
                    continue;
                } else if !is_plain_file_name(cabinet) {
                    log::warn!("external container '{}' does not name a file beside the artifact", cabinet);
                    diagnostics.add(Diagnostic::about(
                        cabinet.to_string(),
                        &messages::MISSING_EXTERNAL_CONTAINER,
                        &[cabinet],
                    ));
                    continue;
                } else {
                    let path = dir.join(cabinet);
                    match std::fs::read(&path) {
                        Ok(bytes) => Container::decode(&bytes)?,
                        Err(e) => {
                            log::warn!("cannot read {}: {}", path.display(), e);
                            diagnostics.add(Diagnostic::about(
                                cabinet.to_string(),
                                &messages::MISSING_EXTERNAL_CONTAINER,
                                &[cabinet],
                            ));
                            continue;
                        }
                    }
                };
                containers.insert((definition.name.as_str(), key), container);
            }
        }
        Ok(containers)
    }
}

/// Where a row's payload is extracted: `<destination>/<table>/<key>`, with
/// composite key parts as nested directories. `None` (with a warning) when
/// a name would leave the destination.
fn entry_path(
    destination: &Path,
    table: &str,
    key: &str,
    diagnostics: &mut DiagnosticCollection,
) -> Option<PathBuf> {
    if !is_plain_file_name(table) || !key.split('/').all(is_plain_file_name) {
        diagnostics.add(unusable_name(&stream_name(table, key)));
        return None;
    }
    let mut path = destination.join(table);
    path.extend(key.split('/'));
    Some(path)
}

fn unusable_name(name: &str) -> Diagnostic {
    Diagnostic::about(
        name.to_string(),
        &messages::UNSUPPORTED_DECOMPILATION,
        &[name, "the name cannot be used as a file name"],
    )
}
