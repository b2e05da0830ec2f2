//! rwix_binder: Turning a resolved intermediate into a finished artifact.
//!
//! Binding locates every payload source on disk, computes disk costs per
//! volume, packages payloads into containers with sequence numbers, and
//! hands the bound rows to a backend. The artifact is written atomically and
//! followed by its symbol map. Output bytes depend only on the resolved rows
//! and payload contents.

mod cost;
mod layout;
mod package;
mod search;

pub use cost::InstallCost;
pub use package::ContainerLayout;
pub use search::{BindPath, Located};

use cost::CostAccumulator;
use layout::Tree;
use package::{PayloadFile, Plan};
use rayon::prelude::*;
use rwix_backend::{stream_name, Backend, BackendError, Capabilities, CompressionLevel, EmitRequest};
use rwix_core::{fs::atomic_write, CancellationToken};
use rwix_diagnostics::{messages, Diagnostic, DiagnosticCollection};
use rwix_ir::{IrError, LinkedRow, ResolvedIntermediate, SymbolMap, SymbolMapEntry};
use rwix_schema::{ColumnType, TableDefinition, TableRegistry};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension appended to the artifact path for its symbol map.
pub const SYMBOL_MAP_EXTENSION: &str = "rwixpdb";

#[derive(Debug, Error)]
pub enum BindError {
    #[error("bind failed with {} error(s)", .diagnostics.error_count())]
    Failed { diagnostics: DiagnosticCollection },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bind cancelled after writing {} file(s)", .written.len())]
    Cancelled { written: Vec<PathBuf> },

    #[error(transparent)]
    SymbolMap(#[from] IrError),
}

#[derive(Debug, Clone, Default)]
pub struct BindOptions {
    /// Level recorded for containers that do not declare one.
    pub default_compression: CompressionLevel,
    pub cancellation: CancellationToken,
}

/// Everything a bind produced.
#[derive(Debug, Clone)]
pub struct BindResult {
    pub artifact_path: PathBuf,
    pub symbol_map: SymbolMap,
    pub symbol_map_path: PathBuf,
    /// Costs per volume, sorted by volume.
    pub disk_costs: Vec<InstallCost>,
    pub containers: Vec<ContainerLayout>,
    /// Payloads copied next to the artifact.
    pub loose_files: Vec<PathBuf>,
    /// The resolved rows with bind-computed columns filled.
    pub bound: ResolvedIntermediate,
    /// Warnings raised while binding.
    pub diagnostics: DiagnosticCollection,
}

/// The path of the symbol map written for `artifact`.
pub fn symbol_map_path(artifact: &Path) -> PathBuf {
    let mut name = OsString::from(artifact.as_os_str());
    name.push(".");
    name.push(SYMBOL_MAP_EXTENSION);
    PathBuf::from(name)
}

/// A column value naming a payload source.
struct SourceRef<'a> {
    table: &'a TableDefinition,
    row_index: usize,
    linked: &'a LinkedRow,
    source: &'a str,
    /// Stream column payloads are embedded in the artifact; the rest are
    /// file payloads.
    stream: bool,
}

impl SourceRef<'_> {
    fn subject(&self) -> String {
        self.linked
            .symbol
            .clone()
            .unwrap_or_else(|| format!("{}#{}", self.table.name, self.row_index + 1))
    }
}

pub struct Binder<'a> {
    registry: &'a TableRegistry,
    bind_paths: &'a [BindPath],
    options: BindOptions,
}

impl<'a> Binder<'a> {
    pub fn new(registry: &'a TableRegistry, bind_paths: &'a [BindPath], options: BindOptions) -> Self {
        Self {
            registry,
            bind_paths,
            options,
        }
    }

    /// Bind `resolved` into an artifact at `output`.
    pub fn bind(
        &self,
        resolved: &ResolvedIntermediate,
        backend: &dyn Backend,
        output: &Path,
    ) -> Result<BindResult, BindError> {
        backend.require(Capabilities::BIND_EMIT)?;
        if !backend.accepts(resolved.kind) {
            return Err(BackendError::IncompatibleOutput {
                backend: backend.output_kind().to_string(),
                kind: resolved.kind,
            }
            .into());
        }
        let cancellation = &self.options.cancellation;

        // Resolve payload sources
        let refs = self.source_refs(resolved);
        let loaded: Vec<Option<Result<Vec<u8>, Diagnostic>>> = refs
            .par_iter()
            .map(|r| {
                if cancellation.is_cancelled() {
                    return None;
                }
                Some(self.load(resolved, r))
            })
            .collect();
        if cancellation.is_cancelled() {
            return Err(BindError::Cancelled { written: Vec::new() });
        }

        let mut diagnostics = DiagnosticCollection::new();
        let mut files = Vec::new();
        let mut streams = BTreeMap::new();
        for (r, result) in refs.iter().zip(loaded) {
            let bytes = match result {
                Some(Ok(bytes)) => bytes,
                Some(Err(diagnostic)) => {
                    diagnostics.add(diagnostic);
                    continue;
                }
                None => continue,
            };
            let key = r
                .linked
                .row
                .key(r.table)
                .unwrap_or_else(|| format!("#{}", r.row_index + 1));
            if r.stream {
                streams.insert(stream_name(&r.table.name, &key), bytes);
            } else {
                files.push(PayloadFile {
                    table: r.table,
                    row_index: r.row_index,
                    key,
                    bytes,
                });
            }
        }
        for diagnostic in layout::check_names(self.registry, resolved) {
            diagnostics.add(diagnostic);
        }
        if diagnostics.has_errors() {
            diagnostics.sort();
            return Err(BindError::Failed { diagnostics });
        }
        log::debug!("resolved {} payloads and {} streams", files.len(), streams.len());

        // Disk cost and packaging
        let tree = Tree::new(self.registry, resolved);
        let plan = Plan::new(self.registry, resolved, &files, self.options.default_compression);
        let disk_costs = self.disk_costs(&tree, resolved, &files, &plan);

        let mut bound = resolved.clone();
        plan.apply(&mut bound, &files);

        let dir = output.parent().map(Path::to_path_buf).unwrap_or_default();
        let (packaged, containers) = plan.build_containers(&files, &dir, cancellation)?;
        let mut written: Vec<PathBuf> = containers.iter().filter_map(|c| c.path.clone()).collect();

        let loose_files = match plan.copy_loose(&tree, resolved, &files, &dir, cancellation) {
            Ok(paths) => paths,
            Err(BindError::Cancelled { written: copied }) => {
                written.extend(copied);
                return Err(BindError::Cancelled { written });
            }
            Err(e) => return Err(e),
        };
        written.extend(loose_files.iter().cloned());
        if cancellation.is_cancelled() {
            return Err(BindError::Cancelled { written });
        }

        // Emit
        let emitted = backend.emit_database(&EmitRequest {
            registry: self.registry,
            resolved: &bound,
            streams: &streams,
            containers: &packaged,
        })?;
        diagnostics.extend(emitted.diagnostics.into_iter().collect::<DiagnosticCollection>());
        atomic_write(output, &emitted.bytes).map_err(|source| BindError::Io {
            path: output.to_path_buf(),
            source,
        })?;

        let symbol_map = self.symbol_map(&bound, output);
        let symbol_map_path = symbol_map_path(output);
        symbol_map.save(&symbol_map_path)?;

        diagnostics.sort();
        log::debug!(
            "wrote {} ({} bytes, {} containers, {} loose files)",
            output.display(),
            emitted.bytes.len(),
            containers.len(),
            loose_files.len()
        );

        Ok(BindResult {
            artifact_path: output.to_path_buf(),
            symbol_map,
            symbol_map_path,
            disk_costs,
            containers,
            loose_files,
            bound,
            diagnostics,
        })
    }

    /// Every payload source column value, in table then row order.
    fn source_refs<'r>(&'r self, resolved: &'r ResolvedIntermediate) -> Vec<SourceRef<'r>> {
        let mut refs = Vec::new();
        for (name, rows) in &resolved.tables {
            let Some(table) = self.registry.get(name) else {
                continue;
            };
            let payload_source = table.payload.as_ref().map(|p| p.source.as_str());
            for (row_index, linked) in rows.iter().enumerate() {
                for column in &table.columns {
                    let stream = column.ty == ColumnType::Stream;
                    if !stream && payload_source != Some(column.name.as_str()) {
                        continue;
                    }
                    if let Some(source) = linked.row.get_str(&column.name) {
                        refs.push(SourceRef {
                            table,
                            row_index,
                            linked,
                            source,
                            stream,
                        });
                    }
                }
            }
        }
        refs
    }

    fn load(&self, resolved: &ResolvedIntermediate, r: &SourceRef<'_>) -> Result<Vec<u8>, Diagnostic> {
        let located = search::locate(r.source, &resolved.payloads, self.bind_paths).map_err(|tried| {
            let tried = if tried.is_empty() {
                "(none)".to_string()
            } else {
                tried
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let subject = r.subject();
            Diagnostic::about(
                subject.clone(),
                &messages::FILE_NOT_FOUND_IN_SEARCH_PATHS,
                &[r.source, &subject, &tried],
            )
            .at(r.linked.provenance.clone())
        })?;
        match located {
            Located::Embedded(bytes) => Ok(bytes),
            Located::File(path) => {
                log::trace!("{} -> {}", r.source, path.display());
                std::fs::read(&path).map_err(|e| {
                    let subject = r.subject();
                    Diagnostic::about(
                        subject.clone(),
                        &messages::UNREADABLE_PAYLOAD,
                        &[&path.display().to_string(), &subject, &e.to_string()],
                    )
                    .at(r.linked.provenance.clone())
                })
            }
        }
    }

    fn disk_costs(
        &self,
        tree: &Tree<'_>,
        resolved: &ResolvedIntermediate,
        files: &[PayloadFile<'_>],
        plan: &Plan<'_>,
    ) -> Vec<InstallCost> {
        let mut costs = CostAccumulator::default();
        for (i, file) in files.iter().enumerate() {
            let Some(ref binding) = file.table.payload else {
                continue;
            };
            let row = &resolved.rows(&file.table.name)[file.row_index].row;
            let volume = match tree.follow(file.table, row, &binding.target) {
                Some((table, dir)) => tree.volume(table, dir),
                None => {
                    log::warn!("no install directory for {}.{}", file.table.name, file.key);
                    String::new()
                }
            };
            costs.add(&volume, file.bytes.len() as u64, plan.is_containerized(i));
        }
        costs.finish()
    }

    fn symbol_map(&self, bound: &ResolvedIntermediate, output: &Path) -> SymbolMap {
        let artifact = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut map = SymbolMap::new(artifact);
        for (name, rows) in &bound.tables {
            let table = self.registry.get(name);
            for (i, linked) in rows.iter().enumerate() {
                map.push(SymbolMapEntry {
                    table: name.clone(),
                    key: table
                        .and_then(|t| linked.row.key(t))
                        .unwrap_or_else(|| format!("#{}", i + 1)),
                    symbol: linked.symbol.clone(),
                    provenance: linked.provenance.clone(),
                });
            }
        }
        map
    }
}
