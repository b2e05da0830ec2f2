//! rwix_toolset: Toolset orchestration.
//!
//! Owns the table registry, the ordered backend factories and the worker
//! pool, and runs link, bind, build, decompile and library emission on top
//! of them. Extensions contribute tables and backend factories; their
//! factories are consulted before the core one.

use rayon::prelude::*;
use rwix_backend::{Backend, BackendError, BackendFactories, BackendFactory, Capabilities, CompressionLevel};
use rwix_backends::CoreBackendFactory;
use rwix_binder::{BindError, BindOptions, BindPath, BindResult, Binder};
use rwix_core::CancellationToken;
use rwix_decompiler::{DecompileError, DecompileOptions, DecompileResult, Decompiler, ExtractionError};
use rwix_diagnostics::DiagnosticCollection;
use rwix_ir::{Intermediate, IrError, ResolvedIntermediate};
use rwix_linker::{LinkFailure, Linker};
use rwix_options::{OptionsError, ToolsetOptions};
use rwix_schema::{SchemaError, TableDefinition, TableRegistry};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Output kind used for libraries when none is given.
pub const LIBRARY_KIND: &str = "wixlib";

#[derive(Debug, Error)]
pub enum ToolsetError {
    #[error("no backend can produce output kind '{kind}' for '{path}'")]
    UnknownOutputKind { kind: String, path: PathBuf },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("invalid table schema: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    InvalidSchema(Vec<SchemaError>),

    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Intermediate(#[from] IrError),

    #[error(transparent)]
    Link(#[from] LinkFailure),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Decompile(#[from] DecompileError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error("failed to start the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl ToolsetError {
    /// The batch diagnostics behind a failed link or bind.
    pub fn diagnostics(&self) -> Option<&DiagnosticCollection> {
        match self {
            ToolsetError::Link(failure) => Some(&failure.diagnostics),
            ToolsetError::Bind(BindError::Failed { diagnostics }) => Some(diagnostics),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ToolsetError>;

/// Contributes tables and backends to a toolset.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    fn tables(&self) -> Vec<TableDefinition> {
        Vec::new()
    }

    fn backend_factories(&self) -> Vec<Box<dyn BackendFactory>> {
        Vec::new()
    }
}

/// The assembled toolset.
pub struct Toolset {
    registry: TableRegistry,
    factories: BackendFactories,
    pool: rayon::ThreadPool,
    bind_paths: Vec<BindPath>,
    default_compression: CompressionLevel,
    cancellation: CancellationToken,
}

impl Toolset {
    pub fn new(options: &ToolsetOptions) -> Result<Self> {
        Self::with_extensions(options, Vec::new())
    }

    /// Build a toolset: standard tables, then extension tables, then table
    /// definition files; extension factories, then the core factory.
    pub fn with_extensions(options: &ToolsetOptions, extensions: Vec<Box<dyn Extension>>) -> Result<Self> {
        let mut registry = TableRegistry::standard();
        let mut factories = BackendFactories::default();
        for extension in &extensions {
            log::debug!("loading extension {}", extension.name());
            registry.register_all(extension.tables())?;
            for factory in extension.backend_factories() {
                factories.push(factory);
            }
        }
        factories.push(Box::new(CoreBackendFactory));

        for path in options.table_definitions.iter().flatten() {
            let json = std::fs::read_to_string(path).map_err(|source| ToolsetError::Read {
                path: path.clone(),
                source,
            })?;
            registry.register_all(TableRegistry::parse_definitions(&json)?)?;
        }
        registry.validate().map_err(ToolsetError::InvalidSchema)?;

        let mut pool = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("rwix-worker-{}", i));
        if let Some(threads) = options.threads()? {
            pool = pool.num_threads(threads);
        }

        Ok(Self {
            registry,
            factories,
            pool: pool.build()?,
            bind_paths: options.bind_paths()?,
            default_compression: options.default_compression.unwrap_or_default(),
            cancellation: CancellationToken::new(),
        })
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    pub fn bind_paths(&self) -> &[BindPath] {
        &self.bind_paths
    }

    /// Cancels in-flight binds and decompiles when triggered.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// The backend for `kind` (inferred from `path` when empty).
    pub fn backend_for(&self, kind: &str, path: &Path) -> Result<Box<dyn Backend>> {
        self.factories
            .try_create_backend(kind, path)
            .ok_or_else(|| ToolsetError::UnknownOutputKind {
                kind: kind.to_string(),
                path: path.to_path_buf(),
            })
    }

    /// Load intermediates from disk in parallel, keeping their order.
    pub fn load_intermediates(&self, paths: &[PathBuf]) -> Result<Vec<Intermediate>> {
        let loaded = self
            .pool
            .install(|| paths.par_iter().map(|p| Intermediate::load(p)).collect::<std::result::Result<Vec<_>, _>>())?;
        Ok(loaded)
    }

    pub fn link(&self, intermediates: &[Intermediate]) -> Result<ResolvedIntermediate> {
        let linker = Linker::new(&self.registry);
        let resolved = self.pool.install(|| linker.link(intermediates))?;
        log::debug!("linked {} rows from {} intermediates", resolved.row_count(), intermediates.len());
        Ok(resolved)
    }

    pub fn bind(&self, resolved: &ResolvedIntermediate, kind: &str, output: &Path) -> Result<BindResult> {
        let backend = self.backend_for(kind, output)?;
        let options = BindOptions {
            default_compression: self.default_compression,
            cancellation: self.cancellation.clone(),
        };
        let binder = Binder::new(&self.registry, &self.bind_paths, options);
        let result = self.pool.install(|| binder.bind(resolved, backend.as_ref(), output))?;
        Ok(result)
    }

    /// Link then bind.
    pub fn build(&self, intermediates: &[Intermediate], kind: &str, output: &Path) -> Result<BindResult> {
        // Fail on an unknown kind before doing any linking.
        self.backend_for(kind, output)?;
        let resolved = self.link(intermediates)?;
        self.bind(&resolved, kind, output)
    }

    pub fn decompile(&self, artifact: &Path, kind: &str, destination: &Path) -> Result<DecompileResult> {
        let backend = self.backend_for(kind, artifact)?;
        let decompiler = Decompiler::new(
            &self.registry,
            DecompileOptions {
                cancellation: self.cancellation.clone(),
            },
        );
        let result = self
            .pool
            .install(|| decompiler.decompile(artifact, backend.as_ref(), destination))?;
        Ok(result)
    }

    /// Combine unlinked intermediates into one library and write it.
    ///
    /// Sections are kept as they are; payloads are merged with the first
    /// definition of a name winning. The library takes the first declared
    /// platform.
    pub fn emit_library(&self, intermediates: &[Intermediate], kind: &str, output: &Path) -> Result<Intermediate> {
        let kind = if kind.is_empty() { LIBRARY_KIND } else { kind };
        let backend = self.backend_for(kind, output)?;
        backend.require(Capabilities::COMPILE_EMIT)?;

        let id = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut library = Intermediate::new(id);
        for intermediate in intermediates {
            if library.platform.is_none() {
                library.platform = intermediate.platform;
            }
            library.sections.extend(intermediate.sections.iter().cloned());
            for (name, data) in &intermediate.payloads {
                library.payloads.entry(name.clone()).or_insert_with(|| data.clone());
            }
        }

        let bytes = backend.emit_intermediate(&library)?;
        rwix_core::fs::atomic_write(output, &bytes).map_err(|source| ToolsetError::Write {
            path: output.to_path_buf(),
            source,
        })?;
        log::debug!("wrote library {} with {} sections", output.display(), library.sections.len());
        Ok(library)
    }
}
