//! End-to-end toolset behavior: link, bind, decompile and library emission.

use rwix_backend::{Backend, BackendFactory, Capabilities};
use rwix_backends::PackageBackend;
use rwix_core::Platform;
use rwix_ir::{Intermediate, Row, Section, SectionKind};
use rwix_options::{BindPathSpec, ToolsetOptions};
use rwix_schema::{ColumnDefinition, ColumnType, TableDefinition};
use rwix_toolset::{Extension, Toolset, ToolsetError};
use std::path::Path;
use tempfile::TempDir;

fn readme_fragment(size: i64) -> Intermediate {
    Intermediate::new("a").with_section(
        Section::new("files", SectionKind::Fragment)
            .with_row(Row::new("Directory").with("Directory", "TARGETDIR").with("DefaultDir", "SourceDir"))
            .with_row(
                Row::new("Component")
                    .with("Component", "Docs")
                    .with("Directory_", "TARGETDIR")
                    .with("Attributes", 0),
            )
            .with_row(
                Row::new("File")
                    .with("File", "readme")
                    .with("Component_", "Docs")
                    .with("FileName", "readme.txt")
                    .with("FileSize", size)
                    .with("Source", "readme.txt"),
            ),
    )
}

fn product() -> Intermediate {
    Intermediate::new("b").with_platform(Platform::X86).with_section(
        Section::new("product", SectionKind::Product)
            .with_row(Row::new("Property").with("Property", "ProductLanguage").with("Value", "1033"))
            .with_row(Row::new("Feature").with("Feature", "Main").with("Level", 1))
            .with_row(
                Row::new("FeatureComponents")
                    .with("Feature_", "Main")
                    .with("Component_", "Docs"),
            )
            .with_row(Row::new("Font").with("File_", "readme").with("FontTitle", "Readme")),
    )
}

struct Fixture {
    dir: TempDir,
    toolset: Toolset,
}

impl Fixture {
    fn new() -> Self {
        Self::with_extensions(Vec::new())
    }

    fn with_extensions(extensions: Vec<Box<dyn Extension>>) -> Self {
        let dir = TempDir::new().unwrap();
        let sources = dir.path().join("src");
        std::fs::create_dir_all(&sources).unwrap();
        std::fs::write(sources.join("readme.txt"), "read me first").unwrap();
        let options = ToolsetOptions {
            bind_paths: Some(vec![BindPathSpec::Text(sources.display().to_string())]),
            threads: Some(2),
            ..Default::default()
        };
        let toolset = Toolset::with_extensions(&options, extensions).unwrap();
        Self { dir, toolset }
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }
}

#[test]
fn test_build_defines_and_references_readme() {
    let fx = Fixture::new();
    let output = fx.path("out/product.msi");
    let result = fx
        .toolset
        .build(&[readme_fragment(100), product()], "msi", &output)
        .unwrap();

    assert!(output.is_file());
    let readme = result.bound.find("File.readme").unwrap();
    // The authored size is replaced by the resolved payload size.
    assert_eq!(readme.row.get_integer("FileSize"), Some(13));
    assert_eq!(result.bound.platform, Some(Platform::X86));
    assert!(result.diagnostics.is_empty());
}

#[test]
fn test_conflicting_readme_sizes_report_one_duplicate() {
    let fx = Fixture::new();
    let mut second = readme_fragment(200);
    second.id = "c".to_string();
    let err = fx
        .toolset
        .build(&[readme_fragment(100), second, product()], "msi", &fx.path("out/product.msi"))
        .unwrap_err();

    let diagnostics = err.diagnostics().unwrap();
    assert_eq!(diagnostics.with_code(1001).count(), 1);
    assert_eq!(diagnostics.error_count(), 1);
    assert!(!fx.path("out/product.msi").exists());
}

#[test]
fn test_unknown_output_kind() {
    let fx = Fixture::new();
    let err = fx
        .toolset
        .build(&[readme_fragment(100), product()], "unknown-kind", &fx.path("out/product.msi"))
        .unwrap_err();
    assert!(matches!(err, ToolsetError::UnknownOutputKind { ref kind, .. } if kind == "unknown-kind"));
}

#[test]
fn test_output_kind_inferred_from_extension() {
    let fx = Fixture::new();
    let backend = fx.toolset.backend_for("", Path::new("out/module.msm")).unwrap();
    assert_eq!(backend.output_kind(), "msm");
}

#[test]
fn test_build_then_decompile_round_trips() {
    let fx = Fixture::new();
    let output = fx.path("out/product.msi");
    let bound = fx
        .toolset
        .build(&[readme_fragment(100), product()], "msi", &output)
        .unwrap();

    let dest = fx.path("extracted");
    let decompiled = fx.toolset.decompile(&output, "", &dest).unwrap();
    assert_eq!(decompiled.platform, Some(Platform::X86));
    assert_eq!(
        decompiled.document.sections[0].rows,
        bound.bound.to_intermediate("product").sections[0].rows
    );

    let again = fx.toolset.decompile(&output, "msi", &dest).unwrap();
    assert_eq!(again.document, decompiled.document);
    assert_eq!(again.extracted_files, decompiled.extracted_files);
}

#[test]
fn test_two_builds_are_byte_identical() {
    let fx = Fixture::new();
    let first = fx.path("one/product.msi");
    let second = fx.path("two/product.msi");
    fx.toolset.build(&[readme_fragment(100), product()], "msi", &first).unwrap();
    fx.toolset.build(&[readme_fragment(100), product()], "msi", &second).unwrap();
    assert_eq!(std::fs::read(first).unwrap(), std::fs::read(second).unwrap());
}

#[test]
fn test_library_relinks() {
    let fx = Fixture::new();
    let lib_path = fx.path("common.wixlib");
    let library = fx
        .toolset
        .emit_library(&[readme_fragment(100)], "", &lib_path)
        .unwrap();
    assert_eq!(library.id, "common");

    let loaded = fx.toolset.load_intermediates(&[lib_path]).unwrap();
    assert_eq!(loaded[0], library);
    let resolved = fx.toolset.link(&[loaded[0].clone(), product()]).unwrap();
    assert!(resolved.find("Font.readme").is_some());
}

#[test]
fn test_library_requires_compile_emit() {
    let fx = Fixture::new();
    let err = fx
        .toolset
        .emit_library(&[readme_fragment(100)], "msi", &fx.path("common.msi"))
        .unwrap_err();
    assert!(matches!(err, ToolsetError::Backend(_)));
}

struct Shortcuts;

impl Extension for Shortcuts {
    fn name(&self) -> &str {
        "shortcuts"
    }

    fn tables(&self) -> Vec<TableDefinition> {
        vec![TableDefinition::new(
            "Shortcut",
            vec![
                ColumnDefinition::new("Shortcut", ColumnType::Identifier).primary_key(),
                ColumnDefinition::new("Component_", ColumnType::Identifier).foreign_key("Component"),
                ColumnDefinition::new("Target", ColumnType::Identifier).foreign_key("File"),
            ],
        )]
    }

    fn backend_factories(&self) -> Vec<Box<dyn BackendFactory>> {
        vec![Box::new(PatchedInstallers)]
    }
}

/// Claims `msi` ahead of the core factory.
struct PatchedInstallers;

struct PatchedInstaller(PackageBackend);

impl Backend for PatchedInstaller {
    fn output_kind(&self) -> &str {
        "patched-msi"
    }

    fn capabilities(&self) -> Capabilities {
        self.0.capabilities()
    }

    fn accepts(&self, kind: SectionKind) -> bool {
        self.0.accepts(kind)
    }
}

impl BackendFactory for PatchedInstallers {
    fn try_create_backend(&self, output_kind: &str, _output_path: &Path) -> Option<Box<dyn Backend>> {
        output_kind
            .eq_ignore_ascii_case("msi")
            .then(|| Box::new(PatchedInstaller(PackageBackend::installer())) as Box<dyn Backend>)
    }
}

#[test]
fn test_extensions_add_tables_and_take_precedence() {
    let fx = Fixture::with_extensions(vec![Box::new(Shortcuts)]);
    assert!(fx.toolset.registry().contains("Shortcut"));
    assert_eq!(
        fx.toolset.backend_for("msi", Path::new("a.msi")).unwrap().output_kind(),
        "patched-msi"
    );
    assert_eq!(
        fx.toolset.backend_for("msm", Path::new("a.msm")).unwrap().output_kind(),
        "msm"
    );

    let mut b = product();
    b.sections[0].push(
        Row::new("Shortcut")
            .with("Shortcut", "Readme")
            .with("Component_", "Docs")
            .with("Target", "readme"),
    );
    let resolved = fx.toolset.link(&[readme_fragment(100), b]).unwrap();
    assert!(resolved.find("Shortcut.Readme").is_some());
}

#[test]
fn test_table_definition_files_are_registered() {
    let dir = TempDir::new().unwrap();
    let defs = dir.path().join("tables.json");
    std::fs::write(
        &defs,
        r#"[{"name":"Registry","columns":[
            {"name":"Registry","type":{"kind":"identifier"},"primaryKey":true},
            {"name":"Component_","type":{"kind":"identifier"},"foreignKey":"Component"}
        ]}]"#,
    )
    .unwrap();
    let options = ToolsetOptions {
        table_definitions: Some(vec![defs]),
        ..Default::default()
    };
    let toolset = Toolset::new(&options).unwrap();
    assert!(toolset.registry().contains("Registry"));
}

#[test]
fn test_dangling_extension_schema_is_rejected() {
    let dir = TempDir::new().unwrap();
    let defs = dir.path().join("tables.json");
    std::fs::write(
        &defs,
        r#"[{"name":"Orphan","columns":[
            {"name":"Orphan","type":{"kind":"identifier"},"primaryKey":true},
            {"name":"Owner_","type":{"kind":"identifier"},"foreignKey":"Nowhere"}
        ]}]"#,
    )
    .unwrap();
    let options = ToolsetOptions {
        table_definitions: Some(vec![defs]),
        ..Default::default()
    };
    assert!(matches!(Toolset::new(&options), Err(ToolsetError::InvalidSchema(_))));
}
