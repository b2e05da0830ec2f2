//! Linker behavior across multiple intermediates.

use rwix_ir::{Intermediate, Row, Section, SectionKind};
use rwix_linker::Linker;
use rwix_schema::TableRegistry;
use std::collections::BTreeSet;

fn directory(id: &str, parent: Option<&str>, name: &str) -> Row {
    let row = Row::new("Directory").with("Directory", id).with("DefaultDir", name);
    match parent {
        Some(p) => row.with("Directory_Parent", p),
        None => row,
    }
}

fn component(id: &str, dir: &str) -> Row {
    Row::new("Component")
        .with("Component", id)
        .with("Directory_", dir)
        .with("Attributes", 0)
}

fn file(id: &str, component: &str, size: i64) -> Row {
    Row::new("File")
        .with("File", id)
        .with("Component_", component)
        .with("FileName", format!("{}.txt", id))
        .with("FileSize", size)
        .with("Source", format!("{}.txt", id))
}

fn media(id: i64) -> Row {
    Row::new("Media").with("DiskId", id)
}

/// A defines File.readme; B references it through FeatureComponents/Component.
fn define_and_reference() -> (Intermediate, Intermediate) {
    let a = Intermediate::new("a").with_section(
        Section::new("files", SectionKind::Fragment)
            .with_row(directory("TARGETDIR", None, "SourceDir"))
            .with_row(component("Docs", "TARGETDIR"))
            .with_row(file("readme", "Docs", 100)),
    );
    let b = Intermediate::new("b").with_section(
        Section::new("product", SectionKind::Product)
            .with_row(Row::new("Feature").with("Feature", "Main").with("Level", 1))
            .with_row(
                Row::new("FeatureComponents")
                    .with("Feature_", "Main")
                    .with("Component_", "Docs"),
            )
            .with_row(Row::new("Font").with("File_", "readme"))
            .with_row(
                Row::new("Component")
                    .with("Component", "ReadmeShortcut")
                    .with("Directory_", "TARGETDIR")
                    .with("Attributes", 0)
                    .with("KeyPath", "readme"),
            ),
    );
    (a, b)
}

#[test]
fn test_define_and_reference_links() {
    let registry = TableRegistry::standard();
    let (a, b) = define_and_reference();
    let resolved = Linker::new(&registry).link(&[a, b]).unwrap();
    assert!(resolved.find("File.readme").is_some());
    assert_eq!(resolved.kind, SectionKind::Product);
}

#[test]
fn test_output_symbols_are_the_union() {
    let registry = TableRegistry::standard();
    let (a, b) = define_and_reference();
    let mut c = b.clone();
    c.id = "c".to_string();
    // c repeats b's rows byte-for-byte but as a fragment.
    c.sections[0].kind = SectionKind::Fragment;

    let mut expected: BTreeSet<String> = BTreeSet::new();
    for intermediate in [&a, &b, &c] {
        for section in &intermediate.sections {
            expected.extend(section.defined_symbols(&registry));
        }
    }

    let resolved = Linker::new(&registry).link(&[a, b, c]).unwrap();
    let actual: Vec<String> = resolved.iter_rows().filter_map(|r| r.symbol.clone()).collect();
    let unique: BTreeSet<String> = actual.iter().cloned().collect();
    assert_eq!(actual.len(), unique.len(), "idempotent duplicates are counted once");
    assert_eq!(unique, expected);
}

#[test]
fn test_conflicting_duplicate_names_both_sections() {
    let registry = TableRegistry::standard();
    let a = Intermediate::new("a").with_section(
        Section::new("one", SectionKind::Fragment)
            .with_row(directory("TARGETDIR", None, "SourceDir"))
            .with_row(component("Docs", "TARGETDIR"))
            .with_row(file("readme", "Docs", 100)),
    );
    let b = Intermediate::new("b")
        .with_section(Section::new("two", SectionKind::Fragment).with_row(file("readme", "Docs", 200)));

    let failure = Linker::new(&registry).link(&[a, b]).unwrap_err();
    let duplicates: Vec<_> = failure.diagnostics.with_code(1001).collect();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(failure.diagnostics.error_count(), 1);

    let duplicate = duplicates[0];
    assert_eq!(duplicate.subject.as_deref(), Some("File.readme"));
    assert!(duplicate.message_text.contains("a#one"));
    assert!(duplicate.message_text.contains("b#two"));
    assert_eq!(duplicate.related_information.len(), 1);
}

#[test]
fn test_unresolved_references_are_batched() {
    let registry = TableRegistry::standard();
    let a = Intermediate::new("a").with_section(
        Section::new("s", SectionKind::Fragment)
            .with_row(component("Docs", "MISSINGDIR"))
            .with_row(file("readme", "Nope", 1))
            .with_row(file("license", "Docs", 1).with("DiskId", 3)),
    );
    let failure = Linker::new(&registry).link(&[a]).unwrap_err();
    let mut subjects: Vec<String> = failure
        .diagnostics
        .with_code(1002)
        .map(|d| d.subject.clone().unwrap())
        .collect();
    subjects.sort();
    assert_eq!(subjects, vec!["Component.Docs", "File.license", "File.readme"]);
}

#[test]
fn test_every_foreign_key_resolves_after_link() {
    let registry = TableRegistry::standard();
    let (a, b) = define_and_reference();
    let extra = Intermediate::new("media").with_section(
        Section::new("m", SectionKind::Fragment)
            .with_row(media(1))
            .with_row(file("license", "Docs", 5).with("DiskId", 1)),
    );
    let resolved = Linker::new(&registry).link(&[a, b, extra]).unwrap();
    let index = resolved.symbol_index();
    for linked in resolved.iter_rows() {
        let table = registry.get(&linked.row.table).unwrap();
        for (column, target) in table.foreign_keys() {
            if let Some(value) = linked.row.get(&column.name) {
                let name = rwix_ir::symbol_name(target, &value.to_string());
                assert!(index.contains_key(name.as_str()), "{} is dangling", name);
            }
        }
    }
}

#[test]
fn test_extension_tables_participate() {
    let mut registry = TableRegistry::standard();
    let tables = TableRegistry::parse_definitions(
        r#"[{"name":"Shortcut","columns":[
            {"name":"Shortcut","type":{"kind":"identifier"},"primaryKey":true},
            {"name":"Component_","type":{"kind":"identifier"},"foreignKey":"Component"}
        ]}]"#,
    )
    .unwrap();
    registry.register_all(tables).unwrap();

    let a = Intermediate::new("a").with_section(
        Section::new("s", SectionKind::Fragment)
            .with_row(Row::new("Shortcut").with("Shortcut", "Start").with("Component_", "Ghost")),
    );
    let failure = Linker::new(&registry).link(&[a]).unwrap_err();
    let unresolved: Vec<_> = failure.diagnostics.with_code(1002).collect();
    assert_eq!(unresolved.len(), 1);
    assert!(unresolved[0].message_text.contains("Component.Ghost"));
}

#[test]
fn test_diagnostic_order_is_independent_of_input_order() {
    let registry = TableRegistry::standard();
    let a = Intermediate::new("a").with_section(
        Section::new("s", SectionKind::Fragment).with_row(Row::new("Bogus").with("X", 1)),
    );
    let b = Intermediate::new("b").with_section(
        Section::new("s", SectionKind::Fragment).with_row(component("Docs", "Nowhere")),
    );
    let first = Linker::new(&registry).link(&[a.clone(), b.clone()]).unwrap_err();
    let second = Linker::new(&registry).link(&[b, a]).unwrap_err();
    let codes = |f: &rwix_linker::LinkFailure| f.diagnostics.iter().map(|d| d.code).collect::<Vec<_>>();
    assert_eq!(codes(&first), codes(&second));
}
