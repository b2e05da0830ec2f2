//! Structural checks on a single row.

use rwix_diagnostics::{messages, Diagnostic, Provenance};
use rwix_ir::Row;
use rwix_schema::{TableDefinition, TableRegistry};

/// The stable name diagnostics use for a row: its symbol, or its table and
/// 1-based position in its section when it has no key.
pub(crate) fn row_subject(row: &Row, table: Option<&TableDefinition>, index: usize) -> String {
    table
        .and_then(|t| row.symbol_name(t))
        .unwrap_or_else(|| format!("{}#{}", row.table, index + 1))
}

/// Check a row against its table definition.
pub(crate) fn check_row(
    registry: &TableRegistry,
    row: &Row,
    index: usize,
    provenance: &Provenance,
    out: &mut Vec<Diagnostic>,
) {
    let Some(table) = registry.get(&row.table) else {
        out.push(
            Diagnostic::about(row.table.clone(), &messages::UNKNOWN_TABLE, &[&row.table])
                .at(provenance.clone()),
        );
        return;
    };
    let subject = row_subject(row, Some(table), index);
    let composite = table.primary_keys().count() > 1;

    for name in row.fields.keys() {
        if table.column(name).is_none() {
            out.push(
                Diagnostic::about(subject.clone(), &messages::UNKNOWN_COLUMN, &[name, &table.name])
                    .at(provenance.clone()),
            );
        }
    }

    for column in &table.columns {
        match row.get(&column.name) {
            None if column.primary_key => out.push(
                Diagnostic::about(
                    subject.clone(),
                    &messages::MISSING_PRIMARY_KEY,
                    &[&table.name, &column.name],
                )
                .at(provenance.clone()),
            ),
            None if !column.nullable => out.push(
                Diagnostic::about(
                    subject.clone(),
                    &messages::MISSING_REQUIRED_COLUMN,
                    &[&subject, &column.name],
                )
                .at(provenance.clone()),
            ),
            None => {}
            Some(value) => {
                let checked = value.check(column.ty).and_then(|()| match value.as_str() {
                    // `/` joins the parts of a composite key.
                    Some(part) if composite && column.primary_key && part.contains('/') => Err(
                        format!("'{part}' contains '/', which separates composite key parts"),
                    ),
                    _ => Ok(()),
                });
                if let Err(reason) = checked {
                    out.push(
                        Diagnostic::about(
                            subject.clone(),
                            &messages::INVALID_COLUMN_VALUE,
                            &[&subject, &column.name, &reason],
                        )
                        .at(provenance.clone()),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(row: &Row) -> Vec<u32> {
        let registry = TableRegistry::standard();
        let mut out = Vec::new();
        check_row(&registry, row, 0, &Provenance::new("a", "s"), &mut out);
        out.iter().map(|d| d.code).collect()
    }

    #[test]
    fn test_valid_row() {
        let row = Row::new("Property").with("Property", "ALLUSERS").with("Value", "1");
        assert!(codes(&row).is_empty());
    }

    #[test]
    fn test_unknown_table_stops_checks() {
        assert_eq!(codes(&Row::new("Nope").with("X", 1)), vec![1003]);
    }

    #[test]
    fn test_structural_problems() {
        let row = Row::new("Feature")
            .with("Title", "x".repeat(65))
            .with("Level", 70000)
            .with("Color", "red");
        let mut found = codes(&row);
        found.sort();
        // unknown column, missing key, title too long, level too wide
        assert_eq!(found, vec![1004, 1005, 1007, 1007]);
    }

    #[test]
    fn test_missing_required_column() {
        let row = Row::new("Property").with("Property", "A");
        assert_eq!(codes(&row), vec![1006]);
    }

    #[test]
    fn test_keyless_subject_uses_position() {
        let row = Row::new("Property").with("Value", "1");
        assert_eq!(row_subject(&row, TableRegistry::standard().get("Property"), 4), "Property#5");
    }

    #[test]
    fn test_composite_key_parts_cannot_contain_separator() {
        use rwix_schema::{ColumnDefinition, ColumnType};

        let mut registry = TableRegistry::standard();
        registry
            .register(TableDefinition::new(
                "Alias",
                vec![
                    ColumnDefinition::new("Scope", ColumnType::TEXT).primary_key(),
                    ColumnDefinition::new("Name", ColumnType::TEXT).primary_key(),
                ],
            ))
            .unwrap();
        let check = |row: &Row| {
            let mut out = Vec::new();
            check_row(&registry, row, 0, &Provenance::new("a", "s"), &mut out);
            out.iter().map(|d| d.code).collect::<Vec<_>>()
        };

        // "a/b" + "c" and "a" + "b/c" would both be Alias.a/b/c.
        assert_eq!(check(&Row::new("Alias").with("Scope", "a/b").with("Name", "c")), vec![1007]);
        assert_eq!(check(&Row::new("Alias").with("Scope", "a").with("Name", "b/c")), vec![1007]);
        assert!(check(&Row::new("Alias").with("Scope", "a").with("Name", "c")).is_empty());
    }

    #[test]
    fn test_single_key_may_contain_separator() {
        let row = Row::new("Property").with("Property", "ALLUSERS").with("Value", "a/b");
        assert!(codes(&row).is_empty());
    }
}
