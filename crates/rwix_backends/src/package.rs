//! The installer package backends (`msi`, `msm`).

use crate::database::{read_database, write_database};
use rwix_backend::{
    Backend, BackendError, Capabilities, DatabaseImage, EmitOutput, EmitRequest, Result, TableImage,
};
use rwix_diagnostics::{messages, Diagnostic};
use rwix_ir::{symbol_name, SectionKind, Value};
use rwix_schema::{summary, TableRegistry};

/// Table whose rows become summary properties instead of a table.
pub const SUMMARY_TABLE: &str = "SummaryInformation";

/// Languages written into the Template summary property.
const LANGUAGE_PROPERTY: &str = "ProductLanguage";

/// Schema version recorded when no platform is declared.
const DEFAULT_SCHEMA_VERSION: u32 = 200;

/// Emits and ingests binary installer databases.
#[derive(Debug, Clone)]
pub struct PackageBackend {
    kind: &'static str,
    entry: SectionKind,
}

impl PackageBackend {
    /// Installer databases built from product sections.
    pub fn installer() -> Self {
        Self {
            kind: "msi",
            entry: SectionKind::Product,
        }
    }

    /// Merge modules built from module sections.
    pub fn merge_module() -> Self {
        Self {
            kind: "msm",
            entry: SectionKind::Module,
        }
    }

    /// Lay out a bound intermediate as a database image.
    pub fn build_image(&self, request: &EmitRequest<'_>) -> Result<(DatabaseImage, Vec<Diagnostic>)> {
        let resolved = request.resolved;
        let mut image = DatabaseImage::new(resolved.kind);
        let mut diagnostics = Vec::new();

        for linked in resolved.rows(SUMMARY_TABLE) {
            let (Some(id), Some(value)) = (linked.row.get_integer("PropertyId"), linked.row.get("Value"))
            else {
                continue;
            };
            let value = value.to_string();
            if id == i64::from(summary::TEMPLATE) || id == i64::from(summary::PAGE_COUNT) {
                let subject = linked
                    .symbol
                    .clone()
                    .unwrap_or_else(|| symbol_name(SUMMARY_TABLE, &id.to_string()));
                diagnostics.push(
                    Diagnostic::about(subject, &messages::DERIVED_SUMMARY_PROPERTY, &[&id.to_string(), &value])
                        .at(linked.provenance.clone()),
                );
                continue;
            }
            match u16::try_from(id) {
                Ok(id) => {
                    image.summary.insert(id, value);
                }
                Err(_) => log::warn!("skipping summary property with out-of-range id {}", id),
            }
        }

        let languages = resolved
            .find(&symbol_name("Property", LANGUAGE_PROPERTY))
            .and_then(|r| r.row.get("Value"))
            .map(|v| v.to_string())
            .unwrap_or_else(|| "0".to_string());
        let template = match resolved.platform {
            Some(platform) => platform.to_template(&languages),
            None => format!(";{}", languages),
        };
        let page_count = resolved
            .platform
            .map_or(DEFAULT_SCHEMA_VERSION, |p| p.schema_version());
        image.summary.insert(summary::TEMPLATE, template);
        image.summary.insert(summary::PAGE_COUNT, page_count.to_string());

        for (name, rows) in &resolved.tables {
            if name == SUMMARY_TABLE {
                continue;
            }
            let definition = request
                .registry
                .get(name)
                .ok_or_else(|| BackendError::UnknownTable(name.clone()))?;
            let mut table = TableImage::new(definition.clone());
            for linked in rows {
                table.rows.push(
                    definition
                        .columns
                        .iter()
                        .map(|c| linked.row.get(&c.name).cloned())
                        .collect(),
                );
            }
            image.tables.push(table);
        }

        for (name, data) in request.streams {
            image.streams.insert(name.clone(), data.clone());
        }
        for container in request.containers.iter().filter(|c| c.embedded) {
            image.streams.insert(container.name.clone(), container.bytes.clone());
        }

        Ok((image, diagnostics))
    }
}

impl Backend for PackageBackend {
    fn output_kind(&self) -> &str {
        self.kind
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::BIND_EMIT | Capabilities::DECOMPILE_INGEST
    }

    fn accepts(&self, kind: SectionKind) -> bool {
        kind == self.entry
    }

    fn emit_database(&self, request: &EmitRequest<'_>) -> Result<EmitOutput> {
        let (image, diagnostics) = self.build_image(request)?;
        log::debug!(
            "{}: {} tables, {} streams, {} summary properties",
            self.kind,
            image.tables.len(),
            image.streams.len(),
            image.summary.len()
        );
        Ok(EmitOutput {
            bytes: write_database(&image),
            diagnostics,
        })
    }

    /// Summary properties other than the platform-derived ones come back as
    /// rows of the summary table, ahead of every other table.
    fn ingest(&self, bytes: &[u8]) -> Result<DatabaseImage> {
        let mut image = read_database(bytes)?;
        let authored: Vec<(u16, &String)> = image
            .summary
            .iter()
            .filter(|(id, _)| **id != summary::TEMPLATE && **id != summary::PAGE_COUNT)
            .map(|(id, value)| (*id, value))
            .collect();
        if !authored.is_empty() {
            let definition = TableRegistry::standard()
                .get(SUMMARY_TABLE)
                .cloned()
                .ok_or_else(|| BackendError::UnknownTable(SUMMARY_TABLE.to_string()))?;
            let mut table = TableImage::new(definition);
            for (id, value) in authored {
                table.rows.push(vec![
                    Some(Value::Integer(i64::from(id))),
                    Some(Value::String(value.clone())),
                ]);
            }
            image.tables.insert(0, table);
        }
        Ok(image)
    }
}
