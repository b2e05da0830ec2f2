//! rwix_linker: Symbol resolution across intermediates.
//!
//! Linking runs in two phases separated by a barrier:
//!
//! 1. **Collect** (parallel per section): each row is checked structurally
//!    and every keyed row registers an occurrence of its symbol in one
//!    concurrent table. Collect never stops at the first problem.
//! 2. **Resolve** (parallel, read-only): every foreign-key value must name a
//!    symbol of its target table.
//!
//! Between the two, duplicate occurrences are settled: the first in input
//! order is kept, identical redefinitions are dropped, and conflicting ones
//! are reported. Diagnostics from every phase are returned together.

mod checks;

use checks::{check_row, row_subject};
use dashmap::DashMap;
use indexmap::IndexMap;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use rwix_core::Platform;
use rwix_diagnostics::{messages, Diagnostic, DiagnosticCollection, Provenance};
use rwix_ir::{symbol_name, Intermediate, LinkedRow, ResolvedIntermediate, Row, Section, SectionKind};
use rwix_schema::TableRegistry;
use thiserror::Error;

/// A link that produced errors. Carries every diagnostic, sorted.
#[derive(Debug, Error)]
#[error("link failed with {} error(s)", .diagnostics.error_count())]
pub struct LinkFailure {
    pub diagnostics: DiagnosticCollection,
}

/// One section in input order, with the input position of its first row.
struct Unit<'a> {
    section: &'a Section,
    provenance: Provenance,
    base: usize,
}

impl Unit<'_> {
    fn rows(&self) -> impl Iterator<Item = (usize, usize, &Row)> {
        self.section
            .rows
            .iter()
            .enumerate()
            .map(move |(i, row)| (self.base + i, i, row))
    }
}

/// One definition of a symbol.
struct Occurrence {
    ordinal: usize,
    content: String,
    provenance: Provenance,
}

/// Links intermediates against a table registry.
pub struct Linker<'r> {
    registry: &'r TableRegistry,
}

impl<'r> Linker<'r> {
    pub fn new(registry: &'r TableRegistry) -> Self {
        Self { registry }
    }

    /// Link intermediates, in order, into one resolved intermediate.
    pub fn link(&self, intermediates: &[Intermediate]) -> Result<ResolvedIntermediate, LinkFailure> {
        let units = units(intermediates);
        let mut diagnostics = DiagnosticCollection::new();

        let kind = entry_kind(&units, &mut diagnostics);
        let platform = common_platform(intermediates, &mut diagnostics);

        // Collect
        let symbols: DashMap<String, Vec<Occurrence>> = DashMap::new();
        let collected: Vec<Vec<Diagnostic>> = units
            .par_iter()
            .map(|unit| self.collect_section(unit, &symbols))
            .collect();
        diagnostics.extend(collected.into_iter().flatten().collect::<DiagnosticCollection>());
        log::debug!(
            "collected {} symbols from {} sections",
            symbols.len(),
            units.len()
        );

        let (defined, dropped) = settle_duplicates(symbols, &mut diagnostics);

        // Resolve
        let unresolved: Vec<Vec<Diagnostic>> = units
            .par_iter()
            .map(|unit| self.resolve_section(unit, &defined, &dropped))
            .collect();
        diagnostics.extend(unresolved.into_iter().flatten().collect::<DiagnosticCollection>());

        if diagnostics.has_errors() {
            diagnostics.sort();
            log::debug!("link failed with {} errors", diagnostics.error_count());
            return Err(LinkFailure { diagnostics });
        }

        let mut resolved = ResolvedIntermediate::new(kind);
        resolved.platform = platform;
        resolved.tables = self.flatten(&units, &dropped);
        for intermediate in intermediates {
            for (name, data) in &intermediate.payloads {
                match resolved.payloads.get(name) {
                    None => {
                        resolved.payloads.insert(name.clone(), data.clone());
                    }
                    Some(existing) if existing != data => log::warn!(
                        "payload '{}' in '{}' differs from an earlier one; keeping the first",
                        name,
                        intermediate.id
                    ),
                    Some(_) => {}
                }
            }
        }
        log::debug!(
            "linked {} rows into {} tables",
            resolved.row_count(),
            resolved.tables.len()
        );
        Ok(resolved)
    }

    fn collect_section(
        &self,
        unit: &Unit<'_>,
        symbols: &DashMap<String, Vec<Occurrence>>,
    ) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        for (ordinal, index, row) in unit.rows() {
            check_row(self.registry, row, index, &unit.provenance, &mut out);
            let Some(table) = self.registry.get(&row.table) else {
                continue;
            };
            if let Some(name) = row.symbol_name(table) {
                symbols.entry(name).or_default().push(Occurrence {
                    ordinal,
                    content: row.canonical_content(table),
                    provenance: unit.provenance.clone(),
                });
            }
        }
        out
    }

    fn resolve_section(
        &self,
        unit: &Unit<'_>,
        defined: &FxHashSet<String>,
        dropped: &FxHashSet<usize>,
    ) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        for (ordinal, index, row) in unit.rows() {
            if dropped.contains(&ordinal) {
                continue;
            }
            let Some(table) = self.registry.get(&row.table) else {
                continue;
            };
            for (column, target) in table.foreign_keys() {
                let Some(value) = row.get(&column.name) else {
                    continue;
                };
                let referenced = symbol_name(target, &value.to_string());
                if !defined.contains(&referenced) {
                    let subject = row_subject(row, Some(table), index);
                    out.push(
                        Diagnostic::about(
                            subject.clone(),
                            &messages::UNRESOLVED_REFERENCE,
                            &[&referenced, &column.name, &subject],
                        )
                        .at(unit.provenance.clone()),
                    );
                }
            }
        }
        out
    }

    /// Group surviving rows by table, tables in registry order.
    fn flatten(&self, units: &[Unit<'_>], dropped: &FxHashSet<usize>) -> IndexMap<String, Vec<LinkedRow>> {
        let mut by_table: FxHashMap<&str, Vec<LinkedRow>> = FxHashMap::default();
        for unit in units {
            for (ordinal, _, row) in unit.rows() {
                if dropped.contains(&ordinal) {
                    continue;
                }
                let Some(table) = self.registry.get(&row.table) else {
                    continue;
                };
                by_table.entry(table.name.as_str()).or_default().push(LinkedRow {
                    row: row.normalized(table),
                    symbol: row.symbol_name(table),
                    provenance: unit.provenance.clone(),
                });
            }
        }

        let mut tables = IndexMap::new();
        for table in self.registry.iter() {
            if let Some(rows) = by_table.remove(table.name.as_str()) {
                tables.insert(table.name.clone(), rows);
            }
        }
        tables
    }
}

fn units(intermediates: &[Intermediate]) -> Vec<Unit<'_>> {
    let mut units = Vec::new();
    let mut base = 0;
    for intermediate in intermediates {
        for section in &intermediate.sections {
            units.push(Unit {
                section,
                provenance: Provenance::new(intermediate.id.clone(), section.id.clone()),
                base,
            });
            base += section.rows.len();
        }
    }
    units
}

/// The kind of the single entry section, or Fragment when there is none.
fn entry_kind(units: &[Unit<'_>], diagnostics: &mut DiagnosticCollection) -> SectionKind {
    let mut entries = units.iter().filter(|u| u.section.kind.is_entry());
    let Some(first) = entries.next() else {
        return SectionKind::Fragment;
    };
    for other in entries {
        diagnostics.add(
            Diagnostic::about(
                other.provenance.to_string(),
                &messages::MULTIPLE_ENTRY_SECTIONS,
                &[
                    &first.provenance.to_string(),
                    &first.section.kind.to_string(),
                    &other.provenance.to_string(),
                    &other.section.kind.to_string(),
                ],
            )
            .at(other.provenance.clone()),
        );
    }
    first.section.kind
}

/// The platform every intermediate that declares one agrees on.
fn common_platform(intermediates: &[Intermediate], diagnostics: &mut DiagnosticCollection) -> Option<Platform> {
    let mut declared = intermediates
        .iter()
        .filter_map(|i| i.platform.map(|p| (i, p)));
    let (first, platform) = declared.next()?;
    for (other, other_platform) in declared {
        if other_platform != platform {
            diagnostics.add(Diagnostic::about(
                other.id.clone(),
                &messages::PLATFORM_MISMATCH,
                &[
                    &other.id,
                    &other_platform.to_string(),
                    &first.id,
                    &platform.to_string(),
                ],
            ));
        }
    }
    Some(platform)
}

/// Keep the first occurrence of every symbol.
///
/// Returns the defined symbol names and the input positions of dropped rows.
fn settle_duplicates(
    symbols: DashMap<String, Vec<Occurrence>>,
    diagnostics: &mut DiagnosticCollection,
) -> (FxHashSet<String>, FxHashSet<usize>) {
    let mut defined = FxHashSet::default();
    let mut dropped = FxHashSet::default();
    for (name, mut occurrences) in symbols {
        occurrences.sort_by_key(|o| o.ordinal);
        let mut rest = occurrences.into_iter();
        let Some(first) = rest.next() else {
            continue;
        };
        for later in rest {
            dropped.insert(later.ordinal);
            if later.content != first.content {
                diagnostics.add(
                    Diagnostic::about(
                        name.clone(),
                        &messages::DUPLICATE_SYMBOL,
                        &[
                            &name,
                            &first.provenance.to_string(),
                            &later.provenance.to_string(),
                        ],
                    )
                    .at(later.provenance.clone())
                    .with_related(
                        Diagnostic::about(
                            name.clone(),
                            &messages::DUPLICATE_SYMBOL_FIRST_DEFINITION,
                            &[&name],
                        )
                        .at(first.provenance.clone()),
                    ),
                );
            }
        }
        defined.insert(name);
    }
    (defined, dropped)
}
