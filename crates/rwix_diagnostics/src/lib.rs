//! rwix_diagnostics: Diagnostic messages and batch error reporting.
//!
//! Linking and binding never stop at the first problem. Every phase collects
//! its findings into a [`DiagnosticCollection`] so a single run surfaces the
//! complete fix-list. Each diagnostic names the offending symbol, row or file
//! by its stable identifier, never by an internal index.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Message,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCategory::Error => write!(f, "error"),
            DiagnosticCategory::Warning => write!(f, "warning"),
            DiagnosticCategory::Message => write!(f, "message"),
        }
    }
}

/// A diagnostic message template with a code and category.
#[derive(Debug, Clone)]
pub struct DiagnosticMessage {
    /// The diagnostic code (e.g., 1001, 2001).
    pub code: u32,
    /// The category of this diagnostic.
    pub category: DiagnosticCategory,
    /// The message template string. May contain `{0}`, `{1}`, etc. placeholders.
    pub message: &'static str,
}

/// Where a row came from: the intermediate and the section inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Provenance {
    pub intermediate: String,
    pub section: String,
}

impl Provenance {
    pub fn new(intermediate: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            intermediate: intermediate.into(),
            section: section.into(),
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.intermediate, self.section)
    }
}

/// A realized diagnostic with its subject and resolved message text.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// The stable identifier this diagnostic is about (a symbol like
    /// `File.readme`, a table name, or a file path).
    pub subject: Option<String>,
    /// The section the offending row came from, if any.
    pub provenance: Option<Provenance>,
    /// The formatted message.
    pub message_text: String,
    /// The diagnostic code.
    pub code: u32,
    /// The category.
    pub category: DiagnosticCategory,
    /// Related diagnostics (e.g. the first definition of a duplicate).
    pub related_information: Vec<Diagnostic>,
}

impl Diagnostic {
    /// Create a new diagnostic without a subject (global diagnostic).
    pub fn new(message: &DiagnosticMessage, args: &[&str]) -> Self {
        Self {
            subject: None,
            provenance: None,
            message_text: format_message(message.message, args),
            code: message.code,
            category: message.category,
            related_information: Vec::new(),
        }
    }

    /// Create a new diagnostic about a stable identifier.
    pub fn about(subject: impl Into<String>, message: &DiagnosticMessage, args: &[&str]) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::new(message, args)
        }
    }

    /// Attach the provenance of the offending row.
    pub fn at(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    /// Add related diagnostic information.
    pub fn with_related(mut self, related: Diagnostic) -> Self {
        self.related_information.push(related);
        self
    }

    /// Whether this is an error diagnostic.
    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }

    /// Whether this is a warning diagnostic.
    pub fn is_warning(&self) -> bool {
        self.category == DiagnosticCategory::Warning
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provenance) = self.provenance {
            write!(f, "{}: ", provenance)?;
        }
        write!(f, "{} RWX{:04}: {}", self.category, self.code, self.message_text)
    }
}

/// Format a diagnostic message template by replacing `{0}`, `{1}`, etc. with arguments.
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{}}}", i), arg);
    }
    result
}

/// A collection of diagnostics accumulated during one phase.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticCollection {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
        }
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_warning()).count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Diagnostics with the given code.
    pub fn with_code(&self, code: u32) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.code == code)
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn extend(&mut self, other: DiagnosticCollection) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn extend_from_slice(&mut self, diagnostics: &[Diagnostic]) {
        self.diagnostics.extend_from_slice(diagnostics);
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
    }

    /// Sort diagnostics by category, subject, code and provenance so the
    /// report does not depend on input order or thread scheduling.
    pub fn sort(&mut self) {
        self.diagnostics.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.subject.cmp(&b.subject))
                .then_with(|| a.code.cmp(&b.code))
                .then_with(|| a.provenance.cmp(&b.provenance))
                .then_with(|| a.message_text.cmp(&b.message_text))
        });
    }
}

impl FromIterator<Diagnostic> for DiagnosticCollection {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self {
            diagnostics: iter.into_iter().collect(),
        }
    }
}

impl Extend<Diagnostic> for DiagnosticCollection {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        self.diagnostics.extend(iter);
    }
}

impl fmt::Display for DiagnosticCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

// ============================================================================
// Diagnostic Messages
// ============================================================================

pub mod messages {
    use super::*;

    macro_rules! diag {
        ($code:expr, Error, $msg:expr) => {
            DiagnosticMessage { code: $code, category: DiagnosticCategory::Error, message: $msg }
        };
        ($code:expr, Warning, $msg:expr) => {
            DiagnosticMessage { code: $code, category: DiagnosticCategory::Warning, message: $msg }
        };
        ($code:expr, Message, $msg:expr) => {
            DiagnosticMessage { code: $code, category: DiagnosticCategory::Message, message: $msg }
        };
    }

    // ========================================================================
    // Linker (1000-1099)
    // ========================================================================
    pub const DUPLICATE_SYMBOL: DiagnosticMessage = diag!(1001, Error, "Duplicate symbol '{0}' with conflicting content. First defined in {1}; redefined in {2}.");
    pub const DUPLICATE_SYMBOL_FIRST_DEFINITION: DiagnosticMessage = diag!(1001, Message, "Location of the first definition of symbol '{0}'.");
    pub const UNRESOLVED_REFERENCE: DiagnosticMessage = diag!(1002, Error, "Unresolved reference to symbol '{0}' in column '{1}' of row '{2}'.");
    pub const UNKNOWN_TABLE: DiagnosticMessage = diag!(1003, Error, "Table '{0}' is not defined in the table schema registry.");
    pub const UNKNOWN_COLUMN: DiagnosticMessage = diag!(1004, Error, "Column '{0}' is not defined for table '{1}'.");
    pub const MISSING_PRIMARY_KEY: DiagnosticMessage = diag!(1005, Error, "A row in table '{0}' is missing its primary key column '{1}'.");
    pub const MISSING_REQUIRED_COLUMN: DiagnosticMessage = diag!(1006, Error, "Row '{0}' is missing required column '{1}'.");
    pub const INVALID_COLUMN_VALUE: DiagnosticMessage = diag!(1007, Error, "Row '{0}' has an invalid value in column '{1}': {2}.");
    pub const MULTIPLE_ENTRY_SECTIONS: DiagnosticMessage = diag!(1008, Error, "Multiple entry sections found: '{0}' ({1}) and '{2}' ({3}). Only one product, module, patch or bundle section may be linked.");
    pub const PLATFORM_MISMATCH: DiagnosticMessage = diag!(1009, Error, "Intermediate '{0}' targets platform '{1}' but '{2}' targets '{3}'.");

    // ========================================================================
    // Binder (2000-2099)
    // ========================================================================
    pub const FILE_NOT_FOUND_IN_SEARCH_PATHS: DiagnosticMessage = diag!(2001, Error, "The file '{0}' for row '{1}' could not be found. Paths tried: {2}.");
    pub const UNREADABLE_PAYLOAD: DiagnosticMessage = diag!(2002, Error, "The file '{0}' for row '{1}' could not be read: {2}.");
    pub const DERIVED_SUMMARY_PROPERTY: DiagnosticMessage = diag!(2003, Warning, "Summary property {0} is derived from the platform; the authored value '{1}' is ignored.");

    // ========================================================================
    // Decompiler (3000-3099)
    // ========================================================================
    pub const UNSUPPORTED_DECOMPILATION: DiagnosticMessage = diag!(3001, Warning, "'{0}' has no lossless source representation and was not decompiled: {1}.");
    pub const MISSING_EXTERNAL_CONTAINER: DiagnosticMessage = diag!(3002, Warning, "External container '{0}' was not found next to the database; its members were not extracted.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_message() {
        let result = format_message("Duplicate symbol '{0}' in {1}.", &["File.readme", "a.wixobj"]);
        assert_eq!(result, "Duplicate symbol 'File.readme' in a.wixobj.");
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::about("Table.Foo", &messages::UNKNOWN_TABLE, &["Foo"])
            .at(Provenance::new("a.wixobj", "main"));
        assert_eq!(
            diag.to_string(),
            "a.wixobj#main: error RWX1003: Table 'Foo' is not defined in the table schema registry."
        );
    }

    #[test]
    fn test_diagnostic_collection() {
        let mut collection = DiagnosticCollection::new();
        assert!(collection.is_empty());

        collection.add(Diagnostic::new(&messages::UNKNOWN_TABLE, &["Foo"]));
        collection.add(Diagnostic::new(&messages::DERIVED_SUMMARY_PROPERTY, &["7", "x"]));
        assert!(collection.has_errors());
        assert_eq!(collection.error_count(), 1);
        assert_eq!(collection.warning_count(), 1);
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_diagnostic_collection_sort_is_order_independent() {
        let a = Diagnostic::about("File.b", &messages::UNKNOWN_COLUMN, &["X", "File"]);
        let b = Diagnostic::about("File.a", &messages::UNKNOWN_COLUMN, &["Y", "File"]);
        let w = Diagnostic::about("File.0", &messages::UNSUPPORTED_DECOMPILATION, &["File.0", "x"]);

        let mut first: DiagnosticCollection = vec![a.clone(), w.clone(), b.clone()].into_iter().collect();
        let mut second: DiagnosticCollection = vec![b, a, w].into_iter().collect();
        first.sort();
        second.sort();

        let subjects = |c: &DiagnosticCollection| {
            c.iter().map(|d| d.subject.clone().unwrap()).collect::<Vec<_>>()
        };
        assert_eq!(subjects(&first), vec!["File.a", "File.b", "File.0"]);
        assert_eq!(subjects(&first), subjects(&second));
    }

    #[test]
    fn test_diagnostic_with_related() {
        let primary = Diagnostic::about("File.readme", &messages::DUPLICATE_SYMBOL, &["File.readme", "a", "b"]);
        let related = Diagnostic::about("File.readme", &messages::DUPLICATE_SYMBOL_FIRST_DEFINITION, &["File.readme"]);
        let combined = primary.with_related(related);
        assert_eq!(combined.related_information.len(), 1);
    }
}
