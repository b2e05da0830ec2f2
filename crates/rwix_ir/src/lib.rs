//! rwix_ir: The intermediate object model.
//!
//! Intermediates are produced upstream by the compiler and consumed here:
//! an intermediate is an ordered list of sections, a section is an ordered
//! list of rows, and every row with a primary key defines a symbol named
//! `Table.key`. The linker flattens intermediates into a
//! [`ResolvedIntermediate`]; the binder records where each emitted row came
//! from in a [`SymbolMap`].

mod intermediate;
mod resolved;
mod row;
mod section;
mod symbol;
mod value;

pub use intermediate::{Intermediate, IrError, PayloadData};
pub use resolved::{LinkedRow, ResolvedIntermediate};
pub use row::Row;
pub use section::{Section, SectionKind};
pub use symbol::{symbol_name, SymbolMap, SymbolMapEntry};
pub use value::{is_identifier, Value};

pub use rwix_diagnostics::Provenance;
