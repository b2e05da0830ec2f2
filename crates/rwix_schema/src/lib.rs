//! rwix_schema: The table schema registry.
//!
//! Every table an intermediate may carry is described here declaratively:
//! typed columns, primary keys, foreign keys, and the bindings that tell the
//! binder which tables hold file payloads, directories and containers. The
//! linker, binder and decompiler consult the registry and never branch on a
//! table's identity, so tables registered by extensions participate in
//! linking, binding and decompiling without code changes.

mod column;
mod registry;
mod standard;
mod table;

pub use column::{ColumnDefinition, ColumnType, IntegerWidth};
pub use registry::{SchemaError, TableRegistry};
pub use standard::summary;
pub use table::{ContainerBinding, DirectoryBinding, PayloadBinding, TableDefinition};
