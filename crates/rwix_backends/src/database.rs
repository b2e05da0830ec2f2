//! The binary installer database format.
//!
//! ```text
//! magic "RWIXMSI\0" | u16 version | u8 section kind
//! summary:  count, (u16 property id, string)*
//! strings:  count, string*
//! tables:   count, (name, round-trip flag, columns, rows)*
//! streams:  count, (name, blob)*   sorted by name
//! ```
//!
//! Table, column and string cell values are indexes into the string pool.
//! The pool is filled in first-use order, so equal images encode to equal
//! bytes.

use indexmap::IndexSet;
use rwix_backend::codec::{ByteReader, ByteWriter};
use rwix_backend::{BackendError, DatabaseImage, Result, TableImage};
use rwix_ir::{SectionKind, Value};
use rwix_schema::{ColumnDefinition, ColumnType, IntegerWidth, TableDefinition};

pub const DATABASE_MAGIC: &[u8; 8] = b"RWIXMSI\0";
pub const FORMAT_VERSION: u16 = 1;

const CELL_NULL: u8 = 0;
const CELL_INTEGER: u8 = 1;
const CELL_STRING: u8 = 2;

const COLUMN_NULLABLE: u8 = 1 << 0;
const COLUMN_PRIMARY_KEY: u8 = 1 << 1;
const COLUMN_FOREIGN_KEY: u8 = 1 << 2;

#[derive(Default)]
struct StringPool<'a> {
    strings: IndexSet<&'a str>,
}

impl<'a> StringPool<'a> {
    fn intern(&mut self, s: &'a str) -> usize {
        self.strings.insert_full(s).0
    }
}

/// Encode a database image.
pub fn write_database(image: &DatabaseImage) -> Vec<u8> {
    let mut pool = StringPool::default();
    let mut tables = ByteWriter::new();
    tables.uleb128(image.tables.len());
    for table in &image.tables {
        write_table(&mut tables, &mut pool, table);
    }

    let mut w = ByteWriter::new();
    w.bytes(DATABASE_MAGIC);
    w.u16(FORMAT_VERSION);
    w.u8(image.kind.tag());

    w.uleb128(image.summary.len());
    for (id, value) in &image.summary {
        w.u16(*id);
        w.str(value);
    }

    w.uleb128(pool.strings.len());
    for s in &pool.strings {
        w.str(s);
    }

    w.bytes(&tables.finish());

    w.uleb128(image.streams.len());
    for (name, data) in &image.streams {
        w.str(name);
        w.blob(data);
    }
    w.finish()
}

fn write_table<'a>(w: &mut ByteWriter, pool: &mut StringPool<'a>, table: &'a TableImage) {
    let definition = &table.definition;
    w.uleb128(pool.intern(&definition.name));
    w.u8(u8::from(definition.round_trip));
    w.uleb128(definition.columns.len());
    for column in &definition.columns {
        write_column(w, pool, column);
    }

    w.uleb128(table.rows.len());
    for row in &table.rows {
        for cell in row {
            match cell {
                None => w.u8(CELL_NULL),
                Some(Value::Integer(n)) => {
                    w.u8(CELL_INTEGER);
                    w.i64(*n);
                }
                Some(Value::String(s)) => {
                    w.u8(CELL_STRING);
                    w.uleb128(pool.intern(s));
                }
            }
        }
    }
}

fn write_column<'a>(w: &mut ByteWriter, pool: &mut StringPool<'a>, column: &'a ColumnDefinition) {
    w.uleb128(pool.intern(&column.name));
    match column.ty {
        ColumnType::Integer { width } => {
            w.u8(0);
            w.u8(width.bytes() as u8);
        }
        ColumnType::String { max_len } => {
            w.u8(1);
            w.uleb128(max_len.map_or(0, |n| n as usize + 1));
        }
        ColumnType::Identifier => w.u8(2),
        ColumnType::Path => w.u8(3),
        ColumnType::Stream => w.u8(4),
    }
    let mut flags = 0;
    if column.nullable {
        flags |= COLUMN_NULLABLE;
    }
    if column.primary_key {
        flags |= COLUMN_PRIMARY_KEY;
    }
    if column.foreign_key.is_some() {
        flags |= COLUMN_FOREIGN_KEY;
    }
    w.u8(flags);
    if let Some(ref target) = column.foreign_key {
        w.uleb128(pool.intern(target));
    }
}

/// Decode a database image. Any structural problem is malformed input.
pub fn read_database(bytes: &[u8]) -> Result<DatabaseImage> {
    let mut r = ByteReader::new(bytes);
    if r.take(DATABASE_MAGIC.len())? != DATABASE_MAGIC {
        return Err(BackendError::malformed("not an installer database"));
    }
    let version = r.u16()?;
    if version != FORMAT_VERSION {
        return Err(BackendError::malformed(format!(
            "unsupported database format version {}",
            version
        )));
    }
    let tag = r.u8()?;
    let kind = SectionKind::from_tag(tag)
        .ok_or_else(|| BackendError::malformed(format!("unknown section kind tag {}", tag)))?;
    let mut image = DatabaseImage::new(kind);

    let summary_count = r.uleb128()?;
    for _ in 0..summary_count {
        let id = r.u16()?;
        let value = r.str()?.to_string();
        image.summary.insert(id, value);
    }

    let string_count = r.uleb128()?;
    let mut strings = Vec::with_capacity(string_count.min(r.remaining()));
    for _ in 0..string_count {
        strings.push(r.str()?);
    }
    let table_count = r.uleb128()?;
    for _ in 0..table_count {
        image.tables.push(read_table(&mut r, &strings)?);
    }

    let stream_count = r.uleb128()?;
    for _ in 0..stream_count {
        let name = r.str()?.to_string();
        let data = r.blob()?.to_vec();
        if image.streams.insert(name.clone(), data).is_some() {
            return Err(BackendError::malformed(format!("duplicate stream '{}'", name)));
        }
    }
    r.expect_end()?;
    Ok(image)
}

fn lookup<'s>(strings: &[&'s str], index: usize) -> Result<&'s str> {
    strings
        .get(index)
        .copied()
        .ok_or_else(|| BackendError::malformed(format!("string index {} out of range", index)))
}

fn read_table(r: &mut ByteReader<'_>, strings: &[&str]) -> Result<TableImage> {
    let name = lookup(strings, r.uleb128()?)?.to_string();
    let round_trip = r.u8()? != 0;
    let column_count = r.uleb128()?;
    let mut columns = Vec::with_capacity(column_count.min(r.remaining()));
    for _ in 0..column_count {
        columns.push(read_column(r, strings)?);
    }
    let mut definition = TableDefinition::new(name, columns);
    definition.round_trip = round_trip;

    let row_count = r.uleb128()?;
    let mut rows = Vec::with_capacity(row_count.min(r.remaining()));
    for _ in 0..row_count {
        let mut cells = Vec::with_capacity(column_count);
        for column in &definition.columns {
            let cell = match r.u8()? {
                CELL_NULL => None,
                CELL_INTEGER => Some(Value::Integer(r.i64()?)),
                CELL_STRING => Some(Value::String(lookup(strings, r.uleb128()?)?.to_string())),
                other => {
                    return Err(BackendError::malformed(format!(
                        "unknown cell tag {} in '{}.{}'",
                        other, definition.name, column.name
                    )))
                }
            };
            cells.push(cell);
        }
        rows.push(cells);
    }
    Ok(TableImage { definition, rows })
}

fn read_column(r: &mut ByteReader<'_>, strings: &[&str]) -> Result<ColumnDefinition> {
    let name = lookup(strings, r.uleb128()?)?.to_string();
    let ty = match r.u8()? {
        0 => {
            let bytes = r.u8()?;
            let width = IntegerWidth::from_bytes(u16::from(bytes)).ok_or_else(|| {
                BackendError::malformed(format!("invalid integer width {} for column '{}'", bytes, name))
            })?;
            ColumnType::Integer { width }
        }
        1 => {
            let encoded = r.uleb128()?;
            let max_len = match encoded {
                0 => None,
                n => Some(u32::try_from(n - 1).map_err(|_| {
                    BackendError::malformed(format!("max length of column '{}' overflows", name))
                })?),
            };
            ColumnType::String { max_len }
        }
        2 => ColumnType::Identifier,
        3 => ColumnType::Path,
        4 => ColumnType::Stream,
        other => {
            return Err(BackendError::malformed(format!(
                "unknown column type tag {} for column '{}'",
                other, name
            )))
        }
    };
    let flags = r.u8()?;
    let mut column = ColumnDefinition::new(name, ty);
    column.nullable = flags & COLUMN_NULLABLE != 0;
    column.primary_key = flags & COLUMN_PRIMARY_KEY != 0;
    if flags & COLUMN_FOREIGN_KEY != 0 {
        column.foreign_key = Some(lookup(strings, r.uleb128()?)?.to_string());
    }
    Ok(column)
}
