use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::storage::HeapFile;
use crate::tuple::{TdItem, TupleDesc, Type};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No table with id {0}")]
    TableNotFound(i32),

    #[error("No table named {0}")]
    TableNameNotFound(String),

    #[error("Malformed schema line {line}: {content}")]
    MalformedSchemaLine { line: usize, content: String },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// One registered table
#[derive(Clone)]
pub struct TableItem {
    pub file: Arc<HeapFile>,
    pub name: String,
    pub primary_key: String,
}

/// Runtime registry of tables, keyed by table id (the heap file's id) and
/// by name. Safe for concurrent readers; a duplicate name rebinds to the
/// newest table (last write wins).
pub struct Catalog {
    tables: RwLock<HashMap<i32, TableItem>>,
    names: RwLock<HashMap<String, i32>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            names: RwLock::new(HashMap::new()),
        }
    }

    /// Register a table under `name`
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str, primary_key: &str) {
        let id = file.id();
        let item = TableItem {
            file,
            name: name.to_string(),
            primary_key: primary_key.to_string(),
        };
        self.tables.write().unwrap().insert(id, item);
        self.names.write().unwrap().insert(name.to_string(), id);
    }

    pub fn table_file(&self, table_id: i32) -> CatalogResult<Arc<HeapFile>> {
        self.tables
            .read()
            .unwrap()
            .get(&table_id)
            .map(|item| Arc::clone(&item.file))
            .ok_or(CatalogError::TableNotFound(table_id))
    }

    pub fn tuple_desc(&self, table_id: i32) -> CatalogResult<TupleDesc> {
        Ok(self.table_file(table_id)?.tuple_desc().clone())
    }

    pub fn table_name(&self, table_id: i32) -> CatalogResult<String> {
        self.tables
            .read()
            .unwrap()
            .get(&table_id)
            .map(|item| item.name.clone())
            .ok_or(CatalogError::TableNotFound(table_id))
    }

    pub fn primary_key(&self, table_id: i32) -> CatalogResult<String> {
        self.tables
            .read()
            .unwrap()
            .get(&table_id)
            .map(|item| item.primary_key.clone())
            .ok_or(CatalogError::TableNotFound(table_id))
    }

    pub fn table_id(&self, name: &str) -> CatalogResult<i32> {
        self.names
            .read()
            .unwrap()
            .get(name)
            .copied()
            .ok_or_else(|| CatalogError::TableNameNotFound(name.to_string()))
    }

    pub fn table_ids(&self) -> Vec<i32> {
        self.tables.read().unwrap().keys().copied().collect()
    }

    /// Load a schema file and register every table it names.
    ///
    /// Format: one table per line, `Name (col type[, col type [pk]])`.
    /// Type tokens are `int` and `string`, case-insensitive; a trailing
    /// `pk` marks the primary-key column. Each table's heap file is
    /// `<Name>.dat` next to the schema file, created when absent. Any
    /// malformed line aborts the load.
    pub fn load_schema<P: AsRef<Path>>(&self, path: P) -> CatalogResult<Vec<String>> {
        let path = path.as_ref();
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let content = fs::read_to_string(path)?;

        let mut loaded = Vec::new();
        for (line_no, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let (name, columns, primary_key) =
                parse_schema_line(line).ok_or(CatalogError::MalformedSchemaLine {
                    line: line_no + 1,
                    content: line.to_string(),
                })?;

            let desc = TupleDesc::new(columns);
            let file = HeapFile::open(base_dir.join(format!("{}.dat", name)), desc)?;
            self.add_table(file, &name, &primary_key);
            loaded.push(name);
        }
        Ok(loaded)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_schema_line(line: &str) -> Option<(String, Vec<TdItem>, String)> {
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    if close < open {
        return None;
    }
    let name = line[..open].trim();
    if name.is_empty() || !line[close + 1..].trim().is_empty() {
        return None;
    }

    let mut columns = Vec::new();
    let mut primary_key = String::new();
    for col in line[open + 1..close].split(',') {
        let tokens: Vec<&str> = col.split_whitespace().collect();
        let (col_name, ty_token, is_pk) = match tokens.as_slice() {
            [col_name, ty] => (*col_name, *ty, false),
            [col_name, ty, pk] if pk.eq_ignore_ascii_case("pk") => (*col_name, *ty, true),
            _ => return None,
        };
        let ty = if ty_token.eq_ignore_ascii_case("int") {
            Type::Int
        } else if ty_token.eq_ignore_ascii_case("string") {
            Type::Text
        } else {
            return None;
        };
        if is_pk {
            primary_key = col_name.to_string();
        }
        columns.push(TdItem::new(ty, Some(col_name.to_string())));
    }
    if columns.is_empty() {
        return None;
    }
    Some((name.to_string(), columns, primary_key))
}
