/// Local backend for offline development and tests
///
/// Records are stored as JSON documents in a single SQLite table keyed by
/// collection name; queries are evaluated in-process. Objects are written
/// under a directory tree `{root}/{bucket}/{key}` and addressed by
/// `file://` URLs.
///
/// Embedding follows the usual foreign-key naming:
/// - to-one: the row has `{relation singular}_id` (e.g. `course_id` for `courses`)
/// - to-many: the related rows have `{table singular}_id` (e.g. `project_id`)

use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::query::{Embed, Query};
use super::{ObjectStore, RecordStore, StoreError};

pub struct LocalRecords {
    conn: Mutex<Connection>,
}

impl LocalRecords {
    /// Open (or create) the catalog database at `db_path`
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        info!("📁 Local catalog at: {}", db_path.display());
        Self::with_connection(conn)
    }

    /// Catalog that lives only as long as this value
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                collection      TEXT NOT NULL,
                body            TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_records_collection
             ON records(collection)",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All documents of a collection in insertion order
    fn load(conn: &Connection, collection: &str) -> Result<Vec<Map<String, Value>>, StoreError> {
        let mut stmt = conn.prepare("SELECT body FROM records WHERE collection = ?1 ORDER BY id")?;
        let bodies = stmt.query_map([collection], |row| row.get::<_, String>(0))?;

        let mut rows = Vec::new();
        for body in bodies {
            match serde_json::from_str::<Value>(&body?)? {
                Value::Object(map) => rows.push(map),
                other => {
                    return Err(StoreError::Invalid(format!(
                        "non-object document in {collection}: {other}"
                    )))
                }
            }
        }
        Ok(rows)
    }

    fn insert_blocking(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut inserted = Vec::with_capacity(rows.len());

        for row in rows {
            let Value::Object(mut map) = row else {
                return Err(StoreError::Invalid(format!("row for {table} is not an object")));
            };

            tx.execute(
                "INSERT INTO records (collection, body) VALUES (?1, '{}')",
                [table],
            )?;
            let rowid = tx.last_insert_rowid();

            // Mirror the database defaults the hosted schema provides
            map.entry("id").or_insert_with(|| Value::String(rowid.to_string()));
            map.entry("created_at")
                .or_insert_with(|| Value::String(chrono::Utc::now().to_rfc3339()));

            tx.execute(
                "UPDATE records SET body = ?1 WHERE id = ?2",
                rusqlite::params![serde_json::to_string(&map)?, rowid],
            )?;
            inserted.push(Value::Object(map));
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn select_blocking(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        let conn = self.conn();
        let mut rows = Self::load(&conn, &query.table)?;

        rows.retain(|row| {
            query
                .filters
                .iter()
                .all(|(column, value)| row.get(column).map_or(value.is_null(), |v| loose_eq(v, value)))
        });

        rows.sort_by(|a, b| {
            for order in &query.order {
                let left = a.get(&order.column).unwrap_or(&Value::Null);
                let right = b.get(&order.column).unwrap_or(&Value::Null);
                let ord = compare_values(left, right);
                let ord = if order.ascending { ord } else { ord.reverse() };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        rows.into_iter()
            .map(|row| shape_row(&conn, &query.table, row, &query.columns, &query.embeds))
            .collect()
    }
}

/// Project columns and expand embeds for one row
fn shape_row(
    conn: &Connection,
    table: &str,
    row: Map<String, Value>,
    columns: &[String],
    embeds: &[Embed],
) -> Result<Value, StoreError> {
    let mut shaped = if columns.is_empty() || columns.iter().any(|c| c == "*") {
        row.clone()
    } else {
        columns
            .iter()
            .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
            .collect()
    };

    for embed in embeds {
        let value = expand(conn, table, &row, embed)?;
        shaped.insert(embed.relation.clone(), value);
    }
    Ok(Value::Object(shaped))
}

fn expand(
    conn: &Connection,
    table: &str,
    row: &Map<String, Value>,
    embed: &Embed,
) -> Result<Value, StoreError> {
    let related = LocalRecords::load(conn, &embed.relation)?;

    let to_one_key = format!("{}_id", singular(&embed.relation));
    if let Some(fk) = row.get(&to_one_key) {
        let target = related
            .into_iter()
            .find(|candidate| candidate.get("id").is_some_and(|id| loose_eq(id, fk)));
        return match target {
            Some(target) => shape_row(conn, &embed.relation, target, &embed.columns, &embed.embeds),
            None => Ok(Value::Null),
        };
    }

    let back_key = format!("{}_id", singular(table));
    let Some(id) = row.get("id") else {
        return Ok(Value::Array(Vec::new()));
    };
    let children = related
        .into_iter()
        .filter(|candidate| candidate.get(&back_key).is_some_and(|v| loose_eq(v, id)))
        .map(|child| shape_row(conn, &embed.relation, child, &embed.columns, &embed.embeds))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(children))
}

fn singular(name: &str) -> &str {
    name.strip_suffix('s').unwrap_or(name)
}

/// Equality that treats `"3"` and `3` as the same identifier
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            *s == n.to_string()
        }
        _ => a == b,
    }
}

/// Total order over JSON scalars: null < bool < number < string < others
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[async_trait]
impl RecordStore for LocalRecords {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        debug!("local select from {}", query.table);
        self.select_blocking(query)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, StoreError> {
        debug!("local insert into {} ({} rows)", table, rows.len());
        self.insert_blocking(table, rows)
    }
}

impl std::fmt::Debug for LocalRecords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRecords").finish_non_exhaustive()
    }
}

/// Object directory standing in for the hosted storage buckets
#[derive(Debug, Clone)]
pub struct LocalObjects {
    root: PathBuf,
}

impl LocalObjects {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve `bucket/key` under the root, refusing anything that escapes it
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(bucket).join(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || key.is_empty() {
            return Err(StoreError::Invalid(format!("invalid object key: {bucket}/{key}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjects {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        if path.exists() {
            return Err(StoreError::Invalid(format!("The resource already exists: {bucket}/{key}")));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        debug!("stored {} ({} bytes, {})", path.display(), bytes.len(), content_type);
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        let path = self.root.join(bucket).join(key);
        reqwest::Url::from_file_path(&path)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("file://{}", path.display()))
    }
}
