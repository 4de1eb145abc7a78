use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::Cell;
use std::path::{Path, PathBuf};

/// The named collections of the document store. Each one is a SQLite table
/// holding one JSON document per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Jobs,
    Candidates,
    Notes,
    Timelines,
    Assessments,
    Submissions,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Jobs,
        Collection::Candidates,
        Collection::Notes,
        Collection::Timelines,
        Collection::Assessments,
        Collection::Submissions,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Collection::Jobs => "jobs",
            Collection::Candidates => "candidates",
            Collection::Notes => "notes",
            Collection::Timelines => "timelines",
            Collection::Assessments => "assessments",
            Collection::Submissions => "submissions",
        }
    }

    /// Fields usable with `find_by`. Each gets an expression index.
    pub fn indexed_fields(self) -> &'static [&'static str] {
        match self {
            Collection::Jobs => &["slug", "status"],
            Collection::Candidates => &["jobId", "stage", "email"],
            Collection::Notes => &["candidateId"],
            Collection::Timelines => &["candidateId"],
            Collection::Assessments => &["jobId"],
            Collection::Submissions => &["jobId", "candidateId"],
        }
    }

    fn unique_fields(self) -> &'static [&'static str] {
        match self {
            Collection::Jobs => &["slug"],
            _ => &[],
        }
    }
}

/// An entity that lives in one collection of the store.
pub trait Document: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
}

pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
    last_stamp: Cell<i64>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
            last_stamp: Cell::new(0),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            path: None,
            last_stamp: Cell::new(0),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn default_path() -> Result<PathBuf> {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "hiretrack") {
            Ok(proj_dirs.data_dir().join("hiretrack.db"))
        } else {
            Ok(PathBuf::from("hiretrack.db"))
        }
    }

    pub fn init(&self) -> Result<()> {
        for collection in Collection::ALL {
            let table = collection.table();
            let mut sql = format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    doc TEXT NOT NULL
                );\n"
            );
            for field in collection.indexed_fields() {
                let unique = if collection.unique_fields().contains(field) {
                    "UNIQUE "
                } else {
                    ""
                };
                sql.push_str(&format!(
                    "CREATE {unique}INDEX IF NOT EXISTS idx_{table}_{field}
                     ON {table}(json_extract(doc, '$.{field}'));\n"
                ));
            }
            self.conn
                .execute_batch(&sql)
                .with_context(|| format!("Failed to create collection {table}"))?;
        }
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, err)| anyhow!("Failed to close store: {err}"))
    }

    /// Milliseconds since the epoch, strictly increasing for this handle so
    /// audit records written in the same millisecond still order correctly.
    pub fn now_millis(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let stamp = now.max(self.last_stamp.get() + 1);
        self.last_stamp.set(stamp);
        stamp
    }

    /// Runs `f` inside one transaction. Nothing `f` wrote survives unless it
    /// returns `Ok`.
    pub fn atomically<R, E>(&self, f: impl FnOnce(&Self) -> Result<R, E>) -> Result<R, E>
    where
        E: From<anyhow::Error>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let out = f(self)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(out)
    }

    // --- Document operations ---

    pub fn get<T: Document>(&self, id: i64) -> Result<Option<T>> {
        let table = T::COLLECTION.table();
        let doc: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT doc FROM {table} WHERE id = ?1"),
                [id],
                |row| row.get(0),
            )
            .optional()?;
        doc.map(|doc| decode(id, &doc)).transpose()
    }

    /// Inserts a new document and returns its store-assigned id. Whatever id
    /// the entity carries is ignored.
    pub fn add<T: Document>(&self, entity: &T) -> Result<i64> {
        let table = T::COLLECTION.table();
        let doc = serde_json::to_string(entity)?;
        self.conn
            .execute(&format!("INSERT INTO {table} (doc) VALUES (?1)"), [&doc])
            .with_context(|| format!("Failed to insert into {table}"))?;
        let id = self.conn.last_insert_rowid();
        self.conn.execute(
            &format!("UPDATE {table} SET doc = json_set(doc, '$.id', ?1) WHERE id = ?1"),
            [id],
        )?;
        Ok(id)
    }

    /// Inserts or fully replaces the document with the entity's own id.
    pub fn put<T: Document>(&self, entity: &T) -> Result<()> {
        let table = T::COLLECTION.table();
        let doc = serde_json::to_string(entity)?;
        self.conn
            .execute(
                &format!("INSERT OR REPLACE INTO {table} (id, doc) VALUES (?1, ?2)"),
                params![entity.id(), doc],
            )
            .with_context(|| format!("Failed to write {table} #{}", entity.id()))?;
        Ok(())
    }

    pub fn update<T: Document>(&self, id: i64, apply: impl FnOnce(&mut T)) -> Result<Option<T>> {
        let Some(mut entity) = self.get::<T>(id)? else {
            return Ok(None);
        };
        apply(&mut entity);
        entity.set_id(id);
        let table = T::COLLECTION.table();
        let doc = serde_json::to_string(&entity)?;
        self.conn
            .execute(
                &format!("UPDATE {table} SET doc = ?1 WHERE id = ?2"),
                params![doc, id],
            )
            .with_context(|| format!("Failed to update {table} #{id}"))?;
        Ok(Some(entity))
    }

    pub fn delete<T: Document>(&self, id: i64) -> Result<bool> {
        let table = T::COLLECTION.table();
        let removed = self
            .conn
            .execute(&format!("DELETE FROM {table} WHERE id = ?1"), [id])?;
        Ok(removed > 0)
    }

    pub fn all<T: Document>(&self) -> Result<Vec<T>> {
        let table = T::COLLECTION.table();
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, doc FROM {table} ORDER BY id"))?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            let (id, doc) = row.with_context(|| format!("Failed to read {table}"))?;
            out.push(decode(id, &doc)?);
        }
        Ok(out)
    }

    /// Equality lookup on one of the collection's indexed fields.
    pub fn find_by<T: Document>(&self, field: &str, value: &dyn ToSql) -> Result<Vec<T>> {
        let collection = T::COLLECTION;
        let table = collection.table();
        if !collection.indexed_fields().contains(&field) {
            return Err(anyhow!("'{field}' is not an indexed field of {table}"));
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, doc FROM {table}
             WHERE json_extract(doc, '$.{field}') = ?1
             ORDER BY id"
        ))?;
        let rows = stmt.query_map([value], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, doc) = row.with_context(|| format!("Failed to read {table}"))?;
            out.push(decode(id, &doc)?);
        }
        Ok(out)
    }

    pub fn count<T: Document>(&self) -> Result<usize> {
        let table = T::COLLECTION.table();
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn decode<T: Document>(id: i64, doc: &str) -> Result<T> {
    let mut entity: T = serde_json::from_str(doc)
        .with_context(|| format!("Corrupt document {}#{id}", T::COLLECTION.table()))?;
    entity.set_id(id);
    Ok(entity)
}
