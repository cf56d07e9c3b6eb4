//! SQLite-backed resource cache.
//!
//! Every operation, read or write, runs inside one checkout of the shared
//! connection. Writes therefore never interleave, and a per-kind `replace` is a
//! single transaction: readers see either the whole old set or the whole new one.

pub mod metrics;

use chrono::{SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::models::resource::{ResourceItem, ResourceKind};
use crate::models::views::{AcceleratorPod, NamespaceView, Page};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS resources (
    id TEXT PRIMARY KEY,
    resource_type TEXT NOT NULL,
    namespace TEXT NOT NULL,
    name TEXT NOT NULL,
    raw TEXT NOT NULL,
    projection TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (resource_type, namespace, name)
);
CREATE INDEX IF NOT EXISTS idx_resources_type_ns ON resources(resource_type, namespace);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS namespace_metrics (
    namespace TEXT NOT NULL,
    metric_type TEXT NOT NULL,
    used REAL NOT NULL DEFAULT 0,
    total REAL NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (namespace, metric_type)
);
"#;

/// Filters for [`ResourceStore::query`]. Pagination values are assumed validated.
#[derive(Debug, Clone)]
pub struct ResourceQuery {
    pub namespace: Option<String>,
    pub search: Option<String>,
    pub page: u64,
    pub page_size: u64,
    /// Projection field to order by.
    pub sort_by: Option<String>,
    pub sort_desc: bool,
}

impl Default for ResourceQuery {
    fn default() -> Self {
        Self {
            namespace: None,
            search: None,
            page: 1,
            page_size: 50,
            sort_by: None,
            sort_desc: false,
        }
    }
}

#[derive(Clone)]
pub struct ResourceStore {
    conn: Arc<Mutex<Connection>>,
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn last_updated_key(kind: ResourceKind) -> String {
    format!("last_updated_{}", kind)
}

/// Matches when any scalar value of the projection (never a key) contains the term.
const PROJECTION_VALUE_MATCH: &str = "EXISTS (SELECT 1 FROM json_tree(resources.projection) AS t
    WHERE t.type IN ('text', 'integer', 'real') AND t.value LIKE ? ESCAPE '\\')";

/// Sort key for a projection field. Numbers, and strings that are plain decimal
/// numbers such as quantities, order numerically ahead of all other text.
const SORT_KEY: &str = "CASE
    WHEN json_type(projection, ?) IN ('integer', 'real') THEN json_extract(projection, ?)
    WHEN json_extract(projection, ?) GLOB '[0-9]*'
         AND json_extract(projection, ?) NOT GLOB '*[^0-9.]*'
        THEN CAST(json_extract(projection, ?) AS REAL)
    ELSE json_extract(projection, ?)
END";

/// Escapes LIKE wildcards so a search term matches literally.
fn like_pattern(term: &str) -> String {
    let mut p = String::with_capacity(term.len() + 2);
    p.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            p.push('\\');
        }
        p.push(c);
    }
    p.push('%');
    p
}

impl ResourceStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self::from_connection(conn)?;
        debug!(?path, "resource store opened");
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` while holding the single connection checkout.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut conn)
    }

    /// Runs a store operation on the blocking pool so async callers never hold
    /// the connection on a runtime worker.
    pub async fn call<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&ResourceStore) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Swaps every cached record of `kind` for `items` in one transaction.
    ///
    /// On any failure the transaction is dropped uncommitted and the previous set,
    /// including its `last_updated` entry, stays in place.
    pub fn replace(&self, kind: ResourceKind, items: &[ResourceItem]) -> StoreResult<usize> {
        self.with_conn(|conn| {
            let now = now_rfc3339();
            let tx = conn.transaction()?;

            let removed = tx.execute(
                "DELETE FROM resources WHERE resource_type = ?1",
                params![kind.as_str()],
            )?;

            {
                let mut insert = tx.prepare_cached(
                    "INSERT INTO resources
                        (id, resource_type, namespace, name, raw, projection, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                )?;
                for item in items {
                    insert.execute(params![
                        item.id(kind),
                        kind.as_str(),
                        item.namespace,
                        item.name,
                        serde_json::to_string(&item.raw)?,
                        serde_json::to_string(&item.projection)?,
                        now,
                    ])?;
                }
            }

            tx.execute(
                "INSERT INTO metadata (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![last_updated_key(kind), now],
            )?;
            tx.commit()?;

            debug!(%kind, removed, inserted = items.len(), "replaced resources");
            Ok(items.len())
        })
    }

    pub fn query(&self, kind: ResourceKind, q: &ResourceQuery) -> StoreResult<Page> {
        let page = q.page.max(1);
        let page_size = q.page_size.max(1);

        let mut clauses = vec!["resource_type = ?".to_string()];
        let mut args: Vec<SqlValue> = vec![SqlValue::from(kind.as_str().to_string())];

        if let Some(ns) = q.namespace.as_deref().filter(|ns| !ns.is_empty() && *ns != "all") {
            clauses.push("namespace = ?".to_string());
            args.push(SqlValue::from(ns.to_string()));
        }
        if let Some(term) = q.search.as_deref().filter(|s| !s.is_empty()) {
            clauses.push(format!(
                "(name LIKE ? ESCAPE '\\' OR namespace LIKE ? ESCAPE '\\' OR {PROJECTION_VALUE_MATCH})"
            ));
            let pattern = like_pattern(term);
            for _ in 0..3 {
                args.push(SqlValue::from(pattern.clone()));
            }
        }
        let where_sql = clauses.join(" AND ");

        let mut order_args: Vec<SqlValue> = Vec::new();
        let order_sql = match q.sort_by.as_deref().filter(|s| !s.is_empty()) {
            Some(field) => {
                let path = format!("$.{}", field);
                for _ in 0..SORT_KEY.matches('?').count() {
                    order_args.push(SqlValue::from(path.clone()));
                }
                let dir = if q.sort_desc { "DESC" } else { "ASC" };
                format!("{SORT_KEY} {dir}, namespace ASC, name ASC")
            }
            None => "namespace ASC, name ASC".to_string(),
        };

        let limit = i64::try_from(page_size).unwrap_or(i64::MAX);
        let offset = i64::try_from((page - 1).saturating_mul(page_size)).unwrap_or(i64::MAX);

        self.with_conn(|conn| {
            let tx = conn.transaction()?;

            let total: i64 = tx.query_row(
                &format!("SELECT COUNT(*) FROM resources WHERE {where_sql}"),
                params_from_iter(args.iter()),
                |row| row.get(0),
            )?;

            let mut select_args = args.clone();
            select_args.extend(order_args);
            select_args.push(SqlValue::from(limit));
            select_args.push(SqlValue::from(offset));

            let mut items = Vec::new();
            {
                let mut stmt = tx.prepare(&format!(
                    "SELECT raw, projection FROM resources WHERE {where_sql}
                     ORDER BY {order_sql} LIMIT ? OFFSET ?"
                ))?;
                let mut rows = stmt.query(params_from_iter(select_args.iter()))?;
                while let Some(row) = rows.next()? {
                    let raw: String = row.get(0)?;
                    let projection: String = row.get(1)?;
                    items.push(attach_projection(
                        serde_json::from_str(&raw)?,
                        serde_json::from_str(&projection)?,
                    ));
                }
            }
            tx.commit()?;

            let total = total.max(0) as u64;
            Ok(Page {
                items,
                total,
                page,
                page_size,
                total_pages: Page::total_pages(total, page_size),
            })
        })
    }

    /// `None` until `kind` has been replaced at least once.
    pub fn last_updated(&self, kind: ResourceKind) -> StoreResult<Option<String>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM metadata WHERE key = ?1",
                    params![last_updated_key(kind)],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    pub fn namespaces(&self) -> StoreResult<Vec<NamespaceView>> {
        self.with_conn(|conn| namespaces_in(conn))
    }

    /// Pods requesting at least one accelerator.
    pub fn accelerator_bearing_pods(&self) -> StoreResult<Vec<AcceleratorPod>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT namespace, name,
                        COALESCE(json_extract(projection, '$.node'), ''),
                        COALESCE(json_extract(projection, '$.phase'), ''),
                        json_extract(projection, '$.accelerators'),
                        COALESCE(json_extract(projection, '$.created'), '')
                 FROM resources
                 WHERE resource_type = ?1
                   AND json_extract(projection, '$.accelerators') IS NOT NULL
                   AND json_extract(projection, '$.accelerators') NOT IN ('', '0')
                 ORDER BY namespace, name",
            )?;
            let pods = stmt
                .query_map(params![ResourceKind::Pods.as_str()], |row| {
                    Ok(AcceleratorPod {
                        namespace: row.get(0)?,
                        name: row.get(1)?,
                        node: row.get(2)?,
                        phase: row.get(3)?,
                        quantity: row.get(4)?,
                        created: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(pods)
        })
    }
}

fn attach_projection(raw: Value, projection: Map<String, Value>) -> Value {
    match raw {
        Value::Object(mut doc) => {
            doc.insert("projection".to_string(), Value::Object(projection));
            Value::Object(doc)
        }
        other => {
            let mut doc = Map::new();
            doc.insert("raw".to_string(), other);
            doc.insert("projection".to_string(), Value::Object(projection));
            Value::Object(doc)
        }
    }
}

/// Namespace records win when present; otherwise namespaces are inferred from
/// every other cached record.
pub(crate) fn namespaces_in(conn: &Connection) -> StoreResult<Vec<NamespaceView>> {
    let mut stmt = conn.prepare(
        "SELECT name,
                COALESCE(json_extract(projection, '$.created'), ''),
                COALESCE(json_extract(projection, '$.status'), 'Active')
         FROM resources WHERE resource_type = ?1 ORDER BY name",
    )?;
    let dedicated = stmt
        .query_map(params![ResourceKind::Namespaces.as_str()], |row| {
            Ok(NamespaceView {
                name: row.get(0)?,
                created: row.get(1)?,
                status: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    if !dedicated.is_empty() {
        return Ok(dedicated);
    }

    let mut stmt = conn.prepare(
        "SELECT DISTINCT namespace FROM resources WHERE resource_type != ?1 ORDER BY namespace",
    )?;
    let inferred = stmt
        .query_map(params![ResourceKind::Namespaces.as_str()], |row| {
            Ok(NamespaceView {
                name: row.get(0)?,
                created: String::new(),
                status: "Active".to_string(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(inferred)
}
