use super::{
    Direction, Document, DocumentStore, IndexSpec, NewDocument, Query, StoreError, StoreResult,
    server_now,
};
use async_trait::async_trait;
use libsql::{Builder, Connection};
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

/// Document store on a single libSQL table, one JSON object per row.
///
/// Composite indexes are expression indexes over `json_extract` paths; a
/// query that needs one checks `sqlite_master` for it by name.
pub struct SqliteDocumentStore {
    conn: Connection,
}

impl SqliteDocumentStore {
    pub async fn open(db_path: &str) -> StoreResult<Self> {
        let db = Builder::new_local(db_path).build().await?;
        let conn = db.connect()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                collection TEXT NOT NULL,
                data TEXT NOT NULL
            )
            "#,
            (),
        )
        .await?;

        info!("Document store opened: {}", db_path);
        Ok(Self { conn })
    }

    /// Inserts a record verbatim, without stamping a server timestamp.
    pub async fn insert_raw(&self, collection: &str, data: Value) -> StoreResult<String> {
        let Value::Object(data) = data else {
            return Err(StoreError::InvalidQuery(
                "raw documents must be JSON objects".to_string(),
            ));
        };
        self.write(collection, data).await
    }

    async fn write(&self, collection: &str, data: Map<String, Value>) -> StoreResult<String> {
        let id = Uuid::new_v4().to_string();
        let json = Value::Object(data).to_string();
        self.conn
            .execute(
                "INSERT INTO documents (id, collection, data) VALUES (?1, ?2, ?3)",
                (id.as_str(), collection, json.as_str()),
            )
            .await?;
        debug!("Inserted document {} into {}", id, collection);
        Ok(id)
    }

    async fn index_exists(&self, index: &IndexSpec) -> StoreResult<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'index' AND name = ?1",
                [index.name()],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }
}

fn check_identifier(name: &str) -> StoreResult<&str> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(StoreError::InvalidQuery(format!(
            "unsupported field or collection name: {name:?}"
        )))
    }
}

fn json_path(field: &str) -> StoreResult<String> {
    Ok(format!("json_extract(data, '$.{}')", check_identifier(field)?))
}

fn to_sql_value(value: &Value) -> StoreResult<libsql::Value> {
    match value {
        Value::String(s) => Ok(libsql::Value::Text(s.clone())),
        Value::Bool(b) => Ok(libsql::Value::Integer(i64::from(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(libsql::Value::Integer(i)),
            None => Ok(libsql::Value::Real(n.as_f64().unwrap_or_default())),
        },
        Value::Null => Ok(libsql::Value::Null),
        other => Err(StoreError::InvalidQuery(format!(
            "cannot filter on non-scalar value {other}"
        ))),
    }
}

fn build_select(collection: &str, query: &Query) -> StoreResult<(String, Vec<libsql::Value>)> {
    let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?1");
    let mut params = vec![libsql::Value::Text(collection.to_string())];

    for filter in &query.filters {
        let path = json_path(&filter.field)?;
        if filter.value.is_null() {
            sql.push_str(&format!(" AND {path} IS NULL"));
        } else {
            params.push(to_sql_value(&filter.value)?);
            sql.push_str(&format!(" AND {path} = ?{}", params.len()));
        }
    }

    match &query.order_by {
        Some(order) => {
            let dir = match order.direction {
                Direction::Ascending => "ASC",
                Direction::Descending => "DESC",
            };
            sql.push_str(&format!(
                " ORDER BY {} {dir}, seq {dir}",
                json_path(&order.field)?
            ));
        }
        None => sql.push_str(" ORDER BY seq ASC"),
    }

    Ok((sql, params))
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert(&self, collection: &str, document: NewDocument) -> StoreResult<String> {
        check_identifier(collection)?;
        let mut data = document.data;
        if let Some(field) = document.server_timestamp_field {
            data.insert(field, Value::String(server_now()));
        }
        self.write(collection, data).await
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        check_identifier(collection)?;
        if let Some(index) = IndexSpec::required_for(collection, query) {
            if !self.index_exists(&index).await? {
                return Err(StoreError::IndexMissing { index });
            }
        }

        let (sql, params) = build_select(collection, query)?;
        let mut rows = self
            .conn
            .query(&sql, libsql::params_from_iter(params))
            .await?;

        let mut documents = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            let raw: String = row.get(1)?;
            let data = match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(data)) => data,
                Ok(_) => {
                    return Err(StoreError::Malformed {
                        id,
                        reason: "not a JSON object".to_string(),
                    });
                }
                Err(e) => {
                    return Err(StoreError::Malformed {
                        id,
                        reason: e.to_string(),
                    });
                }
            };
            documents.push(Document { id, data });
        }

        debug!(
            "Retrieved {} documents from {}",
            documents.len(),
            collection
        );
        Ok(documents)
    }

    async fn ensure_index(&self, index: &IndexSpec) -> StoreResult<()> {
        check_identifier(&index.collection)?;
        let mut columns = vec!["collection".to_string()];
        for field in index.fields.iter().chain(std::iter::once(&index.order_field)) {
            columns.push(json_path(field)?);
        }

        let sql = format!(
            "CREATE INDEX IF NOT EXISTS \"{}\" ON documents ({})",
            index.name(),
            columns.join(", ")
        );
        self.conn.execute(&sql, ()).await?;
        info!("Composite index ready: {}", index);
        Ok(())
    }
}
