use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};

use super::document::{apply_array_op, apply_patch, document_id, upsert_document};
use super::store::{
    ArrayOp, Collection, Document, DocumentStore, Filter, Patch, StoreError, UpdateOptions, UpdateOutcome,
};
use crate::config::DatabaseConfig;

/// Attempts for an upsert that keeps losing the insert race
const UPSERT_ATTEMPTS: usize = 3;

/// PostgreSQL document store: one `(id TEXT, doc JSONB)` table per collection.
/// Read-modify-write operations run inside a transaction holding the row lock.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!("Connected PostgreSQL document store ({} max connections)", config.max_connections);
        Ok(store)
    }

    /// Create collection tables and unique indexes if missing
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for collection in Collection::ALL {
            for statement in schema_statements(collection) {
                sqlx::query(&statement).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    async fn lock_first(
        tx: &mut Transaction<'_, Postgres>,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<(String, Document)>, StoreError> {
        let sql = format!(
            "SELECT id, doc FROM {} WHERE doc @> $1 ORDER BY id LIMIT 1 FOR UPDATE",
            collection.name()
        );
        let row = sqlx::query_as::<_, (String, Json<Value>)>(&sql)
            .bind(Json(Value::Object(filter.to_object())))
            .fetch_optional(&mut **tx)
            .await?;

        row.map(|(id, Json(doc))| into_document(doc).map(|doc| (id, doc)))
            .transpose()
    }

    async fn write(
        tx: &mut Transaction<'_, Postgres>,
        collection: Collection,
        id: &str,
        doc: &Document,
    ) -> Result<(), StoreError> {
        let sql = format!("UPDATE {} SET doc = $2 WHERE id = $1", collection.name());
        sqlx::query(&sql)
            .bind(id)
            .bind(Json(doc.clone()))
            .execute(&mut **tx)
            .await
            .map_err(|err| map_write_error(collection, err))?;
        Ok(())
    }
}

fn schema_statements(collection: Collection) -> Vec<String> {
    let table = collection.name();
    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, doc JSONB NOT NULL)",
        table
    )];
    for key in collection.unique_keys() {
        statements.push(format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {table}_{key}_key ON {table} ((doc->>'{key}'))"
        ));
    }
    statements
}

fn into_document(value: Value) -> Result<Document, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(other.to_string())),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Unique key named by an index `{table}_{key}_key`, or `id` for the primary key
fn violated_key(collection: Collection, err: &sqlx::Error) -> String {
    let constraint = match err {
        sqlx::Error::Database(db) => db.constraint().map(str::to_string),
        _ => None,
    };
    constraint
        .as_deref()
        .and_then(|name| name.strip_prefix(&format!("{}_", collection.name())).map(str::to_string))
        .and_then(|rest| rest.strip_suffix("_key").map(str::to_string))
        .unwrap_or_else(|| "id".to_string())
}

fn map_write_error(collection: Collection, err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::Duplicate {
            collection,
            key: violated_key(collection, &err),
        }
    } else {
        err.into()
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn find_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let sql = format!("SELECT doc FROM {} WHERE id = $1", collection.name());
        let row = sqlx::query_scalar::<_, Json<Value>>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|Json(doc)| into_document(doc)).transpose()
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let sql = format!(
            "SELECT doc FROM {} WHERE doc @> $1 ORDER BY id LIMIT 1",
            collection.name()
        );
        let row = sqlx::query_scalar::<_, Json<Value>>(&sql)
            .bind(Json(Value::Object(filter.to_object())))
            .fetch_optional(&self.pool)
            .await?;
        row.map(|Json(doc)| into_document(doc)).transpose()
    }

    async fn find_many(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let sql = format!("SELECT doc FROM {} WHERE doc @> $1 ORDER BY id", collection.name());
        let rows = sqlx::query_scalar::<_, Json<Value>>(&sql)
            .bind(Json(Value::Object(filter.to_object())))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(|Json(doc)| into_document(doc)).collect()
    }

    async fn insert(&self, collection: Collection, doc: Document) -> Result<Document, StoreError> {
        let id = document_id(&doc)?.to_string();
        let sql = format!("INSERT INTO {} (id, doc) VALUES ($1, $2)", collection.name());
        sqlx::query(&sql)
            .bind(&id)
            .bind(Json(doc.clone()))
            .execute(&self.pool)
            .await
            .map_err(|err| map_write_error(collection, err))?;
        Ok(doc)
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
        options: UpdateOptions,
    ) -> Result<Option<UpdateOutcome>, StoreError> {
        for attempt in 1..=UPSERT_ATTEMPTS {
            let mut tx = self.pool.begin().await?;

            if let Some((id, before)) = Self::lock_first(&mut tx, collection, filter).await? {
                let mut after = before.clone();
                apply_patch(&mut after, patch)?;
                Self::write(&mut tx, collection, &id, &after).await?;
                tx.commit().await?;

                let document = if options.return_updated { after } else { before };
                return Ok(Some(UpdateOutcome {
                    document,
                    inserted: false,
                }));
            }

            if !options.upsert {
                tx.rollback().await?;
                return Ok(None);
            }

            let created = upsert_document(filter, patch)?;
            let id = document_id(&created)?.to_string();
            let sql = format!("INSERT INTO {} (id, doc) VALUES ($1, $2)", collection.name());
            match sqlx::query(&sql)
                .bind(&id)
                .bind(Json(created.clone()))
                .execute(&mut *tx)
                .await
            {
                Ok(_) => {
                    tx.commit().await?;
                    debug!("Upsert inserted {} document {}", collection, id);
                    return Ok(Some(UpdateOutcome {
                        document: created,
                        inserted: true,
                    }));
                }
                Err(err) if is_unique_violation(&err) && attempt < UPSERT_ATTEMPTS => {
                    // A concurrent upsert inserted first; retry so this call
                    // lands as an update of the winner's document
                    warn!("Upsert on {} lost insert race, retrying ({}/{})", collection, attempt, UPSERT_ATTEMPTS);
                    tx.rollback().await?;
                }
                Err(err) => return Err(map_write_error(collection, err)),
            }
        }

        Err(StoreError::Duplicate {
            collection,
            key: collection.unique_keys().first().copied().unwrap_or("id").to_string(),
        })
    }

    async fn modify_array(
        &self,
        collection: Collection,
        filter: &Filter,
        op: &ArrayOp,
    ) -> Result<Document, StoreError> {
        let mut tx = self.pool.begin().await?;
        let (id, mut doc) = Self::lock_first(&mut tx, collection, filter)
            .await?
            .ok_or(StoreError::NotFound { collection })?;

        apply_array_op(&mut doc, op)?;
        Self::write(&mut tx, collection, &id, &doc).await?;
        tx.commit().await?;
        Ok(doc)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", collection.name());
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { collection });
        }
        Ok(())
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM {} WHERE doc @> $1", collection.name());
        let result = sqlx::query(&sql)
            .bind(Json(Value::Object(filter.to_object())))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
