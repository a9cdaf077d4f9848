use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::document::{apply_array_op, apply_patch, document_id, unique_violation, upsert_document};
use super::store::{
    ArrayOp, Collection, Document, DocumentStore, Filter, Patch, StoreError, UpdateOptions, UpdateOutcome,
};

type Table = BTreeMap<String, Document>;

/// In-process document store. Every mutation runs under a single write lock,
/// which makes check-then-write sequences atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<Collection, Table>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn first_match<'a>(table: &'a Table, filter: &Filter) -> Option<&'a Document> {
    table.values().find(|doc| filter.matches(doc))
}

fn first_match_id(table: &Table, filter: &Filter) -> Option<String> {
    first_match(table, filter).and_then(|doc| document_id(doc).ok().map(str::to_string))
}

fn check_unique(collection: Collection, table: &Table, candidate: &Document) -> Result<(), StoreError> {
    match unique_violation(collection, candidate, table.values()) {
        Some(key) => Err(StoreError::Duplicate { collection, key }),
        None => Ok(()),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.get(&collection).and_then(|table| table.get(id)).cloned())
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&collection)
            .and_then(|table| first_match(table, filter))
            .cloned())
    }

    async fn find_many(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&collection)
            .map(|table| table.values().filter(|doc| filter.matches(doc)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert(&self, collection: Collection, doc: Document) -> Result<Document, StoreError> {
        let id = document_id(&doc)?.to_string();
        let mut tables = self.tables.write().await;
        let table = tables.entry(collection).or_default();

        if table.contains_key(&id) {
            return Err(StoreError::Duplicate {
                collection,
                key: "id".to_string(),
            });
        }
        check_unique(collection, table, &doc)?;

        table.insert(id, doc.clone());
        Ok(doc)
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: &Patch,
        options: UpdateOptions,
    ) -> Result<Option<UpdateOutcome>, StoreError> {
        let mut tables = self.tables.write().await;
        let table = tables.entry(collection).or_default();

        match first_match_id(table, filter) {
            Some(id) => {
                let Some(current) = table.get(&id) else {
                    return Ok(None);
                };
                let before = current.clone();
                let mut after = before.clone();
                apply_patch(&mut after, patch)?;
                check_unique(collection, table, &after)?;

                table.insert(id, after.clone());
                let document = if options.return_updated { after } else { before };
                Ok(Some(UpdateOutcome {
                    document,
                    inserted: false,
                }))
            }
            None if options.upsert => {
                let created = upsert_document(filter, patch)?;
                check_unique(collection, table, &created)?;

                let id = document_id(&created)?.to_string();
                debug!("Upsert inserted {} document {}", collection, id);
                table.insert(id, created.clone());
                Ok(Some(UpdateOutcome {
                    document: created,
                    inserted: true,
                }))
            }
            None => Ok(None),
        }
    }

    async fn modify_array(
        &self,
        collection: Collection,
        filter: &Filter,
        op: &ArrayOp,
    ) -> Result<Document, StoreError> {
        let mut tables = self.tables.write().await;
        let table = tables.entry(collection).or_default();

        let id = first_match_id(table, filter).ok_or(StoreError::NotFound { collection })?;
        let doc = table.get_mut(&id).ok_or(StoreError::NotFound { collection })?;

        // Mutate a copy so a rejected op leaves the stored document untouched
        let mut updated = doc.clone();
        apply_array_op(&mut updated, op)?;
        *doc = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .get_mut(&collection)
            .and_then(|table| table.remove(id))
            .map(|_| ())
            .ok_or(StoreError::NotFound { collection })
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&collection) else {
            return Ok(0);
        };
        let before = table.len();
        table.retain(|_, doc| !filter.matches(doc));
        Ok((before - table.len()) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
