use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use super::store::{Collection, Document, DocumentStore, Filter, StoreError};

/// Typed view of one collection: serializes records to documents and back
pub struct Repository<T> {
    collection: Collection,
    store: Arc<dyn DocumentStore>,
    _phantom: PhantomData<T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection,
            store: self.store.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T> Repository<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(collection: Collection, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            collection,
            store,
            _phantom: PhantomData,
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub async fn select_any(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        self.store
            .find_many(self.collection, filter)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    pub async fn select_one(&self, filter: &Filter) -> Result<Option<T>, StoreError> {
        self.store
            .find_one(self.collection, filter)
            .await?
            .map(from_document)
            .transpose()
    }

    pub async fn select_id(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.store
            .find_by_id(self.collection, id)
            .await?
            .map(from_document)
            .transpose()
    }

    pub async fn select_404(&self, id: &str) -> Result<T, StoreError> {
        self.select_id(id)
            .await?
            .ok_or(StoreError::NotFound { collection: self.collection })
    }

    pub async fn insert(&self, record: &T) -> Result<T, StoreError> {
        let doc = self.store.insert(self.collection, to_document(record)?).await?;
        from_document(doc)
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete(self.collection, id).await
    }

    pub async fn delete_any(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.store.delete_many(self.collection, filter).await
    }
}

pub fn to_document<T: Serialize>(record: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(record)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(other.to_string())),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(serde_json::Value::Object(doc))?)
}
