use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::database::repository::{from_document, to_document};
use crate::database::{ArrayOp, Collection, DocumentStore, Filter, StoreError};
use crate::error::ApiError;

/// Embedded ordered sequences that live inside a parent document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddedList {
    Experience,
    Education,
    Likes,
    Comments,
}

impl EmbeddedList {
    pub fn collection(self) -> Collection {
        match self {
            EmbeddedList::Experience | EmbeddedList::Education => Collection::Profiles,
            EmbeddedList::Likes | EmbeddedList::Comments => Collection::Posts,
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            EmbeddedList::Experience => "experience",
            EmbeddedList::Education => "education",
            EmbeddedList::Likes => "likes",
            EmbeddedList::Comments => "comments",
        }
    }

    /// Key an entry is removed by. Likes are keyed by the liking user.
    pub fn entry_key(self) -> &'static str {
        match self {
            EmbeddedList::Likes => "user_id",
            _ => "id",
        }
    }

    /// Key that must stay unique within the list, if any
    pub fn unique_on(self) -> Option<&'static str> {
        match self {
            EmbeddedList::Likes => Some("user_id"),
            _ => None,
        }
    }

    fn duplicate_message(self) -> &'static str {
        match self {
            EmbeddedList::Likes => "Post already liked",
            EmbeddedList::Comments => "Comment already exists",
            EmbeddedList::Experience => "Experience already exists",
            EmbeddedList::Education => "Education already exists",
        }
    }

    fn missing_message(self) -> &'static str {
        match self {
            EmbeddedList::Likes => "Post not liked yet",
            EmbeddedList::Comments => "Comment does not exist",
            EmbeddedList::Experience => "Experience not found",
            EmbeddedList::Education => "Education not found",
        }
    }

    fn map_error(self, err: StoreError) -> ApiError {
        match err {
            StoreError::DuplicateEntry { .. } => ApiError::conflict(self.duplicate_message()),
            StoreError::EntryNotFound { .. } => ApiError::not_found(self.missing_message()),
            other => other.into(),
        }
    }
}

/// Inserts and removes embedded entries with single atomic store operations,
/// so concurrent edits of one parent never overwrite each other
#[derive(Clone)]
pub struct EmbeddedEditor {
    store: Arc<dyn DocumentStore>,
}

impl EmbeddedEditor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Prepend `entry` to the list of the parent matching `parent`
    pub async fn add<P, E>(&self, list: EmbeddedList, parent: &Filter, entry: &E) -> Result<P, ApiError>
    where
        P: DeserializeOwned,
        E: Serialize,
    {
        let op = ArrayOp::PushFront {
            field: list.field().to_string(),
            entry: Value::Object(to_document(entry)?),
            unique_on: list.unique_on().map(str::to_string),
        };
        let doc = self
            .store
            .modify_array(list.collection(), parent, &op)
            .await
            .map_err(|err| list.map_error(err))?;

        debug!("Added entry to {}.{}", list.collection(), list.field());
        Ok(from_document(doc)?)
    }

    /// Remove the entry whose own key (`entry_key`) equals `key_value`
    pub async fn remove<P>(&self, list: EmbeddedList, parent: &Filter, key_value: &str) -> Result<P, ApiError>
    where
        P: DeserializeOwned,
    {
        let op = ArrayOp::Pull {
            field: list.field().to_string(),
            key: list.entry_key().to_string(),
            value: Value::String(key_value.to_string()),
        };
        let doc = self
            .store
            .modify_array(list.collection(), parent, &op)
            .await
            .map_err(|err| list.map_error(err))?;

        debug!("Removed entry {} from {}.{}", key_value, list.collection(), list.field());
        Ok(from_document(doc)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Like, Post};
    use crate::database::repository::to_document;
    use crate::database::MemoryStore;
    use chrono::Utc;

    async fn editor_with_post() -> EmbeddedEditor {
        let store = Arc::new(MemoryStore::new());
        let post = Post {
            id: "p1".into(),
            user_id: "author".into(),
            text: "hello".into(),
            name: "Author".into(),
            avatar: String::new(),
            date: Utc::now(),
            likes: Vec::new(),
            comments: Vec::new(),
        };
        store
            .insert(Collection::Posts, to_document(&post).unwrap())
            .await
            .unwrap();
        EmbeddedEditor::new(store)
    }

    fn like(user: &str) -> Like {
        Like { user_id: user.to_string() }
    }

    #[tokio::test]
    async fn likes_are_a_set_keyed_by_user() {
        let editor = editor_with_post().await;
        let parent = Filter::id("p1");

        let post: Post = editor.add(EmbeddedList::Likes, &parent, &like("a")).await.unwrap();
        assert_eq!(post.likes, vec![like("a")]);

        let err = editor
            .add::<Post, _>(EmbeddedList::Likes, &parent, &like("a"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.message(), "Post already liked");

        let post: Post = editor.add(EmbeddedList::Likes, &parent, &like("b")).await.unwrap();
        assert_eq!(post.likes, vec![like("b"), like("a")]);

        let post: Post = editor.remove(EmbeddedList::Likes, &parent, "a").await.unwrap();
        assert_eq!(post.likes, vec![like("b")]);

        let err = editor
            .remove::<Post>(EmbeddedList::Likes, &parent, "a")
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Post not liked yet");
    }

    #[tokio::test]
    async fn missing_parent_reports_parent_not_found() {
        let editor = editor_with_post().await;
        let err = editor
            .add::<Post, _>(EmbeddedList::Likes, &Filter::id("nope"), &like("a"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.message(), "Post not found");
    }

    #[test]
    fn lists_map_to_parent_and_key() {
        assert_eq!(EmbeddedList::Experience.collection(), Collection::Profiles);
        assert_eq!(EmbeddedList::Comments.collection(), Collection::Posts);
        assert_eq!(EmbeddedList::Comments.entry_key(), "id");
        assert_eq!(EmbeddedList::Likes.entry_key(), "user_id");
        assert_eq!(EmbeddedList::Education.unique_on(), None);
    }
}
