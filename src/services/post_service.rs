use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::ensure_owner;
use crate::database::models::{Comment, Like, Post, User};
use crate::database::{Filter, Repository};
use crate::error::{is_blank, validate, ApiError, FieldError};
use crate::state::AppState;

use super::embedded::{EmbeddedEditor, EmbeddedList};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostInput {
    pub text: Option<String>,
}

impl PostInput {
    fn text(self) -> Result<String, ApiError> {
        if is_blank(self.text.as_deref()) {
            validate(vec![FieldError::new("text", "Text is required")])?;
        }
        Ok(self.text.unwrap_or_default())
    }
}

/// Posts plus their likes and comments
pub struct PostService {
    posts: Repository<Post>,
    users: Repository<User>,
    editor: EmbeddedEditor,
}

impl PostService {
    pub fn new(state: &AppState) -> Self {
        Self {
            posts: state.posts(),
            users: state.users(),
            editor: EmbeddedEditor::new(state.store.clone()),
        }
    }

    async fn author(&self, user_id: &str) -> Result<User, ApiError> {
        Ok(self.users.select_404(user_id).await?)
    }

    pub async fn create(&self, user_id: &str, input: PostInput) -> Result<Post, ApiError> {
        let text = input.text()?;
        let author = self.author(user_id).await?;

        let post = Post {
            id: Uuid::new_v4().to_string(),
            user_id: author.id,
            text,
            name: author.name,
            avatar: author.avatar,
            date: Utc::now(),
            likes: Vec::new(),
            comments: Vec::new(),
        };
        let post = self.posts.insert(&post).await?;
        info!("User {} created post {}", user_id, post.id);
        Ok(post)
    }

    /// Newest first
    pub async fn list(&self) -> Result<Vec<Post>, ApiError> {
        let mut posts = self.posts.select_any(&Filter::all()).await?;
        posts.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(posts)
    }

    pub async fn get(&self, post_id: &str) -> Result<Post, ApiError> {
        Ok(self.posts.select_404(post_id).await?)
    }

    pub async fn delete(&self, user_id: &str, post_id: &str) -> Result<(), ApiError> {
        let post = self.get(post_id).await?;
        ensure_owner(user_id, &post)?;
        self.posts.delete(&post.id).await?;
        info!("User {} deleted post {}", user_id, post_id);
        Ok(())
    }

    pub async fn like(&self, user_id: &str, post_id: &str) -> Result<Vec<Like>, ApiError> {
        let like = Like {
            user_id: user_id.to_string(),
        };
        let post: Post = self.editor.add(EmbeddedList::Likes, &Filter::id(post_id), &like).await?;
        Ok(post.likes)
    }

    pub async fn unlike(&self, user_id: &str, post_id: &str) -> Result<Vec<Like>, ApiError> {
        let post: Post = self
            .editor
            .remove(EmbeddedList::Likes, &Filter::id(post_id), user_id)
            .await?;
        Ok(post.likes)
    }

    /// Prepend a comment; the updated post is returned
    pub async fn comment(&self, user_id: &str, post_id: &str, input: PostInput) -> Result<Post, ApiError> {
        let text = input.text()?;
        let author = self.author(user_id).await?;

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            user_id: author.id,
            text,
            name: author.name,
            avatar: author.avatar,
            date: Utc::now(),
        };
        self.editor.add(EmbeddedList::Comments, &Filter::id(post_id), &comment).await
    }

    /// Remove a comment written by the caller; the remaining comments are returned
    pub async fn uncomment(&self, user_id: &str, post_id: &str, comment_id: &str) -> Result<Vec<Comment>, ApiError> {
        let post = self.get(post_id).await?;
        let comment = post
            .comments
            .iter()
            .find(|c| c.id == comment_id)
            .ok_or_else(|| ApiError::not_found("Comment does not exist"))?;
        ensure_owner(user_id, comment)?;

        let post: Post = self
            .editor
            .remove(EmbeddedList::Comments, &Filter::id(post_id), &comment.id)
            .await?;
        Ok(post.comments)
    }
}
