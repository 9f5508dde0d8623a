use serde::{Deserialize, Serialize};

use crate::store::{comments::Comment, posts::Post};

const MAX_TITLE: usize = 100;
const MAX_CONTENT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct CreatePostPayload {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreatePostPayload {
    pub fn validate(&self) -> Result<(), String> {
        check_title(&self.title)?;
        check_content(&self.content)
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostPayload {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl UpdatePostPayload {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        if let Some(content) = &self.content {
            check_content(content)?;
        }
        Ok(())
    }

    pub fn apply(self, post: &mut Post) {
        if let Some(title) = self.title {
            post.title = title;
        }
        if let Some(content) = self.content {
            post.content = content;
        }
        if let Some(tags) = self.tags {
            post.tags = tags;
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentPayload {
    pub user_id: i64,
    pub content: String,
}

impl CreateCommentPayload {
    pub fn validate(&self) -> Result<(), String> {
        check_content(&self.content)
    }
}

#[derive(Debug, Serialize)]
pub struct PostWithComments {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<Comment>,
}

fn check_title(title: &str) -> Result<(), String> {
    let len = title.trim().chars().count();
    if len == 0 || len > MAX_TITLE {
        return Err(format!("title must be between 1 and {MAX_TITLE} characters"));
    }
    Ok(())
}

fn check_content(content: &str) -> Result<(), String> {
    let len = content.trim().chars().count();
    if len == 0 || len > MAX_CONTENT {
        return Err(format!("content must be between 1 and {MAX_CONTENT} characters"));
    }
    Ok(())
}
