use serde::{Deserialize, Serialize};

/// One comment as captured from the rendered page. Replies are exactly one
/// level deep; a reply never carries replies of its own.
///
/// The site exposes no stable comment id, so identity for dedup purposes is
/// the (author, content, timestamp) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub author: String,
    pub content: String,
    pub like_count: u32,
    pub timestamp: String,
    pub replies: Vec<CommentRecord>,
}

impl CommentRecord {
    pub fn identity(&self) -> (String, String, String) {
        (
            self.author.clone(),
            self.content.clone(),
            self.timestamp.clone(),
        )
    }
}

/// The note (post) the comments hang off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotePost {
    pub title: String,
    pub author: String,
    pub content: String,
    pub publish_date: String,
    pub like_count: u32,
}

/// Flattened row handed to the tabular writer. Replies reference their
/// parent comment's row id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRow {
    pub id: usize,
    pub parent_id: Option<usize>,
    pub author: String,
    pub content: String,
    pub like_count: u32,
    pub timestamp: String,
}
