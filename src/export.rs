use serde::Serialize;
use std::path::Path;

use crate::error::Result;
use crate::note::model::{CommentRecord, ExportRow, NotePost};

#[derive(Debug, Serialize)]
pub struct ExportDocument<'a> {
    pub post: &'a NotePost,
    pub comments: Vec<ExportRow>,
}

/// Flatten the comment trees into rows. Ids are assigned sequentially in
/// display order and threaded explicitly; a reply row points at its
/// parent's id.
pub fn flatten_rows(records: &[CommentRecord]) -> Vec<ExportRow> {
    let mut rows = Vec::new();
    let mut next_id = 1usize;
    for record in records {
        let parent_id = next_id;
        next_id += 1;
        rows.push(row(record, parent_id, None));
        for reply in &record.replies {
            rows.push(row(reply, next_id, Some(parent_id)));
            next_id += 1;
        }
    }
    rows
}

fn row(record: &CommentRecord, id: usize, parent_id: Option<usize>) -> ExportRow {
    ExportRow {
        id,
        parent_id,
        author: record.author.clone(),
        content: record.content.clone(),
        like_count: record.like_count,
        timestamp: record.timestamp.clone(),
    }
}

pub fn write_json(path: &Path, post: &NotePost, records: &[CommentRecord]) -> Result<()> {
    let document = ExportDocument {
        post,
        comments: flatten_rows(records),
    };
    std::fs::write(path, serde_json::to_string_pretty(&document)?)?;
    Ok(())
}
