pub mod link;
pub mod model;
pub mod snapshot;
pub mod timefmt;

pub use model::{CommentRecord, ExportRow, NotePost};
