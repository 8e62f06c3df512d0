pub mod collector;
pub mod merge;
pub mod page;
pub mod surface;

pub use collector::collect_comments;
pub use page::NotePage;
pub use surface::{CommentSurface, RevealOutcome};
