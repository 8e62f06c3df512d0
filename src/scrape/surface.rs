use crate::error::Result;
use crate::note::model::CommentRecord;

/// Result of one reveal attempt against the comment list.
#[derive(Debug, Clone, PartialEq)]
pub enum RevealOutcome {
    /// A terminal marker was found; nothing further will load.
    ReachedEnd(String),
    /// The scroll offset was advanced. `after == before` means the step
    /// failed to move, which is a progress signal, not an error.
    Scrolled {
        before: f64,
        after: f64,
        remaining: f64,
    },
    /// No scrollable container hosts the list; everything is already
    /// rendered. Treated like reaching the end.
    NoScrollableRegion,
    /// The step itself failed (target vanished mid-act, evaluate error).
    /// Absorbed as a no-progress signal by the orchestrator.
    ScrollError(String),
}

impl RevealOutcome {
    pub fn advanced(&self) -> bool {
        matches!(self, RevealOutcome::Scrolled { before, after, .. } if after > before)
    }
}

/// What the collection loop needs from a rendered comment list. The live
/// implementation drives a Chrome page; tests drive a scripted fake.
#[allow(async_fn_in_trait)]
pub trait CommentSurface {
    /// Fetch the expected leaf-plus-reply total once, before the loop.
    /// Zero is a valid "no comments" answer.
    async fn probe_target(&mut self) -> Result<usize>;

    /// Read every currently-materialized comment block. Fatal on failure.
    async fn snapshot(&mut self) -> Result<Vec<CommentRecord>>;

    /// Expand pending replies and advance the list by one scroll step.
    async fn reveal(&mut self) -> Result<RevealOutcome>;
}
