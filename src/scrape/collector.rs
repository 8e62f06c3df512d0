use tracing::{debug, info, warn};

use super::merge::CollectionState;
use super::surface::{CommentSurface, RevealOutcome};
use crate::config::ScrapeConfig;
use crate::error::Result;
use crate::note::model::CommentRecord;

/// Drive the poll/reveal loop until the target count is reached, the feed
/// ends, or progress stops. Under-target exits are normal partial results;
/// only extraction failures abort the run.
pub async fn collect_comments<S: CommentSurface>(
    surface: &mut S,
    config: &ScrapeConfig,
) -> Result<Vec<CommentRecord>> {
    let target = surface.probe_target().await?;
    if target == 0 {
        info!("comment counter reports zero, nothing to collect");
        return Ok(Vec::new());
    }
    info!(target, "collecting comments");

    let mut state = CollectionState::new(target);

    for iteration in 0..config.max_iterations {
        let snapshot = surface.snapshot().await?;
        let rendered = snapshot.len();
        let before = state.total();
        state.merge(snapshot);
        let total = state.total();
        debug!(iteration, rendered, total, target, "merged snapshot");

        if state.reached_target() {
            info!(total, target, "target reached");
            return Ok(state.into_records());
        }
        if rendered == 0 && iteration > 0 {
            warn!(total, target, "no rendered comment nodes after reveal, treating as end");
            break;
        }

        match surface.reveal().await? {
            RevealOutcome::ReachedEnd(reason) => {
                debug!(%reason, "terminal marker found");
                // One last read picks up whatever the final reveal
                // materialized alongside the marker.
                let snapshot = surface.snapshot().await?;
                state.merge(snapshot);
                break;
            }
            RevealOutcome::NoScrollableRegion => {
                debug!("no scrollable region, list is fully rendered");
                break;
            }
            outcome @ RevealOutcome::Scrolled { .. } => {
                let advanced = outcome.advanced();
                if let RevealOutcome::Scrolled {
                    before: offset_before,
                    after,
                    remaining,
                } = outcome
                {
                    debug!(offset_before, after, remaining, "scrolled");
                }
                if advanced || total > before {
                    state.reset_stalls();
                } else if state.bump_stalls() >= config.max_stalls {
                    warn!(total, target, "reveal made no progress, giving up");
                    break;
                }
            }
            RevealOutcome::ScrollError(detail) => {
                // The act target vanished between probe and act; count it
                // against the stall budget instead of aborting.
                warn!(%detail, "scroll step failed");
                if total > before {
                    state.reset_stalls();
                } else if state.bump_stalls() >= config.max_stalls {
                    warn!(total, target, "repeated scroll failures, giving up");
                    break;
                }
            }
        }
    }

    let total = state.total();
    if total < state.target() {
        info!(
            total,
            target = state.target(),
            "collection finished under target (partial completion)"
        );
    }
    Ok(state.into_records())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::collections::VecDeque;

    fn comment(author: &str, content: &str) -> CommentRecord {
        CommentRecord {
            author: author.to_string(),
            content: content.to_string(),
            like_count: 0,
            timestamp: "2024-05-10".to_string(),
            replies: Vec::new(),
        }
    }

    fn quick_config() -> ScrapeConfig {
        ScrapeConfig {
            headless: true,
            structural_wait_secs: 30,
            settle_ms: 0,
            sweep_pause_ms: 0,
            scroll_step: 500,
            max_iterations: 50,
            max_stalls: 3,
            profile_dir: None,
        }
    }

    /// Replays canned snapshots and reveal outcomes; the last entry of each
    /// queue repeats once the queue drains.
    struct ScriptedSurface {
        target: usize,
        snapshots: VecDeque<Vec<CommentRecord>>,
        reveals: VecDeque<RevealOutcome>,
        polls: usize,
        reveal_calls: usize,
        fail_snapshot: bool,
    }

    impl ScriptedSurface {
        fn new(
            target: usize,
            snapshots: Vec<Vec<CommentRecord>>,
            reveals: Vec<RevealOutcome>,
        ) -> Self {
            Self {
                target,
                snapshots: snapshots.into(),
                reveals: reveals.into(),
                polls: 0,
                reveal_calls: 0,
                fail_snapshot: false,
            }
        }
    }

    impl CommentSurface for ScriptedSurface {
        async fn probe_target(&mut self) -> Result<usize> {
            Ok(self.target)
        }

        async fn snapshot(&mut self) -> Result<Vec<CommentRecord>> {
            if self.fail_snapshot {
                return Err(AppError::Browser("evaluate failed".to_string()));
            }
            self.polls += 1;
            Ok(match self.snapshots.len() {
                0 => Vec::new(),
                1 => self.snapshots[0].clone(),
                _ => self.snapshots.pop_front().unwrap(),
            })
        }

        async fn reveal(&mut self) -> Result<RevealOutcome> {
            self.reveal_calls += 1;
            Ok(match self.reveals.len() {
                0 => RevealOutcome::NoScrollableRegion,
                1 => self.reveals[0].clone(),
                _ => self.reveals.pop_front().unwrap(),
            })
        }
    }

    fn scrolled(by: f64) -> RevealOutcome {
        RevealOutcome::Scrolled {
            before: 0.0,
            after: by,
            remaining: 1000.0,
        }
    }

    #[tokio::test]
    async fn test_stops_when_target_reached_without_revealing() {
        let mut surface = ScriptedSurface::new(
            2,
            vec![vec![comment("a", "一"), comment("b", "二")]],
            vec![scrolled(500.0)],
        );
        let records = collect_comments(&mut surface, &quick_config()).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(surface.reveal_calls, 0);
    }

    #[tokio::test]
    async fn test_zero_target_short_circuits() {
        let mut surface = ScriptedSurface::new(0, vec![vec![comment("a", "一")]], vec![]);
        let records = collect_comments(&mut surface, &quick_config()).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(surface.polls, 0);
    }

    #[tokio::test]
    async fn test_terminates_within_k_plus_one_polls() {
        // Driver reports ReachedEnd on the 4th reveal; the orchestrator must
        // finish within 5 polling iterations regardless of snapshot content.
        let k: usize = 4;
        let reveals: Vec<RevealOutcome> = (1..k)
            .map(|i| scrolled(i as f64 * 500.0))
            .chain(std::iter::once(RevealOutcome::ReachedEnd(
                "THE END".to_string(),
            )))
            .collect();
        let mut surface =
            ScriptedSurface::new(100, vec![vec![comment("a", "一")]], reveals);
        let records = collect_comments(&mut surface, &quick_config()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(surface.polls <= k + 1, "polled {} times", surface.polls);
    }

    #[tokio::test]
    async fn test_partial_completion_is_not_an_error() {
        // Target says 50 but only 30 comments exist; the feed then ends.
        let available: Vec<CommentRecord> = (0..30)
            .map(|i| comment(&format!("u{}", i), &format!("内容{}", i)))
            .collect();
        let mut surface = ScriptedSurface::new(
            50,
            vec![available[..10].to_vec(), available[..20].to_vec(), available],
            vec![
                scrolled(500.0),
                scrolled(1000.0),
                RevealOutcome::ReachedEnd("到底了".to_string()),
            ],
        );
        let records = collect_comments(&mut surface, &quick_config()).await.unwrap();
        assert_eq!(records.len(), 30);
    }

    #[tokio::test]
    async fn test_no_scrollable_region_ends_collection() {
        let mut surface = ScriptedSurface::new(
            10,
            vec![vec![comment("a", "一")]],
            vec![RevealOutcome::NoScrollableRegion],
        );
        let records = collect_comments(&mut surface, &quick_config()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(surface.reveal_calls, 1);
    }

    #[tokio::test]
    async fn test_stall_guard_trips_on_unmoving_scroll() {
        let stuck = RevealOutcome::Scrolled {
            before: 900.0,
            after: 900.0,
            remaining: 0.0,
        };
        let mut surface =
            ScriptedSurface::new(10, vec![vec![comment("a", "一")]], vec![stuck]);
        let records = collect_comments(&mut surface, &quick_config()).await.unwrap();
        assert_eq!(records.len(), 1);
        // First reveal follows a productive merge; the stall budget counts
        // the ones after it.
        assert_eq!(surface.reveal_calls, 1 + quick_config().max_stalls);
    }

    #[tokio::test]
    async fn test_scroll_errors_absorbed_until_stall_budget() {
        let mut surface = ScriptedSurface::new(
            10,
            vec![vec![comment("a", "一")]],
            vec![RevealOutcome::ScrollError("node detached".to_string())],
        );
        let records = collect_comments(&mut surface, &quick_config()).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_snapshot_after_reveal_ends_collection() {
        // The list renders once, then every later poll comes back empty
        // while the driver keeps reporting movement: treated as the end,
        // not an excuse to keep scrolling.
        let mut surface = ScriptedSurface::new(
            10,
            vec![vec![comment("a", "一")], Vec::new()],
            (1..50).map(|i| scrolled(i as f64 * 500.0)).collect(),
        );
        let records = collect_comments(&mut surface, &quick_config()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(surface.polls, 2);
    }

    #[tokio::test]
    async fn test_progress_clears_earlier_scroll_failures() {
        // A failure, then a productive iteration, then failures again: the
        // stall budget restarts after the recovery instead of carrying the
        // early failure forward.
        let mut surface = ScriptedSurface::new(
            10,
            vec![
                vec![comment("a", "一")],
                vec![comment("a", "一")],
                vec![comment("a", "一"), comment("b", "二")],
            ],
            vec![RevealOutcome::ScrollError("node detached".to_string())],
        );
        let records = collect_comments(&mut surface, &quick_config()).await.unwrap();
        assert_eq!(records.len(), 2);
        // polls: productive, stall #1, recovery, then a fresh stall budget
        // of three before giving up.
        assert_eq!(surface.polls, 6);
    }

    #[tokio::test]
    async fn test_snapshot_failure_is_fatal() {
        let mut surface = ScriptedSurface::new(10, vec![vec![comment("a", "一")]], vec![]);
        surface.fail_snapshot = true;
        let result = collect_comments(&mut surface, &quick_config()).await;
        assert!(matches!(result, Err(AppError::Browser(_))));
    }

    #[tokio::test]
    async fn test_iteration_ceiling_bounds_the_loop() {
        // Endless movement, never any new content past the first snapshot:
        // progress keeps resetting the stall counter, so only the ceiling
        // stops the loop.
        let mut config = quick_config();
        config.max_iterations = 7;
        let reveals: Vec<RevealOutcome> =
            (1..1000).map(|i| scrolled(i as f64)).collect();
        let mut surface =
            ScriptedSurface::new(100, vec![vec![comment("a", "一")]], reveals);
        let records = collect_comments(&mut surface, &config).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(surface.polls, 7);
    }
}
