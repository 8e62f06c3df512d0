use chrono::{Local, NaiveDate};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::surface::{CommentSurface, RevealOutcome};
use crate::browser::BrowserSession;
use crate::config::ScrapeConfig;
use crate::error::Result;
use crate::note::model::{CommentRecord, NotePost};
use crate::note::snapshot::{
    build_post, build_snapshot, collect_comments_script, post_script, RawBlock, RawPost,
};

/// The comment area must show up within the structural timeout or the whole
/// retrieval is aborted.
const COMMENT_SURFACE_SELECTOR: &str = ".comments-container, .comments-el";

/// Count-label probes, tried in order; the first label with digits wins.
const TARGET_SELECTORS: &[&str] = &[
    ".comments-container .total",
    ".comments-el .total",
    ".comments-container .comments-total",
];

/// Containers that may host the virtualized comment list. A candidate must
/// also have overflow scroll|auto and scrollHeight > clientHeight.
const SCROLL_CONTAINER_SELECTORS: &[&str] = &[
    ".note-scroller",
    ".comments-container",
    ".interaction-container",
    ".note-container",
];

/// In-page cues that nothing further will load.
const END_MARKERS: &[&str] = &["THE END", "到底了", "没有更多"];

/// Keyword set matching not-yet-expanded "show more / N条回复" controls.
const EXPAND_KEYWORDS: &[&str] = &["展开", "条回复", "更多回复", "更多评论"];

const EXPAND_SWEEP_JS: &str = r#"() => {
    const keywords = __KEYWORDS__;
    const candidates = document.querySelectorAll(
        '.show-more, .reply-more, .more-reply, .comment-item .expand'
    );
    for (const el of candidates) {
        if (el.dataset.xhsExpanded) continue;
        const text = (el.textContent || '').trim();
        if (!keywords.some((k) => text.includes(k))) continue;
        el.dataset.xhsExpanded = '1';
        el.click();
        return true;
    }
    return false;
}"#;

const SCROLL_STEP_JS: &str = r#"() => {
    const selectors = __SELECTORS__;
    const findScrollable = () => {
        for (const sel of selectors) {
            for (const el of document.querySelectorAll(sel)) {
                const style = getComputedStyle(el);
                const overflow = style.overflowY + ' ' + style.overflow;
                if ((overflow.includes('scroll') || overflow.includes('auto'))
                    && el.scrollHeight > el.clientHeight) {
                    return el;
                }
            }
        }
        return null;
    };
    const el = findScrollable();
    if (!el) return { status: 'none' };
    const markers = __MARKERS__;
    const text = el.innerText || '';
    for (const m of markers) {
        if (text.includes(m)) return { status: 'end', reason: m };
    }
    const before = el.scrollTop;
    el.scrollTop = before + __STEP__;
    return { status: 'scrolled', before: before };
}"#;

const READ_OFFSET_JS: &str = r#"() => {
    const selectors = __SELECTORS__;
    for (const sel of selectors) {
        for (const el of document.querySelectorAll(sel)) {
            const style = getComputedStyle(el);
            const overflow = style.overflowY + ' ' + style.overflow;
            if ((overflow.includes('scroll') || overflow.includes('auto'))
                && el.scrollHeight > el.clientHeight) {
                return {
                    after: el.scrollTop,
                    remaining: el.scrollHeight - el.clientHeight - el.scrollTop,
                };
            }
        }
    }
    return null;
}"#;

const PROBE_TARGET_JS: &str = r#"() => {
    const selectors = __SELECTORS__;
    for (const sel of selectors) {
        const el = document.querySelector(sel);
        if (el && el.textContent) {
            const digits = el.textContent.replace(/[^0-9]/g, '');
            if (digits) return { total: parseInt(digits, 10), source: 'label' };
        }
    }
    return {
        total: document.querySelectorAll('.comment-item:not(.comment-item-sub)').length,
        source: 'rendered',
    };
}"#;

#[derive(Debug, Deserialize)]
struct TargetProbe {
    total: usize,
    source: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum ScrollProbe {
    None,
    End { reason: String },
    Scrolled { before: f64 },
}

#[derive(Debug, Deserialize)]
struct OffsetProbe {
    after: f64,
    remaining: f64,
}

/// A note page with its comment list located, ready to be driven by the
/// collection loop.
pub struct NotePage<'a> {
    session: &'a BrowserSession,
    config: &'a ScrapeConfig,
    today: NaiveDate,
}

impl<'a> NotePage<'a> {
    /// Navigate to the note and wait for the comment surface. A missing
    /// surface within the timeout is fatal.
    pub async fn open(
        session: &'a BrowserSession,
        config: &'a ScrapeConfig,
        url: &str,
    ) -> Result<NotePage<'a>> {
        session.navigate(url).await?;
        session
            .wait_for_selector(COMMENT_SURFACE_SELECTOR, config.structural_wait_secs)
            .await?;
        Ok(Self {
            session,
            config,
            today: Local::now().date_naive(),
        })
    }

    pub async fn read_post(&self) -> Result<NotePost> {
        let value = self.session.evaluate(&post_script()).await?;
        let raw: RawPost = serde_json::from_value(value)?;
        Ok(build_post(raw, self.today))
    }

    async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;
    }

    /// Activate "show more replies" controls one at a time until none are
    /// left. Each control is marked before the click, so a control that
    /// refuses to disappear can never loop the sweep.
    async fn expand_replies(&self) -> Result<()> {
        let script = EXPAND_SWEEP_JS.replace("__KEYWORDS__", &serde_json::to_string(EXPAND_KEYWORDS)?);
        loop {
            match self.session.evaluate(&script).await {
                Ok(value) => {
                    if !value.as_bool().unwrap_or(false) {
                        return Ok(());
                    }
                    debug!("expanded one reply control");
                }
                Err(e) => {
                    // A control vanishing mid-sweep is loading churn, not a
                    // reason to abort the retrieval.
                    warn!(error = %e, "reply-expansion sweep interrupted");
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(self.config.sweep_pause_ms)).await;
        }
    }

    async fn scroll_once(&self) -> Result<RevealOutcome> {
        let selectors = serde_json::to_string(SCROLL_CONTAINER_SELECTORS)?;
        let step_script = SCROLL_STEP_JS
            .replace("__SELECTORS__", &selectors)
            .replace("__MARKERS__", &serde_json::to_string(END_MARKERS)?)
            .replace("__STEP__", &self.config.scroll_step.to_string());

        let probe = match self.session.evaluate(&step_script).await {
            Ok(value) => serde_json::from_value::<ScrollProbe>(value)?,
            Err(e) => return Ok(RevealOutcome::ScrollError(e.to_string())),
        };

        let before = match probe {
            ScrollProbe::None => return Ok(RevealOutcome::NoScrollableRegion),
            ScrollProbe::End { reason } => return Ok(RevealOutcome::ReachedEnd(reason)),
            ScrollProbe::Scrolled { before } => before,
        };

        self.settle().await;

        let read_script = READ_OFFSET_JS.replace("__SELECTORS__", &selectors);
        match self.session.evaluate(&read_script).await {
            Ok(serde_json::Value::Null) => Ok(RevealOutcome::ScrollError(
                "scroll container vanished after step".to_string(),
            )),
            Ok(value) => {
                let offset: OffsetProbe = serde_json::from_value(value)?;
                Ok(RevealOutcome::Scrolled {
                    before,
                    after: offset.after,
                    remaining: offset.remaining,
                })
            }
            Err(e) => Ok(RevealOutcome::ScrollError(e.to_string())),
        }
    }
}

impl CommentSurface for NotePage<'_> {
    async fn probe_target(&mut self) -> Result<usize> {
        let script = PROBE_TARGET_JS.replace("__SELECTORS__", &serde_json::to_string(TARGET_SELECTORS)?);
        let value = self.session.evaluate(&script).await?;
        let probe: TargetProbe = serde_json::from_value(value)?;
        if probe.total == 0 && probe.source == "rendered" {
            // Every count label missed and nothing is rendered; this reads
            // as "no comments", which is also what total markup drift would
            // look like.
            warn!("comment count probe fell through to rendered nodes and found none");
        }
        debug!(total = probe.total, source = %probe.source, "probed comment target");
        Ok(probe.total)
    }

    async fn snapshot(&mut self) -> Result<Vec<CommentRecord>> {
        let value = self.session.evaluate(&collect_comments_script()).await?;
        let blocks: Vec<RawBlock> = serde_json::from_value(value)?;
        Ok(build_snapshot(blocks, self.today))
    }

    async fn reveal(&mut self) -> Result<RevealOutcome> {
        self.expand_replies().await?;
        self.settle().await;
        let outcome = self.scroll_once().await?;
        // Late controls can materialize with the newly scrolled content.
        self.expand_replies().await?;
        Ok(outcome)
    }
}
