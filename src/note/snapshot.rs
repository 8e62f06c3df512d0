use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::model::{CommentRecord, NotePost};
use super::timefmt::normalize_time;

/// Content given to a comment that carries no text at all but at least one
/// image/emoji asset. Such comments are valid, not discarded.
pub const IMAGE_ONLY_SENTINEL: &str = "[图片]";

/// One piece of a comment's content as serialized by the in-page script:
/// either a run of text or an inline asset reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Text,
    Emoji,
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSegment {
    pub kind: SegmentKind,
    pub value: String,
}

/// A comment block exactly as the collection script sees it in the DOM.
/// Everything is optional on the wire; half-rendered or deleted blocks come
/// through with empty fields and are filtered out in [`build_snapshot`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawBlock {
    pub author: String,
    pub time_label: String,
    pub like_label: String,
    pub segments: Vec<RawSegment>,
    pub replies: Vec<RawBlock>,
}

/// The note body as serialized by the post script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPost {
    pub title: String,
    pub author: String,
    pub date_label: String,
    pub like_label: String,
    pub segments: Vec<RawSegment>,
}

// Shared in-page walker: collects text runs and inline assets in document
// order, descending into wrapper elements but never into <a> children.
const SEGMENT_WALKER_JS: &str = r#"
    const collectSegments = (root) => {
        const out = [];
        if (!root) return out;
        const walk = (node) => {
            for (const child of node.childNodes) {
                if (child.nodeType === Node.TEXT_NODE) {
                    if (child.textContent) out.push({ kind: 'text', value: child.textContent });
                } else if (child.nodeType === Node.ELEMENT_NODE) {
                    const tag = child.tagName.toLowerCase();
                    if (tag === 'img') {
                        const kind = (child.className || '').includes('emoji') ? 'emoji' : 'image';
                        out.push({ kind: kind, value: child.src || child.getAttribute('src') || '' });
                    } else if (tag !== 'a') {
                        walk(child);
                    }
                }
            }
        };
        walk(root);
        return out;
    };
"#;

// Serializes every currently-rendered comment block. A block is one
// visually-grouped thread: exactly one primary comment node plus its
// rendered reply nodes. Selector chains are tried in order because the site
// ships several markup generations at once.
const COLLECT_COMMENTS_JS_TEMPLATE: &str = r#"() => {
    __WALKER__
    const firstText = (root, selectors) => {
        for (const sel of selectors) {
            const el = root.querySelector(sel);
            if (el && el.textContent) return el.textContent.trim();
        }
        return '';
    };
    const parseItem = (item) => ({
        author: firstText(item, ['.author-wrapper .name', '.author .name', '.name']),
        timeLabel: firstText(item, ['.info .date', '.date', '.time']),
        likeLabel: firstText(item, ['.like-wrapper .count', '.like .count', '.count']),
        segments: collectSegments(item.querySelector('.content .note-text') || item.querySelector('.content')),
        replies: [],
    });
    const blocks = [];
    for (const parent of document.querySelectorAll('.comments-container .parent-comment, .parent-comment')) {
        const primary = parent.querySelector('.comment-item:not(.comment-item-sub)');
        if (!primary) continue;
        const block = parseItem(primary);
        block.replies = Array.from(
            parent.querySelectorAll('.reply-container .comment-item-sub, .comment-item-sub')
        ).map(parseItem);
        blocks.push(block);
    }
    return blocks;
}"#;

const POST_JS_TEMPLATE: &str = r#"() => {
    __WALKER__
    const firstText = (selectors) => {
        for (const sel of selectors) {
            const el = document.querySelector(sel);
            if (el && el.textContent) return el.textContent.trim();
        }
        return '';
    };
    return {
        title: firstText(['#detail-title', '.note-content .title', '.title']),
        author: firstText(['.author-container .username', '.info .name', '.username']),
        dateLabel: firstText(['.bottom-container .date', '.note-content .date', '.date']),
        likeLabel: firstText(['.engage-bar .like-wrapper .count', '.like-wrapper .count']),
        segments: collectSegments(
            document.querySelector('#detail-desc') || document.querySelector('.note-content .desc')
        ),
    };
}"#;

pub fn collect_comments_script() -> String {
    COLLECT_COMMENTS_JS_TEMPLATE.replace("__WALKER__", SEGMENT_WALKER_JS)
}

pub fn post_script() -> String {
    POST_JS_TEMPLATE.replace("__WALKER__", SEGMENT_WALKER_JS)
}

/// Turn one serialized DOM pass into comment records. Pure; the browser
/// never leaks past `RawBlock`, so this is testable with handmade blocks.
pub fn build_snapshot(blocks: Vec<RawBlock>, today: NaiveDate) -> Vec<CommentRecord> {
    blocks
        .into_iter()
        .filter_map(|block| build_record(block, today, true))
        .collect()
}

pub fn build_post(raw: RawPost, today: NaiveDate) -> NotePost {
    NotePost {
        title: raw.title.trim().to_string(),
        author: raw.author.trim().to_string(),
        // Post body is a text-only walk; asset markers are a comment thing.
        content: raw
            .segments
            .iter()
            .filter_map(|seg| match seg.kind {
                SegmentKind::Text => Some(seg.value.as_str()),
                _ => None,
            })
            .collect::<String>()
            .trim()
            .to_string(),
        publish_date: normalize_time(&raw.date_label, today),
        like_count: parse_like_count(&raw.like_label),
    }
}

fn build_record(block: RawBlock, today: NaiveDate, with_replies: bool) -> Option<CommentRecord> {
    let author = block.author.trim().to_string();
    let content = render_content(&block.segments);
    // Deleted/loading placeholders surface as empty author or content; they
    // are filtered, not errors.
    if author.is_empty() || content.is_empty() {
        return None;
    }
    let replies = if with_replies {
        block
            .replies
            .into_iter()
            .filter_map(|reply| build_record(reply, today, false))
            .collect()
    } else {
        // Replies are depth exactly 1.
        Vec::new()
    };
    Some(CommentRecord {
        author,
        content,
        like_count: parse_like_count(&block.like_label),
        timestamp: normalize_time(&block.time_label, today),
        replies,
    })
}

fn render_content(segments: &[RawSegment]) -> String {
    let mut text = String::new();
    let mut markers = String::new();
    for seg in segments {
        match seg.kind {
            SegmentKind::Text => text.push_str(&seg.value),
            SegmentKind::Emoji => markers.push_str(&format!("[emoji:{}]", seg.value.trim())),
            SegmentKind::Image => markers.push_str(&format!("[image:{}]", seg.value.trim())),
        }
    }
    let text = text.trim();
    if text.is_empty() {
        if markers.is_empty() {
            String::new()
        } else {
            IMAGE_ONLY_SENTINEL.to_string()
        }
    } else {
        format!("{}{}", text, markers)
    }
}

pub fn parse_like_count(label: &str) -> u32 {
    let digits: String = label.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}
