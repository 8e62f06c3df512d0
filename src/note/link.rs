use crate::error::{AppError, Result};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

// Share sheets wrap the link in promo text, so these match anywhere in the
// input rather than anchoring to it. Ordered: the canonical note URL wins
// over the short redirect link when both appear.
const NOTE_URL_PATTERNS: &[&str] = &[
    r"https?://www\.xiaohongshu\.com/(?:explore|discovery/item)/[0-9a-zA-Z]+[^\s,，!！]*",
    r"https?://xhslink\.com/[0-9a-zA-Z/.]+",
];

fn note_url_res() -> &'static Vec<Regex> {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        NOTE_URL_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

/// Pull a note URL out of pasted share text (or a bare URL).
pub fn extract_note_url(input: &str) -> Result<String> {
    for re in note_url_res() {
        if let Some(m) = re.find(input) {
            let parsed = Url::parse(m.as_str())
                .map_err(|e| AppError::InvalidInput(format!("malformed note url: {}", e)))?;
            return Ok(parsed.into());
        }
    }
    Err(AppError::InvalidInput(format!(
        "no recognizable note link in input: {}",
        input
    )))
}
