use chrono::{Datelike, Duration, Months, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

const EDITED_PREFIX: &str = "编辑于";

fn relative_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*(天|个月|月|年|小时|分钟)前").unwrap())
}

fn short_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})-(\d{1,2})$").unwrap())
}

fn full_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap())
}

/// Normalize a locale time phrase into `YYYY-MM-DD`, relative to `today`.
///
/// Rules are tried in priority order; anything unrecognized comes back
/// verbatim rather than erroring, so "置顶" or other badge text survives
/// into the output untouched. Sub-day phrases (小时/分钟) collapse to
/// today's date. A leading "编辑于" qualifier is stripped first, whether it
/// arrives as its own token or fused onto the phrase.
pub fn normalize_time(raw: &str, today: NaiveDate) -> String {
    let original = raw.trim();
    let phrase = original
        .strip_prefix(EDITED_PREFIX)
        .map(str::trim)
        .unwrap_or(original);

    if phrase.contains("今天") {
        return fmt(today);
    }
    if phrase.contains("昨天") {
        return fmt(today - Duration::days(1));
    }

    if let Some(caps) = relative_re().captures(phrase) {
        let n: u32 = match caps[1].parse() {
            Ok(n) => n,
            Err(_) => return original.to_string(),
        };
        let date = match &caps[2] {
            "天" => today.checked_sub_signed(Duration::days(n as i64)),
            "个月" | "月" => today.checked_sub_months(Months::new(n)),
            "年" => n
                .checked_mul(12)
                .and_then(|months| today.checked_sub_months(Months::new(months))),
            // 小时/分钟 ago is still today at day precision
            _ => Some(today),
        };
        // An offset that leaves the calendar is as unparsable as bad digits.
        return match date {
            Some(date) => fmt(date),
            None => original.to_string(),
        };
    }

    if let Some(caps) = short_date_re().captures(phrase) {
        return format!(
            "{}-{:02}-{:02}",
            today.year(),
            caps[1].parse::<u32>().unwrap_or(1),
            caps[2].parse::<u32>().unwrap_or(1)
        );
    }

    if let Some(caps) = full_date_re().captures(phrase) {
        return format!(
            "{}-{:02}-{:02}",
            &caps[1],
            caps[2].parse::<u32>().unwrap_or(1),
            caps[3].parse::<u32>().unwrap_or(1)
        );
    }

    original.to_string()
}

fn fmt(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
