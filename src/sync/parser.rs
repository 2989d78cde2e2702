/*!
 * Calendar Page Parser (C6, §4.6 "Parsing")
 *
 * Extracts `(date, title)` pairs from a provider's calendar page: one pass
 * over plain text lines and anchor text, one pass over structured
 * candidates (tables/lists/divs whose class suggests a calendar), both
 * driven by the same date-pattern and title-cleanup rules.
 */

use std::collections::HashMap;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::info;

use crate::model::ParsedProviderEvent;

const MAX_TITLE_LEN: usize = 100;
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

const NAV_LABELS: &[&str] = &["previous", "next", "view", "more", "details", "click", "here"];
const WEEKDAY_NAMES: &[&str] = &[
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

static MONTH_DAY_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([A-Za-z]+)\s+(\d{1,2}),?\s+(\d{4})\b").unwrap()
});
static SLASH_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap());
static DASH_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})-(\d{1,2})-(\d{4})\b").unwrap());
static MONTH_DAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b([A-Za-z]+)\s+(\d{1,2})\b").unwrap());
static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[^\w\s\-'".,!?()]"#).unwrap());
static LEADING_TRAILING_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-:\s]+|[-:\s]+$").unwrap());

fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    const MONTHS: &[&str] = &[
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ];
    MONTHS.iter().position(|m| m.starts_with(&lower) && lower.len() >= 3).map(|i| i as u32 + 1)
}

/// Tries each of four recognized date shapes against a line, returning the
/// first match's date plus the matched span so the caller can strip it out
/// of the title.
fn find_date(line: &str, current_year: i32) -> Option<(NaiveDate, std::ops::Range<usize>)> {
    if let Some(caps) = MONTH_DAY_YEAR.captures(line) {
        let whole = caps.get(0).unwrap();
        let month = month_from_name(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some((date, whole.range()));
        }
    }
    if let Some(caps) = SLASH_DATE.captures(line) {
        let whole = caps.get(0).unwrap();
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some((date, whole.range()));
        }
    }
    if let Some(caps) = DASH_DATE.captures(line) {
        let whole = caps.get(0).unwrap();
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some((date, whole.range()));
        }
    }
    if let Some(caps) = MONTH_DAY.captures(line) {
        let whole = caps.get(0).unwrap();
        let month = month_from_name(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(current_year, month, day) {
            return Some((date, whole.range()));
        }
    }
    None
}

/// Strips the matched date out of the line and cleans up the remainder
/// into a candidate title, truncated to a 100-character cap.
fn extract_title(line: &str, date_span: std::ops::Range<usize>) -> String {
    let mut remainder = String::with_capacity(line.len());
    remainder.push_str(&line[..date_span.start]);
    remainder.push_str(&line[date_span.end..]);

    let cleaned = PUNCTUATION.replace_all(&remainder, " ");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = LEADING_TRAILING_PUNCT.replace_all(&collapsed, "").trim().to_string();

    if trimmed.chars().count() > MAX_TITLE_LEN {
        trimmed.chars().take(MAX_TITLE_LEN).collect()
    } else {
        trimmed
    }
}

/// Rejects titles that are empty, a bare weekday name, a navigation label,
/// purely numeric, or too short to contain a real word (fewer than one
/// three-letter run).
fn is_plausible_title(title: &str) -> bool {
    if title.is_empty() {
        return false;
    }
    let lower = title.to_lowercase();
    if WEEKDAY_NAMES.contains(&lower.as_str()) {
        return false;
    }
    if NAV_LABELS.iter().any(|label| lower == *label) {
        return false;
    }
    if title.chars().all(|c| c.is_ascii_digit() || c.is_whitespace()) {
        return false;
    }
    title.split_whitespace().any(|word| word.chars().filter(|c| c.is_alphabetic()).count() >= 3)
}

fn collect_from_text(text: &str, current_year: i32, out: &mut HashMap<NaiveDate, String>) {
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.len() < 5 {
            continue;
        }
        let Some((date, span)) = find_date(line, current_year) else {
            continue;
        };
        let title = extract_title(line, span);
        if is_plausible_title(&title) {
            out.insert(date, title);
        }
    }
}

/// Fetches `calendar_url` and extracts `(date, title)` pairs from both
/// free text and structured calendar-shaped elements. The last title seen
/// per date wins.
pub async fn parse_events_from_url(
    client: &Client,
    calendar_url: &str,
) -> Result<Vec<ParsedProviderEvent>, String> {
    let response = client
        .get(calendar_url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| format!("fetch failed: {e}"))?;
    let body = response.text().await.map_err(|e| format!("read body failed: {e}"))?;

    let current_year = Utc::now().date_naive().year_ce().1 as i32;
    let mut by_date: HashMap<NaiveDate, String> = HashMap::new();

    let document = Html::parse_document(&body);

    let text = html2text::from_read(body.as_bytes(), 10_000);
    collect_from_text(&text, current_year, &mut by_date);

    if let (Ok(selector), Ok(row_selector)) = (
        Selector::parse("table, ul, ol, div"),
        Selector::parse("tr, li"),
    ) {
        let class_pattern = Regex::new(r"(?i)calendar|event|schedule").unwrap();
        for element in document.select(&selector) {
            let class_attr = element.value().attr("class").unwrap_or("");
            if !class_pattern.is_match(class_attr) {
                continue;
            }
            let mut rows = element.select(&row_selector).peekable();
            if rows.peek().is_none() {
                let row_text = element.text().collect::<Vec<_>>().join(" ");
                collect_from_text(&row_text, current_year, &mut by_date);
            } else {
                for row in rows {
                    let row_text = row.text().collect::<Vec<_>>().join(" ");
                    collect_from_text(&row_text, current_year, &mut by_date);
                }
            }
        }
    }

    info!(calendar_url, count = by_date.len(), "parsed calendar events");

    let mut events: Vec<ParsedProviderEvent> = by_date
        .into_iter()
        .map(|(event_date, title)| ParsedProviderEvent {
            event_date,
            title,
            description: None,
            event_type: Some(classify_event_type(&title).to_string()),
            start_time: None,
            end_time: None,
            all_day: true,
        })
        .collect();
    events.sort_by_key(|e| e.event_date);
    Ok(events)
}

/// Classifies an event's type from title keywords, per §4.6 step 1 of the
/// persistence rule (closure > early_dismissal > pd_day > event, in that
/// priority order since a title could plausibly match more than one).
pub fn classify_event_type(title: &str) -> &'static str {
    let lower = title.to_lowercase();
    if ["closed", "closure", "holiday", "break", "vacation"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        "closure"
    } else if ["early", "dismissal", "half day", "early release"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        "early_dismissal"
    } else if ["pd day", "professional development", "teacher workday"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        "pd_day"
    } else {
        "event"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_month_day_year() {
        let (date, _) = find_date("School Closed: January 15, 2026 for staff training", 2026).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
    }

    #[test]
    fn parses_slash_date() {
        let (date, _) = find_date("1/15/2026 Winter Break Begins", 2026).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
    }

    #[test]
    fn parses_dash_date() {
        let (date, _) = find_date("1-15-2026 Winter Break Begins", 2026).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
    }

    #[test]
    fn parses_month_day_without_year_using_current_year() {
        let (date, _) = find_date("January 15 - Teacher Workday", 2026).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
    }

    #[test]
    fn extracts_and_cleans_title() {
        let line = "January 15, 2026 -- Professional Development Day!!";
        let (_, span) = find_date(line, 2026).unwrap();
        let title = extract_title(line, span);
        assert_eq!(title, "Professional Development Day!!");
    }

    #[test]
    fn truncates_title_to_100_chars() {
        let long_word = "x".repeat(150);
        let line = format!("January 15, 2026 {long_word}");
        let (_, span) = find_date(&line, 2026).unwrap();
        let title = extract_title(&line, span);
        assert_eq!(title.chars().count(), MAX_TITLE_LEN);
    }

    #[test]
    fn rejects_bare_weekday_title() {
        assert!(!is_plausible_title("Monday"));
    }

    #[test]
    fn rejects_navigation_labels() {
        assert!(!is_plausible_title("previous"));
        assert!(!is_plausible_title("next"));
    }

    #[test]
    fn rejects_numeric_only_title() {
        assert!(!is_plausible_title("2026"));
    }

    #[test]
    fn accepts_title_with_one_three_letter_word() {
        assert!(is_plausible_title("PD Day"));
    }

    #[test]
    fn classifies_closure_keywords() {
        assert_eq!(classify_event_type("School Closed for Holiday"), "closure");
    }

    #[test]
    fn classifies_early_dismissal_keywords() {
        assert_eq!(classify_event_type("Early Dismissal Today"), "early_dismissal");
    }

    #[test]
    fn classifies_pd_day_keywords() {
        assert_eq!(classify_event_type("Teacher Workday - PD Day"), "pd_day");
    }

    #[test]
    fn classifies_default_to_event() {
        assert_eq!(classify_event_type("Spring Concert"), "event");
    }

    #[test]
    fn preserves_last_title_per_date_on_duplicate() {
        let mut out = HashMap::new();
        collect_from_text("January 15, 2026 - First Mention", 2026, &mut out);
        collect_from_text("January 15, 2026 - Updated Title Text", 2026, &mut out);
        assert_eq!(out.get(&NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()).unwrap(), "Updated Title Text");
    }

    #[tokio::test]
    async fn structured_table_extracts_one_event_per_row() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body>
                    <table class="calendar-table">
                        <tr><td>January 15, 2026</td><td>Winter Break Begins</td></tr>
                        <tr><td>January 20, 2026</td><td>Teacher Workday</td></tr>
                    </table>
                </body></html>"#,
            ))
            .mount(&server)
            .await;

        let client = Client::new();
        let events = parse_events_from_url(&client, &server.uri()).await.unwrap();

        let jan15 = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let jan20 = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        let by_date: HashMap<_, _> = events.iter().map(|e| (e.event_date, e.title.clone())).collect();
        assert_eq!(by_date.get(&jan15).unwrap(), "Winter Break Begins");
        assert_eq!(by_date.get(&jan20).unwrap(), "Teacher Workday");
    }
}
