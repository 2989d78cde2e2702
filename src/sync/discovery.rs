/*!
 * Calendar URL Discovery (C6, §4.6 "Discovery")
 *
 * Given a provider's base website, finds the most likely URL for its
 * public calendar/events page: first by probing a fixed set of candidate
 * subpaths with HEAD requests, then by falling back to scoring anchors on
 * the base page.
 */

use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

const HEAD_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const BASE_PAGE_TIMEOUT: Duration = Duration::from_secs(10);

const CANDIDATE_SLUGS: &[&str] = &[
    "calendar",
    "events",
    "schedule",
    "closures",
    "holidays",
    "news",
    "announcements",
];

const KEYWORD_SCORES: &[(&str, u32)] = &[
    ("calendar", 10),
    ("academic", 9),
    ("events", 8),
    ("schedule", 6),
    ("closure", 5),
    ("holiday", 4),
];

/// Prefixes `https://` onto `base_url` if it has no scheme.
fn normalize_scheme(base_url: &str) -> String {
    if base_url.starts_with("http://") || base_url.starts_with("https://") {
        base_url.to_string()
    } else {
        format!("https://{base_url}")
    }
}

fn candidate_paths() -> Vec<String> {
    let mut paths = Vec::with_capacity(CANDIDATE_SLUGS.len() * 3);
    for slug in CANDIDATE_SLUGS {
        paths.push(format!("/{slug}"));
        paths.push(format!("/{slug}.html"));
        paths.push(format!("/{slug}.php"));
    }
    paths
}

/// Discovers the calendar URL for a provider's website. Returns `Ok(None)`
/// (not an error) when nothing promising is found — discovery failing to
/// find a URL is an expected outcome, not a fault.
pub async fn discover_calendar_url(client: &Client, base_url: &str) -> Option<String> {
    let base_url = normalize_scheme(base_url);
    let base = match Url::parse(&base_url) {
        Ok(u) => u,
        Err(e) => {
            warn!(base_url, error = %e, "invalid provider base url");
            return None;
        }
    };

    for path in candidate_paths() {
        let Ok(candidate) = base.join(&path) else {
            continue;
        };
        match client.head(candidate.clone()).timeout(HEAD_PROBE_TIMEOUT).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(url = %candidate, "found calendar url via direct probe");
                return Some(candidate.to_string());
            }
            Ok(resp) => {
                debug!(url = %candidate, status = %resp.status(), "probe miss");
            }
            Err(e) => {
                debug!(url = %candidate, error = %e, "probe failed");
            }
        }
    }

    score_anchors_on_base_page(client, &base).await
}

async fn score_anchors_on_base_page(client: &Client, base: &Url) -> Option<String> {
    let body = match client.get(base.clone()).timeout(BASE_PAGE_TIMEOUT).send().await {
        Ok(resp) => match resp.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(base = %base, error = %e, "failed to read base page body");
                return None;
            }
        },
        Err(e) => {
            warn!(base = %base, error = %e, "failed to fetch base page");
            return None;
        }
    };

    let document = Html::parse_document(&body);
    let Ok(anchor_selector) = Selector::parse("a[href]") else {
        return None;
    };

    let mut best: Option<(u32, Url)> = None;
    for anchor in document.select(&anchor_selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(candidate) = base.join(href) else {
            continue;
        };
        let text = anchor.text().collect::<String>().to_lowercase();
        let haystack = format!("{text} {}", candidate.as_str().to_lowercase());

        let score: u32 = KEYWORD_SCORES
            .iter()
            .filter(|(keyword, _)| haystack.contains(keyword))
            .map(|(_, points)| *points)
            .sum();

        if score == 0 {
            continue;
        }
        if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
            best = Some((score, candidate));
        }
    }

    best.map(|(score, url)| {
        info!(url = %url, score, "discovered calendar url via anchor scoring");
        url.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_scheme_adds_https_when_absent() {
        assert_eq!(normalize_scheme("example.com"), "https://example.com");
    }

    #[test]
    fn normalize_scheme_preserves_existing_scheme() {
        assert_eq!(normalize_scheme("http://example.com"), "http://example.com");
    }

    #[test]
    fn candidate_paths_cover_html_and_php_variants() {
        let paths = candidate_paths();
        assert!(paths.contains(&"/calendar".to_string()));
        assert!(paths.contains(&"/calendar.html".to_string()));
        assert!(paths.contains(&"/calendar.php".to_string()));
        assert_eq!(paths.len(), CANDIDATE_SLUGS.len() * 3);
    }

    #[tokio::test]
    async fn direct_probe_hit_short_circuits_anchor_scoring() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = Client::new();
        let found = discover_calendar_url(&client, &server.uri()).await;
        assert_eq!(found, Some(format!("{}/events", server.uri())));
    }

    #[tokio::test]
    async fn falls_back_to_anchor_scoring_when_no_candidate_path_responds() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("HEAD")).respond_with(ResponseTemplate::new(404)).mount(&server).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body>
                    <a href="/about">About us</a>
                    <a href="/school-calendar">School Calendar</a>
                </body></html>"#,
            ))
            .mount(&server)
            .await;

        let client = Client::new();
        let found = discover_calendar_url(&client, &server.uri()).await;
        assert_eq!(found, Some(format!("{}/school-calendar", server.uri())));
    }

    #[tokio::test]
    async fn no_hits_and_no_scoring_anchors_returns_none() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("HEAD")).respond_with(ResponseTemplate::new(404)).mount(&server).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body><a href=\"/about\">About</a></body></html>"))
            .mount(&server)
            .await;

        let client = Client::new();
        let found = discover_calendar_url(&client, &server.uri()).await;
        assert_eq!(found, None);
    }
}
