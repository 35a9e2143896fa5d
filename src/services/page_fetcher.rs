use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use url::Url;

use crate::error::Result;

// Wide enough that titles are never wrapped mid-word.
const FRAGMENT_WIDTH: usize = 10_000;
const USER_AGENT_STRING: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// A hoverable link on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub title: String,
    pub text: String,
    pub links: Vec<Link>,
}

pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, page_url: &str) -> Result<Page> {
        let base = Url::parse(page_url)?;

        let response = self.client.get(base.as_str()).send().await?;
        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch page: HTTP {}", response.status()).into());
        }

        let html = response.text().await?;
        Ok(parse_page(&base, &html))
    }

    /// Readable text of a link target. Falls back to the URL itself when the
    /// target cannot be fetched, so a summary can still be requested.
    pub async fn text_for(&self, target_url: &str) -> String {
        match self.fetch(target_url).await {
            Ok(page) if !page.text.is_empty() => page.text,
            Ok(_) => target_url.to_string(),
            Err(e) => {
                tracing::debug!("Failed to fetch {}: {}", target_url, e);
                target_url.to_string()
            }
        }
    }
}

pub fn parse_page(base: &Url, html: &str) -> Page {
    let title = extract_title(html).unwrap_or_else(|| base.to_string());
    Page {
        url: base.to_string(),
        title,
        text: extract_text(html),
        links: extract_links(base, html),
    }
}

fn anchor_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#)
            .expect("anchor pattern is valid")
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"))
}

fn extract_title(html: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern is valid")
    });
    re.captures(html)
        .map(|c| collapse_whitespace(&decode_entities(&c[1])))
        .filter(|t| !t.is_empty())
}

/// Absolute http(s) links in document order, first occurrence wins.
fn extract_links(base: &Url, html: &str) -> Vec<Link> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for caps in anchor_regex().captures_iter(html) {
        let Ok(mut url) = base.join(caps[1].trim()) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        url.set_fragment(None);

        let url = url.to_string();
        if !seen.insert(url.clone()) {
            continue;
        }

        let inner = tag_regex().replace_all(&caps[2], " ");
        let title = collapse_whitespace(&decode_entities(&inner));
        let title = if title.is_empty() { url.clone() } else { title };

        links.push(Link { url, title });
    }

    links
}

fn extract_text(html: &str) -> String {
    let text = match html2text::from_read(html.as_bytes(), 80) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            return String::new();
        }
    };

    text.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode character references in a tag-free fragment.
fn decode_entities(fragment: &str) -> String {
    html2text::from_read(fragment.as_bytes(), FRAGMENT_WIDTH).unwrap_or_else(|e| {
        tracing::debug!("Failed to decode fragment: {}", e);
        fragment.to_string()
    })
}
