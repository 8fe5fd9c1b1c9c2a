//! Generic (fallback) extraction strategy.
//!
//! Used when a source has no configured strategy or its configured strategy
//! cannot be resolved. Tries progressively looser heuristics to locate item
//! containers, then derives title/link/date/summary per container.

use std::sync::LazyLock;

use presswatch_shared::Item;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{ExtractionStrategy, element_text, resolve_link};

/// Selector groups for item containers, tried in order; the first group that
/// matches anything wins.
const CONTAINER_SELECTORS: &[&str] = &[
    ".press-release-item, .news-item, article, .press-release",
    ".news-listing article, .press-releases li, .news-container .item",
];

/// Matches text that embeds something date-like: a four-digit year or an
/// English month abbreviation.
static DATE_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(19|20)\d{2}\b|\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\b")
        .expect("valid regex")
});

/// Generic strategy that works on arbitrary press/news listing pages.
pub struct GenericStrategy;

impl ExtractionStrategy for GenericStrategy {
    fn extract(&self, doc: &Html, base_url: &Url) -> Vec<Item> {
        let containers = find_containers(doc);

        let items: Vec<Item> = containers
            .iter()
            .filter_map(|container| extract_item(container, base_url))
            .collect();

        debug!(
            containers = containers.len(),
            items = items.len(),
            "generic extraction complete"
        );
        items
    }

    fn name(&self) -> &str {
        "generic"
    }
}

/// Locate candidate item containers.
///
/// Order: known listing selectors, then elements whose class mentions
/// news/press, then — as a last resort — hyperlinks whose text embeds a
/// date-like substring.
fn find_containers(doc: &Html) -> Vec<ElementRef<'_>> {
    for group in CONTAINER_SELECTORS {
        let sel = Selector::parse(group).unwrap();
        let found: Vec<ElementRef> = doc.select(&sel).collect();
        if !found.is_empty() {
            return found;
        }
    }

    let classed = Selector::parse("div[class]").unwrap();
    let found: Vec<ElementRef> = doc
        .select(&classed)
        .filter(|el| {
            el.value()
                .attr("class")
                .map(|c| {
                    let c = c.to_lowercase();
                    c.contains("news") || c.contains("press")
                })
                .unwrap_or(false)
        })
        .collect();
    if !found.is_empty() {
        return found;
    }

    let anchors = Selector::parse("a[href]").unwrap();
    doc.select(&anchors)
        .filter(|a| DATE_LIKE.is_match(&element_text(a)))
        .collect()
}

/// Derive an item from one candidate container. Returns `None` unless both
/// title and link are present.
fn extract_item(container: &ElementRef, base_url: &Url) -> Option<Item> {
    let title = find_title(container)?;
    let href = find_link(container)?;
    let link = resolve_link(&href, base_url);

    let date = first_text(container, ".date, time, .published, .timestamp");
    let summary = first_text(container, ".summary, .excerpt, .description, p");

    Some(Item::new(title, link, summary, date))
}

/// Search for a heading-like child in priority order: heading levels 2–4
/// first, then title/headline-flagged elements, then emphasized link text.
/// When the container is itself a hyperlink, its own text serves as the
/// title of last resort.
fn find_title(container: &ElementRef) -> Option<String> {
    for sel_str in ["h2, h3, h4", ".title, .headline", "strong"] {
        if let Some(text) = first_text(container, sel_str) {
            return Some(text);
        }
    }

    if container.value().name() == "a" {
        let text = element_text(container);
        if !text.is_empty() {
            return Some(text);
        }
    }

    None
}

/// The container's own href when it is a hyperlink, else the first
/// descendant hyperlink's href.
fn find_link(container: &ElementRef) -> Option<String> {
    if container.value().name() == "a" {
        if let Some(href) = container.value().attr("href") {
            if !href.is_empty() {
                return Some(href.to_string());
            }
        }
    }

    let sel = Selector::parse("a[href]").unwrap();
    container
        .select(&sel)
        .find_map(|a| a.value().attr("href"))
        .filter(|href| !href.is_empty())
        .map(str::to_string)
}

/// Text of the first descendant matching `selector`, if non-empty.
fn first_text(container: &ElementRef, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).unwrap();
    container
        .select(&sel)
        .map(|el| element_text(&el))
        .find(|text| !text.is_empty())
}
