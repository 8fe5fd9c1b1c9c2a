//! Thames Water newsroom strategy.
//!
//! The newsroom renders each release as an anchor card using CSS-module
//! class names. The hashed suffixes change between site builds, so the
//! selectors match on the stable module prefix instead of the full class.

use std::sync::LazyLock;

use chrono::{Datelike, Local};
use presswatch_shared::Item;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use super::{ExtractionStrategy, element_text, resolve_link};

/// Short-form dates the newsroom uses for recent posts: `20/03 13:30`.
static SHORT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})/(\d{2}) \d{2}:\d{2}$").expect("valid regex"));

/// Strategy for Thames Water's press-release listing.
pub struct ThamesWaterStrategy;

impl ExtractionStrategy for ThamesWaterStrategy {
    fn extract(&self, doc: &Html, base_url: &Url) -> Vec<Item> {
        let card_sel = Selector::parse(r#"a[class*="Article-module"]"#).unwrap();
        let title_sel = Selector::parse("h3").unwrap();
        let date_sel = Selector::parse("time").unwrap();
        let summary_sel = Selector::parse(r#"div[class*="BasicHtml-module"] p"#).unwrap();

        let mut items = Vec::new();

        for card in doc.select(&card_sel) {
            let Some(href) = card.value().attr("href").filter(|h| !h.is_empty()) else {
                continue;
            };

            let title = card
                .select(&title_sel)
                .map(|el| element_text(&el))
                .find(|t| !t.is_empty());
            let Some(title) = title else {
                continue;
            };

            let link = resolve_link(href, base_url);

            let date = card
                .select(&date_sel)
                .map(|el| element_text(&el))
                .find(|t| !t.is_empty())
                .map(|raw| normalize_date(&raw));

            let summary = card
                .select(&summary_sel)
                .map(|el| element_text(&el))
                .find(|t| !t.is_empty());

            items.push(Item::new(title, link, summary, date));
        }

        debug!(items = items.len(), "thames-water extraction complete");
        items
    }

    fn name(&self) -> &str {
        "thames-water"
    }
}

/// Rewrite the newsroom's `DD/MM HH:MM` short dates as `YYYY-MM-DD`,
/// assuming the current year since the listing omits it. Anything else is
/// kept as displayed.
fn normalize_date(raw: &str) -> String {
    if let Some(caps) = SHORT_DATE.captures(raw) {
        let year = Local::now().year();
        return format!("{year}-{}-{}", &caps[2], &caps[1]);
    }
    raw.to_string()
}
