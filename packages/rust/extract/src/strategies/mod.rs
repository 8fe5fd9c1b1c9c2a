//! Extraction strategy trait and registry.
//!
//! A strategy is a pure function of a parsed document and its base URL,
//! producing candidate items. One strategy serves one source, selected by
//! name at configuration time; [`GenericStrategy`] is the always-available
//! fallback used when no name is configured or the name is unknown.

mod generic;
mod thames_water;

use std::collections::HashMap;
use std::sync::Arc;

use presswatch_shared::Item;
use scraper::Html;
use tracing::warn;
use url::Url;

pub use generic::GenericStrategy;
pub use thames_water::ThamesWaterStrategy;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Contract for per-source item extraction.
///
/// Implementations must never panic for malformed input; internal failure is
/// expressed as an empty result, which the calling monitor logs. The
/// infallible signature is deliberate — there is no error channel to misuse.
pub trait ExtractionStrategy: Send + Sync {
    /// Extract candidate items from a parsed listing page.
    fn extract(&self, doc: &Html, base_url: &Url) -> Vec<Item>;

    /// Registry identifier, also used in tracing output.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps strategy identifiers to implementations.
///
/// Strategies are registered statically at construction (no runtime code
/// loading); additional implementations can be added programmatically with
/// [`StrategyRegistry::register`].
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn ExtractionStrategy>>,
    generic: Arc<dyn ExtractionStrategy>,
}

impl StrategyRegistry {
    /// Create a registry with all built-in strategies.
    pub fn new() -> Self {
        let mut registry = Self {
            strategies: HashMap::new(),
            generic: Arc::new(GenericStrategy),
        };
        registry.register(Arc::new(ThamesWaterStrategy));
        registry
    }

    /// Register a strategy under its own name. Replaces any previous
    /// registration of the same name.
    pub fn register(&mut self, strategy: Arc<dyn ExtractionStrategy>) {
        self.strategies
            .insert(strategy.name().to_string(), strategy);
    }

    /// Resolve a source's configured strategy.
    ///
    /// `None` means the generic fallback. An unknown name also degrades to
    /// the generic fallback with a logged warning rather than disabling the
    /// source.
    pub fn resolve(&self, extractor: Option<&str>) -> Arc<dyn ExtractionStrategy> {
        match extractor {
            None => self.generic.clone(),
            Some(name) => match self.strategies.get(name) {
                Some(strategy) => strategy.clone(),
                None => {
                    warn!(name, "unknown extraction strategy, using generic fallback");
                    self.generic.clone()
                }
            },
        }
    }

    /// Names of all registered strategies, for CLI display.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Resolve a site-relative href (leading `/`) against the source origin.
/// Anything else passes through unchanged.
pub fn resolve_link(href: &str, base_url: &Url) -> String {
    if href.starts_with('/') {
        format!("{}{}", base_url.origin().ascii_serialization(), href)
    } else {
        href.to_string()
    }
}

/// Collect an element's text content, whitespace-normalized.
pub(crate) fn element_text(el: &scraper::ElementRef) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_generic_by_default() {
        let registry = StrategyRegistry::new();
        assert_eq!(registry.resolve(None).name(), "generic");
    }

    #[test]
    fn registry_resolves_named_strategy() {
        let registry = StrategyRegistry::new();
        assert_eq!(
            registry.resolve(Some("thames-water")).name(),
            "thames-water"
        );
    }

    #[test]
    fn unknown_name_falls_back_to_generic() {
        let registry = StrategyRegistry::new();
        assert_eq!(registry.resolve(Some("no-such-strategy")).name(), "generic");
    }

    #[test]
    fn custom_registration() {
        struct NullStrategy;
        impl ExtractionStrategy for NullStrategy {
            fn extract(&self, _doc: &Html, _base_url: &Url) -> Vec<Item> {
                Vec::new()
            }
            fn name(&self) -> &str {
                "null"
            }
        }

        let mut registry = StrategyRegistry::new();
        registry.register(std::sync::Arc::new(NullStrategy));
        assert_eq!(registry.resolve(Some("null")).name(), "null");
        assert!(registry.names().contains(&"null"));
    }

    #[test]
    fn resolve_link_prefixes_origin() {
        let base = Url::parse("https://example.com/media/press").unwrap();
        assert_eq!(
            resolve_link("/news/1", &base),
            "https://example.com/news/1"
        );
        assert_eq!(
            resolve_link("https://other.com/x", &base),
            "https://other.com/x"
        );
    }
}
