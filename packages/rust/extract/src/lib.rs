//! Extraction strategies and the strategy registry.
//!
//! This crate provides:
//! - [`ExtractionStrategy`] — the one-operation contract every strategy implements
//! - [`StrategyRegistry`] — resolves a source's configured strategy name,
//!   always falling back to [`GenericStrategy`]
//! - Built-in strategies ([`GenericStrategy`], [`ThamesWaterStrategy`])

pub mod strategies;

pub use strategies::{
    ExtractionStrategy, GenericStrategy, StrategyRegistry, ThamesWaterStrategy, resolve_link,
};
