//! Shared helpers for compile-time-constant regexes and CSS selectors.

use regex::Regex;
use scraper::{ElementRef, Selector};

/// Compiles a static regex pattern.
///
/// Panics only if a hard-coded pattern is invalid.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Parses a static CSS selector.
///
/// Panics only if a hard-coded selector is invalid.
pub fn compile_static_selector(selector: &str) -> Selector {
    Selector::parse(selector).unwrap_or_else(|e| panic!("invalid static selector '{selector}': {e:?}"))
}

/// Text of an element with its text nodes trimmed and joined by single spaces.
pub fn spaced_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
