//! Page-count detection and page-control selection over rendered HTML.
//!
//! Both are pure functions of the page source so the heuristics can be tested
//! without a browser. Each heuristic is an entry in an ordered table; the
//! first one that yields a count wins.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::patterns::{compile_static_regex, compile_static_selector, spaced_text};

/// Upper bound on the number of result pages walked for one listing.
pub const MAX_PAGES: u32 = 500;

/// Which heuristic produced a page count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCountMethod {
    /// "Page X of Y" in the rendered text.
    Text,
    /// Largest page number implied by pagination links.
    Links,
    /// "X of Y" in the results grid's last row.
    GridFooter,
    /// Nothing matched; one page assumed.
    Default,
}

/// A detected page count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCount {
    /// Total pages, clamped to `1..=MAX_PAGES`.
    pub total: u32,
    /// Heuristic that produced it.
    pub method: PageCountMethod,
}

type PageCountHeuristic = fn(&Html) -> Option<u32>;

const PAGE_COUNT_HEURISTICS: &[(PageCountMethod, PageCountHeuristic)] = &[
    (PageCountMethod::Text, count_from_text),
    (PageCountMethod::Links, count_from_links),
    (PageCountMethod::GridFooter, count_from_grid_footer),
];

static PAGE_OF_TOTAL: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?i)Page\s+(\d+)\s+of\s+(\d+)"));
static PAGE_IN_HANDLER: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?i)Page\$?(\d+)"));
static X_OF_Y: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?i)(\d+)\s*of\s*(\d+)"));

static BODY: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("body"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("a"));
static PAGER_LINK: LazyLock<Selector> = LazyLock::new(|| {
    compile_static_selector(r#"a[href*="Page"], a[onclick*="Page"], a[href*="__doPostBack"]"#)
});
static GRID: LazyLock<Selector> = LazyLock::new(|| {
    compile_static_selector(r#"[id*="grd"], [id*="Grid"], table[id*="gv"]"#)
});
static ROW: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("tr"));

/// Parses the leading run of ASCII digits, like JavaScript's `parseInt`.
fn leading_number(text: &str) -> Option<u32> {
    let digits: String = text.trim().chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn count_from_text(doc: &Html) -> Option<u32> {
    let text = doc
        .select(&BODY)
        .next()
        .map_or_else(|| spaced_text(doc.root_element()), spaced_text);
    PAGE_OF_TOTAL
        .captures(&text)
        .and_then(|caps| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

fn count_from_links(doc: &Html) -> Option<u32> {
    let mut highest: Option<u32> = None;
    for link in doc.select(&PAGER_LINK) {
        let mut candidates = Vec::with_capacity(2);
        if let Some(n) = leading_number(&spaced_text(link)).filter(|n| *n > 0) {
            candidates.push(n);
        }
        let handler = link
            .value()
            .attr("href")
            .or_else(|| link.value().attr("onclick"))
            .unwrap_or_default();
        if let Some(n) = PAGE_IN_HANDLER
            .captures(handler)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
        {
            candidates.push(n);
        }
        for n in candidates {
            highest = Some(highest.map_or(n, |h| h.max(n)));
        }
    }
    highest
}

fn count_from_grid_footer(doc: &Html) -> Option<u32> {
    let grid = doc.select(&GRID).next()?;
    let footer = grid.select(&ROW).last()?;
    X_OF_Y
        .captures(&spaced_text(footer))
        .and_then(|caps| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

/// Detects how many result pages the listing spans.
///
/// Heuristics are tried in order and the first match wins, even if a later
/// heuristic would disagree.
#[must_use]
pub fn detect_total_pages(html: &str) -> PageCount {
    let doc = Html::parse_document(html);
    for (method, heuristic) in PAGE_COUNT_HEURISTICS {
        if let Some(total) = heuristic(&doc) {
            let clamped = total.clamp(1, MAX_PAGES);
            debug!(?method, total, clamped, "page count detected");
            return PageCount {
                total: clamped,
                method: *method,
            };
        }
    }
    PageCount {
        total: 1,
        method: PageCountMethod::Default,
    }
}

/// Text and target of one `<a>` element, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorInfo {
    /// Trimmed text content.
    pub text: String,
    /// `href` attribute, empty if absent.
    pub href: String,
}

/// Collects every anchor in document order.
///
/// The index of an entry matches the index of the same anchor in a
/// `querySelectorAll("a")` over the live page.
#[must_use]
pub fn collect_anchors(html: &str) -> Vec<AnchorInfo> {
    let doc = Html::parse_document(html);
    doc.select(&ANCHOR)
        .map(|a| AnchorInfo {
            text: spaced_text(a),
            href: a.value().attr("href").unwrap_or_default().to_string(),
        })
        .collect()
}

/// How a page-change control was recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageControlStrategy {
    /// Link text is exactly `N` or `Page N`.
    ExactNumber,
    /// A `__doPostBack` link whose target encodes page `N`.
    PostBack,
    /// A generic "next" control.
    Next,
}

type PageControlMatcher = fn(&AnchorInfo, u32) -> bool;

const PAGE_CONTROLS: &[(PageControlStrategy, PageControlMatcher)] = &[
    (PageControlStrategy::ExactNumber, is_exact_number_link),
    (PageControlStrategy::PostBack, is_postback_link),
    (PageControlStrategy::Next, is_next_link),
];

fn is_exact_number_link(anchor: &AnchorInfo, target: u32) -> bool {
    let number = target.to_string();
    anchor.text == number || anchor.text == format!("Page {number}")
}

fn is_postback_link(anchor: &AnchorInfo, target: u32) -> bool {
    anchor.href.contains("__doPostBack")
        && ["Page$", "Page\\$", "Page"]
            .iter()
            .any(|prefix| contains_page_token(&anchor.href, prefix, target))
}

fn is_next_link(anchor: &AnchorInfo, _target: u32) -> bool {
    let text = anchor.text.to_lowercase();
    text == ">" || text.contains("next")
}

/// True if `haystack` contains `prefix` immediately followed by `target`
/// and then a non-digit.
fn contains_page_token(haystack: &str, prefix: &str, target: u32) -> bool {
    let token = format!("{prefix}{target}");
    haystack.match_indices(&token).any(|(at, _)| {
        !haystack[at + token.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    })
}

/// Picks the anchor that moves the listing to page `target`.
///
/// Strategies are tried in order across all anchors before falling back to
/// the next strategy.
#[must_use]
pub fn choose_page_control(
    anchors: &[AnchorInfo],
    target: u32,
) -> Option<(usize, PageControlStrategy)> {
    PAGE_CONTROLS.iter().find_map(|(strategy, matches)| {
        anchors
            .iter()
            .position(|anchor| matches(anchor, target))
            .map(|index| (index, *strategy))
    })
}
