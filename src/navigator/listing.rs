//! Leaf-name extraction from a rendered results table.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::patterns::{compile_static_selector, spaced_text};
use crate::portal::PortalProfile;

static TABLE: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("table"));
static ROW: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("tr"));
static HEADER_CELL: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("th"));
static DATA_CELL: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("td"));

/// Returns true if the nearest ancestor named `tag` is `owner`.
///
/// Keeps rows and cells of nested tables (such as a pager inside the grid)
/// out of the outer table's data.
fn owned_by(element: ElementRef<'_>, tag: &str, owner: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == tag)
        .is_some_and(|ancestor| ancestor.id() == owner.id())
}

fn own_rows<'a>(table: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    table
        .select(&ROW)
        .filter(|row| owned_by(*row, "table", table))
        .collect()
}

fn own_cells<'a>(row: ElementRef<'a>, selector: &Selector) -> Vec<ElementRef<'a>> {
    row.select(selector)
        .filter(|cell| owned_by(*cell, "tr", row))
        .collect()
}

/// Finds the leaf-name column from header text, falling back to the
/// configured index.
fn leaf_column(header: ElementRef<'_>, portal: &PortalProfile) -> usize {
    let mut cells = own_cells(header, &HEADER_CELL);
    if cells.is_empty() {
        cells = own_cells(header, &DATA_CELL);
    }
    cells
        .iter()
        .map(|cell| spaced_text(*cell).to_lowercase())
        .position(|text| {
            portal
                .leaf_column_keywords
                .iter()
                .any(|keyword| text.contains(&keyword.to_lowercase()))
        })
        .unwrap_or(portal.leaf_column_fallback)
}

fn names_from_table(table: ElementRef<'_>, portal: &PortalProfile) -> Vec<String> {
    let rows = own_rows(table);
    let Some((header, data)) = rows.split_first() else {
        return Vec::new();
    };
    if data.is_empty() {
        return Vec::new();
    }
    let column = leaf_column(*header, portal);

    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for row in data {
        if spaced_text(*row).contains(&portal.pagination_marker) {
            continue;
        }
        let cells = own_cells(*row, &DATA_CELL);
        let Some(cell) = cells.get(column) else {
            continue;
        };
        // Numeric pagers nest their own table inside a single cell.
        if cell.select(&TABLE).next().is_some() {
            continue;
        }
        let name = spaced_text(*cell);
        if !name.is_empty() && seen.insert(name.clone()) {
            names.push(name);
        }
    }
    names
}

/// Extracts leaf names from the first table on the page that yields any.
///
/// Names are deduplicated in first-seen order. Rows containing the
/// pagination marker are skipped.
#[must_use]
pub fn extract_leaf_names(html: &str, portal: &PortalProfile) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&TABLE)
        .map(|table| names_from_table(table, portal))
        .find(|names| !names.is_empty())
        .unwrap_or_default()
}
