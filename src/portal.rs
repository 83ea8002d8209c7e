//! Fixed description of the records portal the engine drives.
//!
//! The portal exposes a four-level cascade of dependent dropdowns, a free-text
//! leaf filter, a search button, a results grid, and a per-row download
//! affordance. Every identifier the navigator and resolver touch lives here so
//! the rest of the engine never embeds selectors inline.

use serde::{Deserialize, Serialize};

/// Default portal base address (trailing slash is significant for URL synthesis).
pub const DEFAULT_BASE_URL: &str = "https://landrecords.karnataka.gov.in/service3/";

/// Default download endpoint name.
pub const DEFAULT_DOWNLOAD_ENDPOINT: &str = "FileDownload.aspx";

/// Option values that mark a placeholder entry rather than a real choice.
pub const PLACEHOLDER_VALUES: [&str; 4] = ["", "0", "All", "--Select--"];

/// Identifiers and endpoint details for the portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalProfile {
    /// Page that hosts the cascade form.
    pub base_url: String,
    /// `name` of the Region dropdown.
    pub region_control: String,
    /// `name` of the SubRegion dropdown.
    pub sub_region_control: String,
    /// `name` of the SubSubRegion dropdown.
    pub sub_sub_region_control: String,
    /// `name` of the free-text leaf filter.
    pub leaf_filter_control: String,
    /// `name` of the search button.
    pub search_control: String,
    /// CSS selector for the results grid.
    pub results_table_selector: String,
    /// Exact element id of the first row's download affordance.
    pub action_control_id: String,
    /// Id substring used for the document-wide fallback search.
    pub action_control_id_fragment: String,
    /// Id substring used for the search scoped to the results grid.
    pub action_control_scoped_fragment: String,
    /// Download endpoint path segment (e.g. `FileDownload.aspx`).
    pub download_endpoint: String,
    /// Query parameter carrying the document reference.
    pub download_param: String,
    /// Header keywords identifying the leaf-name column.
    pub leaf_column_keywords: Vec<String>,
    /// Column used when no header keyword matches.
    pub leaf_column_fallback: usize,
    /// Text that marks a pagination row inside the grid.
    pub pagination_marker: String,
    /// Content types accepted for fetched documents.
    pub accepted_content_types: Vec<String>,
    /// Extension for written artifacts (without the dot).
    pub artifact_extension: String,
}

impl Default for PortalProfile {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            region_control: "ddl_district".to_string(),
            sub_region_control: "ddl_taluk".to_string(),
            sub_sub_region_control: "ddl_hobli".to_string(),
            leaf_filter_control: "txtVlgName".to_string(),
            search_control: "btnSearch".to_string(),
            results_table_selector: "table[id*='grdMaps'], table[id*='Grid']".to_string(),
            action_control_id: "grdMaps_ImgPdf_0".to_string(),
            action_control_id_fragment: "grdMaps_ImgPdf".to_string(),
            action_control_scoped_fragment: "ImgPdf".to_string(),
            download_endpoint: DEFAULT_DOWNLOAD_ENDPOINT.to_string(),
            download_param: "file".to_string(),
            leaf_column_keywords: vec!["village".to_string(), "vlg".to_string()],
            leaf_column_fallback: 3,
            pagination_marker: "Page".to_string(),
            accepted_content_types: vec!["application/pdf".to_string()],
            artifact_extension: "pdf".to_string(),
        }
    }
}

impl PortalProfile {
    /// Builds the document URL for a captured endpoint parameter.
    #[must_use]
    pub fn download_url(&self, param: &str) -> String {
        format!(
            "{}{}?{}={}",
            self.base_url, self.download_endpoint, self.download_param, param
        )
    }

    /// Returns true if `address` points at the download endpoint.
    #[must_use]
    pub fn is_download_address(&self, address: &str) -> bool {
        address
            .to_ascii_lowercase()
            .contains(&self.download_endpoint.to_ascii_lowercase())
    }

    /// Returns true if `value` is a placeholder option value.
    #[must_use]
    pub fn is_placeholder(value: &str) -> bool {
        PLACEHOLDER_VALUES.contains(&value.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_url_uses_base_endpoint_and_param() {
        let portal = PortalProfile::default();
        assert_eq!(
            portal.download_url("abc123"),
            "https://landrecords.karnataka.gov.in/service3/FileDownload.aspx?file=abc123"
        );
    }

    #[test]
    fn test_is_download_address_is_case_insensitive() {
        let portal = PortalProfile::default();
        assert!(portal.is_download_address("https://host/service3/filedownload.aspx?file=1"));
        assert!(portal.is_download_address("https://host/service3/FileDownload.aspx?file=1"));
        assert!(!portal.is_download_address("https://host/service3/Default.aspx"));
    }

    #[test]
    fn test_placeholder_values() {
        assert!(PortalProfile::is_placeholder(""));
        assert!(PortalProfile::is_placeholder("0"));
        assert!(PortalProfile::is_placeholder("--Select--"));
        assert!(PortalProfile::is_placeholder("All"));
        assert!(!PortalProfile::is_placeholder("12"));
    }
}
