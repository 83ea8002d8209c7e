//! User-Agent string for document fetches.
//!
//! The portal sees one consistent identity for every plain HTTP request.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/cascade-harvest";

/// Default User-Agent for document fetches (identifies the tool).
#[must_use]
pub(crate) fn default_fetch_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("cascade-harvest/{version} (public-records-archiver; +{PROJECT_UA_URL})")
}
