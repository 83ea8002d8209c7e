//! Document URL extraction from a located action control.
//!
//! Two strategies run in order: a static parse of the control's click
//! handler, then a simulated click with popup interception.

use regex::Regex;
use tokio::time::Instant;
use tracing::debug;

use crate::browser::{
    BrowserError, BrowserSession, ClickMode, ElementRef, WAIT_POLL_INTERVAL, WindowHandle,
};
use crate::navigator::CascadeTiming;
use crate::portal::PortalProfile;

/// URL extraction strategies, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStrategy {
    /// Parse the click-handler attribute without touching the page.
    StaticAttribute,
    /// Click the control and read the popup (or same-tab) address.
    PopupClick,
}

/// Default strategy order.
pub const EXTRACT_STRATEGIES: &[ExtractStrategy] =
    &[ExtractStrategy::StaticAttribute, ExtractStrategy::PopupClick];

/// Click-handler patterns that capture the download parameter.
#[derive(Debug, Clone)]
pub struct HandlerPatterns {
    patterns: Vec<Regex>,
}

impl HandlerPatterns {
    /// Builds the patterns for the portal's endpoint and parameter names.
    ///
    /// Matches unquoted (`FileDownload.aspx?file=abc`), quoted-parameter
    /// (`FileDownload.aspx?file='abc'`), and quoted-address forms.
    ///
    /// # Errors
    ///
    /// Returns the regex error if the endpoint produces an oversized pattern.
    pub fn new(portal: &PortalProfile) -> Result<Self, regex::Error> {
        let endpoint = regex::escape(&portal.download_endpoint);
        let param = regex::escape(&portal.download_param);
        let patterns = [
            format!(r#"(?i){endpoint}[^'"\s]*{param}=([^'")\s&]+)"#),
            format!(r#"(?i){endpoint}\?{param}=['"]([^'"]+)['"]"#),
            format!(r#"(?i)['"]{endpoint}[^'"]*{param}=([^'")\s&]+)['"]"#),
        ]
        .iter()
        .map(|pattern| Regex::new(pattern))
        .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Returns the download parameter captured by the first matching pattern.
    #[must_use]
    pub fn capture<'a>(&self, handler: &'a str) -> Option<&'a str> {
        self.patterns.iter().find_map(|pattern| {
            pattern
                .captures(handler)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim_matches(|c| c == '\'' || c == '"'))
                .filter(|param| !param.is_empty())
        })
    }
}

/// Synthesises the document URL from a click-handler attribute.
#[must_use]
pub fn parse_handler(
    handler: &str,
    patterns: &HandlerPatterns,
    portal: &PortalProfile,
) -> Option<String> {
    patterns
        .capture(handler)
        .map(|param| portal.download_url(param))
}

/// Reads the control's `onclick` and parses it.
pub(crate) async fn from_static_attribute<S>(
    session: &mut S,
    control: ElementRef,
    patterns: &HandlerPatterns,
    portal: &PortalProfile,
) -> Result<Option<String>, BrowserError>
where
    S: BrowserSession + ?Sized,
{
    let handler = session.attribute(control, "onclick").await?.unwrap_or_default();
    if handler.is_empty() {
        return Ok(None);
    }
    Ok(parse_handler(&handler, patterns, portal))
}

async fn await_new_window<S>(
    session: &mut S,
    before: &[WindowHandle],
    wait: std::time::Duration,
) -> Result<Option<WindowHandle>, BrowserError>
where
    S: BrowserSession + ?Sized,
{
    let deadline = Instant::now() + wait;
    loop {
        tokio::time::sleep(WAIT_POLL_INTERVAL.min(wait)).await;
        let opened = session
            .list_windows()
            .await?
            .into_iter()
            .find(|handle| !before.contains(handle));
        if opened.is_some() || Instant::now() >= deadline {
            return Ok(opened);
        }
    }
}

/// Clicks the control and captures a download address from a new window or
/// from the original window.
///
/// A popup is always closed and the original window refocused, whether or
/// not its address matched.
pub(crate) async fn from_popup_click<S>(
    session: &mut S,
    control: ElementRef,
    portal: &PortalProfile,
    timing: &CascadeTiming,
) -> Result<Option<String>, BrowserError>
where
    S: BrowserSession + ?Sized,
{
    let original = session.current_window().await?;
    let before = session.list_windows().await?;

    if let Err(error) = session.click(control, ClickMode::Script).await {
        debug!(%error, "script click failed; trying native click");
        session.click(control, ClickMode::Native).await?;
    }

    let Some(popup) = await_new_window(session, &before, timing.popup_wait).await? else {
        let address = session.current_url().await?;
        debug!(%address, "no popup; checking original window");
        return Ok(portal.is_download_address(&address).then_some(address));
    };

    session.switch_window(&popup).await?;
    let address = session.current_url().await;
    let closed = session.close_window().await;
    session.switch_window(&original).await?;
    closed?;
    let address = address?;
    debug!(%address, popup = %popup, "popup address read");
    Ok(portal.is_download_address(&address).then_some(address))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(handler: &str) -> Option<String> {
        let portal = PortalProfile::default();
        let patterns = HandlerPatterns::new(&portal).unwrap();
        parse_handler(handler, &patterns, &portal)
    }

    const EXPECTED: &str =
        "https://landrecords.karnataka.gov.in/service3/FileDownload.aspx?file=ABC123";

    #[test]
    fn test_unquoted_parameter() {
        assert_eq!(
            parse("window.open('FileDownload.aspx?file=ABC123');return false;").as_deref(),
            Some(EXPECTED)
        );
    }

    #[test]
    fn test_quoted_parameter() {
        assert_eq!(
            parse("openDoc(FileDownload.aspx?file='ABC123')").as_deref(),
            Some(EXPECTED)
        );
    }

    #[test]
    fn test_endpoint_match_is_case_insensitive() {
        assert_eq!(
            parse("location.href='filedownload.aspx?id=9&file=ABC123'").as_deref(),
            Some(EXPECTED)
        );
    }

    #[test]
    fn test_unrelated_handler_yields_nothing() {
        assert_eq!(parse("__doPostBack('grdMaps','Select$0')"), None);
        assert_eq!(parse(""), None);
    }
}
