//! Browser session seam.
//!
//! The engine drives a remote, stateful, non-reentrant page through the
//! [`BrowserSession`] trait. Implementations own the element handles they
//! return; an [`ElementRef`] is only meaningful to the session that issued it
//! and only until the next navigation.
//!
//! With the `browser` feature (on by default) [`ChromiumSession`] drives a
//! local or remote Chrome over the DevTools protocol.

mod error;

#[cfg(feature = "browser")]
mod chromium;

pub use error::BrowserError;

#[cfg(feature = "browser")]
pub use chromium::{ChromiumOptions, ChromiumSession};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Poll interval used by the default [`BrowserSession::wait_for`].
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How to find an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// Match the `name` attribute exactly.
    Name(String),
    /// Match the `id` attribute exactly.
    Id(String),
    /// A CSS selector.
    Css(String),
}

impl Locator {
    /// Shorthand for [`Locator::Name`].
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Shorthand for [`Locator::Id`].
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Shorthand for [`Locator::Css`].
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Renders the locator as a CSS selector.
    #[must_use]
    pub fn to_css(&self) -> String {
        match self {
            Self::Name(name) => format!("[name=\"{}\"]", css_escape(name)),
            Self::Id(id) => format!("[id=\"{}\"]", css_escape(id)),
            Self::Css(selector) => selector.clone(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "name={name}"),
            Self::Id(id) => write!(f, "id={id}"),
            Self::Css(selector) => write!(f, "css={selector}"),
        }
    }
}

fn css_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Opaque, session-scoped element handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementRef(pub u64);

/// Opaque window (tab/popup) handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowHandle(pub String);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// DOM notifications the engine raises after changing a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomEvent {
    /// `change`
    Change,
    /// `input`
    Input,
}

impl DomEvent {
    /// DOM event type name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Change => "change",
            Self::Input => "input",
        }
    }
}

/// How a click is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMode {
    /// `element.click()` from page script.
    Script,
    /// Synthesised pointer input.
    Native,
}

/// A remote, fallible, stateful browser page.
///
/// One leaf's protocol must run to completion before another starts, so every
/// method takes `&mut self`.
#[async_trait]
pub trait BrowserSession: Send {
    /// Loads `url` in the focused window.
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Returns the first element matching `locator`, if any.
    async fn find_element(&mut self, locator: &Locator) -> Result<Option<ElementRef>, BrowserError>;

    /// Returns every element matching `locator` in document order.
    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<ElementRef>, BrowserError>;

    /// Returns the first descendant of `scope` matching `locator`.
    async fn find_within(
        &mut self,
        scope: ElementRef,
        locator: &Locator,
    ) -> Result<Option<ElementRef>, BrowserError>;

    /// Lists descendants of `element` with the given tag name.
    async fn list_children(
        &mut self,
        element: ElementRef,
        tag: &str,
    ) -> Result<Vec<ElementRef>, BrowserError>;

    /// Reads an attribute; `None` when it is absent.
    async fn attribute(
        &mut self,
        element: ElementRef,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    /// Reads rendered text.
    async fn text(&mut self, element: ElementRef) -> Result<String, BrowserError>;

    /// Sets the value of the control whose `name` is `name`.
    async fn set_control_value(&mut self, name: &str, value: &str) -> Result<(), BrowserError>;

    /// Clears a text field and fills it with `text`.
    async fn clear_and_type(&mut self, element: ElementRef, text: &str)
    -> Result<(), BrowserError>;

    /// Raises a DOM event on `element`.
    async fn dispatch_event(&mut self, element: ElementRef, event: DomEvent)
    -> Result<(), BrowserError>;

    /// Clicks `element`.
    async fn click(&mut self, element: ElementRef, mode: ClickMode) -> Result<(), BrowserError>;

    /// Serialised DOM of the focused window.
    async fn page_source(&mut self) -> Result<String, BrowserError>;

    /// Handles of all open windows.
    async fn list_windows(&mut self) -> Result<Vec<WindowHandle>, BrowserError>;

    /// Handle of the focused window.
    async fn current_window(&mut self) -> Result<WindowHandle, BrowserError>;

    /// Moves focus to `handle`.
    async fn switch_window(&mut self, handle: &WindowHandle) -> Result<(), BrowserError>;

    /// Address of the focused window.
    async fn current_url(&mut self) -> Result<String, BrowserError>;

    /// Closes the focused window. Focus is undefined until the next switch.
    async fn close_window(&mut self) -> Result<(), BrowserError>;

    /// Releases the session. Further calls fail with [`BrowserError::Closed`].
    async fn quit(&mut self) -> Result<(), BrowserError>;

    /// Polls for `locator` until it appears or `timeout` elapses.
    async fn wait_for(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementRef, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.find_element(locator).await? {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::timeout(locator, timeout));
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_to_css() {
        assert_eq!(Locator::name("ddl_taluk").to_css(), "[name=\"ddl_taluk\"]");
        assert_eq!(Locator::id("grdMaps_ImgPdf_0").to_css(), "[id=\"grdMaps_ImgPdf_0\"]");
        assert_eq!(
            Locator::css("img[id*='ImgPdf']").to_css(),
            "img[id*='ImgPdf']"
        );
    }

    #[test]
    fn test_locator_css_escapes_quotes() {
        assert_eq!(Locator::name("a\"b").to_css(), "[name=\"a\\\"b\"]");
    }
}
