//! Chrome DevTools adapter for [`BrowserSession`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use super::{BrowserError, BrowserSession, ClickMode, DomEvent, ElementRef, Locator, WindowHandle};

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

/// How to obtain a browser.
#[derive(Debug, Clone, Default)]
pub struct ChromiumOptions {
    /// Run without a visible window.
    pub headless: bool,
    /// Explicit executable; looked up in [`CHROME_PATHS`] when `None`.
    pub executable: Option<PathBuf>,
    /// Attach to an already-running browser instead of launching one.
    pub remote_url: Option<String>,
    /// Extra command-line switches.
    pub extra_args: Vec<String>,
    /// Per-command protocol timeout.
    pub request_timeout: Option<Duration>,
}

/// A single-page Chrome session.
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    pages: Vec<Page>,
    focused: usize,
    elements: ElementRegistry<Element>,
    closed: bool,
}

/// Element handles for the current document.
///
/// One handle per DOM node: finding the same node again replaces the stored
/// element and returns the handle it already had, so polling loops do not
/// grow the map. Handles are never reused after [`ElementRegistry::clear`].
struct ElementRegistry<E> {
    elements: HashMap<u64, E>,
    by_node: HashMap<i64, u64>,
    next: u64,
}

impl<E> ElementRegistry<E> {
    fn new() -> Self {
        Self {
            elements: HashMap::new(),
            by_node: HashMap::new(),
            next: 0,
        }
    }

    fn insert(&mut self, node: i64, element: E) -> ElementRef {
        let id = *self.by_node.entry(node).or_insert_with(|| {
            self.next += 1;
            self.next
        });
        self.elements.insert(id, element);
        ElementRef(id)
    }

    fn get(&self, handle: ElementRef) -> Option<&E> {
        self.elements.get(&handle.0)
    }

    fn clear(&mut self) {
        self.elements.clear();
        self.by_node.clear();
    }

    fn len(&self) -> usize {
        self.elements.len()
    }
}

impl ChromiumSession {
    /// Launches (or connects to) a browser and opens a blank page.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Launch`] if no browser can be started or reached.
    #[instrument(skip(options), fields(headless = options.headless))]
    pub async fn start(options: &ChromiumOptions) -> Result<Self, BrowserError> {
        let (mut browser, mut handler) = match &options.remote_url {
            Some(remote) => connect_remote(remote, options.request_timeout).await?,
            None => launch_local(options).await?,
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::launch(format!("cannot open page: {e}")))?;
        if let Err(e) = browser.fetch_targets().await {
            debug!(error = %e, "initial target discovery failed");
        }

        Ok(Self {
            browser,
            handler,
            pages: vec![page],
            focused: 0,
            elements: ElementRegistry::new(),
            closed: false,
        })
    }

    /// Fails with [`BrowserError::Closed`] once the session was quit or the
    /// connection handler stopped (browser crashed or socket dropped).
    fn ensure_alive(&self) -> Result<(), BrowserError> {
        if self.closed || self.handler.is_finished() {
            return Err(BrowserError::Closed);
        }
        Ok(())
    }

    fn page(&self) -> Result<&Page, BrowserError> {
        self.ensure_alive()?;
        self.pages.get(self.focused).ok_or(BrowserError::Closed)
    }

    fn element(&self, handle: ElementRef) -> Result<&Element, BrowserError> {
        self.ensure_alive()?;
        self.elements
            .get(handle)
            .ok_or(BrowserError::StaleElement(handle))
    }

    fn register(&mut self, element: Element) -> ElementRef {
        let node = *element.backend_node_id.inner();
        let handle = self.elements.insert(node, element);
        trace!(node, tracked = self.elements.len(), "element registered");
        handle
    }

    fn forget_elements(&mut self) {
        self.elements.clear();
    }

    async fn run_on(
        &self,
        handle: ElementRef,
        action: &'static str,
        body: &str,
    ) -> Result<(), BrowserError> {
        self.element(handle)?
            .call_js_fn(format!("function() {{ {body} }}"), false)
            .await
            .map_err(|e| cdp_error(action, e))?;
        Ok(())
    }

    async fn refresh_pages(&mut self) -> Result<(), BrowserError> {
        let focused_id = self
            .pages
            .get(self.focused)
            .map(|page| page.target_id().as_ref().to_string());
        if let Err(e) = self.browser.fetch_targets().await {
            debug!(error = %e, "target discovery failed");
        }
        self.pages = self
            .browser
            .pages()
            .await
            .map_err(|e| cdp_error("list windows", e))?;
        self.focused = focused_id
            .and_then(|id| {
                self.pages
                    .iter()
                    .position(|page| page.target_id().as_ref() == id)
            })
            .unwrap_or(0);
        Ok(())
    }
}

async fn launch_local(
    options: &ChromiumOptions,
) -> Result<(Browser, chromiumoxide::Handler), BrowserError> {
    let executable = match &options.executable {
        Some(path) => path.clone(),
        None => find_chrome()?,
    };
    info!(executable = %executable.display(), headless = options.headless, "launching browser");

    let mut builder = BrowserConfig::builder().chrome_executable(executable);
    if !options.headless {
        builder = builder.with_head();
    }
    if let Some(timeout) = options.request_timeout {
        builder = builder.request_timeout(timeout);
    }
    builder = builder
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-gpu")
        .arg("--window-size=1920,1080");
    for arg in &options.extra_args {
        builder = builder.arg(arg);
    }
    let config = builder.build().map_err(BrowserError::launch)?;

    Browser::launch(config)
        .await
        .map_err(|e| BrowserError::launch(e.to_string()))
}

async fn connect_remote(
    url: &str,
    request_timeout: Option<Duration>,
) -> Result<(Browser, chromiumoxide::Handler), BrowserError> {
    info!(url, "connecting to remote browser");
    let mut handler_config = HandlerConfig::default();
    if let Some(timeout) = request_timeout {
        handler_config.request_timeout = timeout;
    }
    Browser::connect_with_config(url, handler_config)
        .await
        .map_err(|e| BrowserError::launch(format!("cannot reach {url}: {e}")))
}

fn find_chrome() -> Result<PathBuf, BrowserError> {
    CHROME_PATHS
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            BrowserError::launch(
                "Chrome/Chromium not found; install it or set [browser] executable",
            )
        })
}

/// Maps a DevTools error onto [`BrowserError`].
///
/// A dropped socket, a closed command channel, or a silent browser means the
/// session is gone; everything else is a per-command failure.
fn cdp_error(action: &'static str, error: CdpError) -> BrowserError {
    match error {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            debug!(action, %error, "browser connection lost");
            BrowserError::Closed
        }
        other => BrowserError::protocol(action, other),
    }
}

/// Renders `value` as a JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.forget_elements();
        let page = self.page()?;
        page.goto(url)
            .await
            .map_err(|e| cdp_error("navigate", e))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| cdp_error("navigate", e))?;
        Ok(())
    }

    async fn find_element(&mut self, locator: &Locator) -> Result<Option<ElementRef>, BrowserError> {
        Ok(self.find_elements(locator).await?.into_iter().next())
    }

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<ElementRef>, BrowserError> {
        let found = self
            .page()?
            .find_elements(locator.to_css())
            .await
            .map_err(|e| cdp_error("find elements", e))?;
        Ok(found.into_iter().map(|el| self.register(el)).collect())
    }

    async fn find_within(
        &mut self,
        scope: ElementRef,
        locator: &Locator,
    ) -> Result<Option<ElementRef>, BrowserError> {
        let found = self
            .element(scope)?
            .find_elements(locator.to_css())
            .await
            .map_err(|e| cdp_error("find within", e))?;
        Ok(found.into_iter().next().map(|el| self.register(el)))
    }

    async fn list_children(
        &mut self,
        element: ElementRef,
        tag: &str,
    ) -> Result<Vec<ElementRef>, BrowserError> {
        let found = self
            .element(element)?
            .find_elements(tag)
            .await
            .map_err(|e| cdp_error("list children", e))?;
        Ok(found.into_iter().map(|el| self.register(el)).collect())
    }

    async fn attribute(
        &mut self,
        element: ElementRef,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let el = self.element(element)?;
        // Live properties first: `value` on an <option> is not always reflected.
        if name == "value" {
            let value = el
                .property("value")
                .await
                .map_err(|e| cdp_error("read attribute", e))?;
            if let Some(serde_json::Value::String(value)) = value {
                return Ok(Some(value));
            }
        }
        el.attribute(name)
            .await
            .map_err(|e| cdp_error("read attribute", e))
    }

    async fn text(&mut self, element: ElementRef) -> Result<String, BrowserError> {
        Ok(self
            .element(element)?
            .inner_text()
            .await
            .map_err(|e| cdp_error("read text", e))?
            .unwrap_or_default())
    }

    async fn set_control_value(&mut self, name: &str, value: &str) -> Result<(), BrowserError> {
        let script = format!(
            "(() => {{ const el = document.getElementsByName({}); if (!el.length) return false; el[0].value = {}; return true; }})()",
            js_string(name),
            js_string(value)
        );
        let found: bool = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| cdp_error("set control value", e))?
            .into_value()
            .map_err(|e| BrowserError::protocol("set control value", e))?;
        if found {
            Ok(())
        } else {
            Err(BrowserError::not_found(&Locator::name(name)))
        }
    }

    async fn clear_and_type(
        &mut self,
        element: ElementRef,
        text: &str,
    ) -> Result<(), BrowserError> {
        let body = format!("this.value = ''; this.value = {};", js_string(text));
        self.run_on(element, "fill text field", &body).await
    }

    async fn dispatch_event(
        &mut self,
        element: ElementRef,
        event: DomEvent,
    ) -> Result<(), BrowserError> {
        let body = format!(
            "this.dispatchEvent(new Event('{}', {{ bubbles: true }}));",
            event.as_str()
        );
        self.run_on(element, "dispatch event", &body).await
    }

    async fn click(&mut self, element: ElementRef, mode: ClickMode) -> Result<(), BrowserError> {
        match mode {
            ClickMode::Script => self.run_on(element, "script click", "this.click();").await,
            ClickMode::Native => {
                self.element(element)?
                    .click()
                    .await
                    .map_err(|e| cdp_error("native click", e))?;
                Ok(())
            }
        }
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        self.page()?
            .content()
            .await
            .map_err(|e| cdp_error("read page source", e))
    }

    async fn list_windows(&mut self) -> Result<Vec<WindowHandle>, BrowserError> {
        self.ensure_alive()?;
        self.refresh_pages().await?;
        Ok(self
            .pages
            .iter()
            .map(|page| WindowHandle(page.target_id().as_ref().to_string()))
            .collect())
    }

    async fn current_window(&mut self) -> Result<WindowHandle, BrowserError> {
        Ok(WindowHandle(self.page()?.target_id().as_ref().to_string()))
    }

    async fn switch_window(&mut self, handle: &WindowHandle) -> Result<(), BrowserError> {
        let position = match self.pages.iter().position(|p| p.target_id().as_ref() == handle.0) {
            Some(position) => position,
            None => {
                self.refresh_pages().await?;
                self.pages
                    .iter()
                    .position(|p| p.target_id().as_ref() == handle.0)
                    .ok_or_else(|| BrowserError::NoSuchWindow(handle.0.clone()))?
            }
        };
        self.focused = position;
        self.forget_elements();
        if let Err(e) = self.pages[position].bring_to_front().await {
            debug!(error = %e, "bring_to_front failed");
        }
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        Ok(self
            .page()?
            .url()
            .await
            .map_err(|e| cdp_error("read url", e))?
            .unwrap_or_default())
    }

    async fn close_window(&mut self) -> Result<(), BrowserError> {
        let page = self.page()?.clone();
        self.pages.remove(self.focused);
        self.focused = 0;
        self.forget_elements();
        page.close()
            .await
            .map_err(|e| cdp_error("close window", e))
    }

    async fn quit(&mut self) -> Result<(), BrowserError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.forget_elements();
        self.pages.clear();
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser close failed");
        }
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "browser wait failed");
        }
        self.handler.abort();
        info!("browser session released");
        Ok(())
    }
}
