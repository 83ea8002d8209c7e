//! Scripted in-memory portal implementing `BrowserSession`.
//!
//! Dropdown options are keyed by the parent selection, the leaf listing is
//! rendered as a paged results grid, and the per-leaf download control either
//! carries a parseable `onclick` or opens a popup when clicked.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use harvest_core::browser::{
    BrowserError, BrowserSession, ClickMode, DomEvent, ElementRef, Locator, WindowHandle,
};
use harvest_core::navigator::pagination::collect_anchors;
use harvest_core::portal::PortalProfile;

const MAIN_WINDOW: &str = "main";

/// Which lookups can see the download control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ControlExposure {
    /// The control carries the exact expected id.
    #[default]
    ExactId,
    /// Only an id substring matches, anywhere in the document.
    IdFragment,
    /// Only the loose id substring matches, and only inside the results table.
    ScopedOnly,
}

/// How the download control behaves for one leaf.
#[derive(Debug, Clone, Default)]
pub struct LeafScript {
    /// `onclick` attribute of the control.
    pub onclick: Option<String>,
    /// Address of the popup a click opens.
    pub popup_url: Option<String>,
    /// Address the original window moves to on click.
    pub same_tab_url: Option<String>,
    /// Lookups that find the control.
    pub exposure: ControlExposure,
    /// Script clicks on the control fail; native clicks work.
    pub script_click_fails: bool,
}

impl LeafScript {
    pub fn onclick(handler: &str) -> Self {
        Self {
            onclick: Some(handler.to_string()),
            ..Self::default()
        }
    }

    pub fn popup(url: &str) -> Self {
        Self {
            popup_url: Some(url.to_string()),
            ..Self::default()
        }
    }

    pub fn same_tab(url: &str) -> Self {
        Self {
            same_tab_url: Some(url.to_string()),
            ..Self::default()
        }
    }

    pub fn exposed(mut self, exposure: ControlExposure) -> Self {
        self.exposure = exposure;
        self
    }

    pub fn rejecting_script_clicks(mut self) -> Self {
        self.script_click_fails = true;
        self
    }
}

/// Static description of the simulated portal.
#[derive(Debug, Clone)]
pub struct FakePortal {
    pub profile: PortalProfile,
    options: HashMap<(String, String), Vec<(String, String)>>,
    listings: HashMap<String, Vec<Vec<String>>>,
    leaves: HashMap<String, LeafScript>,
}

impl FakePortal {
    pub fn new(profile: PortalProfile) -> Self {
        Self {
            profile,
            options: HashMap::new(),
            listings: HashMap::new(),
            leaves: HashMap::new(),
        }
    }

    /// Options shown by `control` while its parent holds `parent` ("" for the
    /// first level).
    pub fn with_options(mut self, control: &str, parent: &str, options: &[(&str, &str)]) -> Self {
        self.options.insert(
            (control.to_string(), parent.to_string()),
            options
                .iter()
                .map(|(value, label)| ((*value).to_string(), (*label).to_string()))
                .collect(),
        );
        self
    }

    /// Leaf-name pages shown after selecting sub-sub-region `value`.
    pub fn with_listing(mut self, value: &str, pages: &[&[&str]]) -> Self {
        self.listings.insert(
            value.to_string(),
            pages
                .iter()
                .map(|page| page.iter().map(|name| (*name).to_string()).collect())
                .collect(),
        );
        self
    }

    /// Download control behavior when the leaf filter holds `label`.
    pub fn with_leaf(mut self, label: &str, script: LeafScript) -> Self {
        self.leaves.insert(label.to_string(), script);
        self
    }
}

/// Interaction counters observable after the session has been moved.
#[derive(Debug, Clone, Default)]
pub struct FakeStats {
    pub navigations: usize,
    pub action_clicks: usize,
    pub page_clicks: usize,
    pub native_clicks: usize,
    pub rejected_clicks: usize,
    pub windows_opened: usize,
    pub windows_closed: usize,
    /// Locators that found the download control, in lookup order.
    pub control_found_by: Vec<String>,
    pub quit: bool,
}

#[derive(Debug, Clone)]
enum Node {
    Control(String),
    Choice { value: String, label: String },
    ResultsTable,
    ActionControl,
    Anchor(usize),
}

pub struct FakeBrowser {
    portal: FakePortal,
    nodes: Vec<Node>,
    loaded: bool,
    selected: HashMap<String, String>,
    filter: String,
    searched: bool,
    page: usize,
    windows: Vec<(WindowHandle, String)>,
    focused: Option<usize>,
    closed: bool,
    crash_after: Option<usize>,
    stats: Arc<Mutex<FakeStats>>,
}

impl FakeBrowser {
    pub fn new(portal: FakePortal) -> Self {
        Self {
            portal,
            nodes: Vec::new(),
            loaded: false,
            selected: HashMap::new(),
            filter: String::new(),
            searched: false,
            page: 0,
            windows: vec![(WindowHandle(MAIN_WINDOW.to_string()), "about:blank".to_string())],
            focused: Some(0),
            closed: false,
            crash_after: None,
            stats: Arc::new(Mutex::new(FakeStats::default())),
        }
    }

    /// The browser dies on the navigation after the first `navigations`.
    pub fn crashing_after(mut self, navigations: usize) -> Self {
        self.crash_after = Some(navigations);
        self
    }

    /// Handle on the counters that stays valid after the browser is moved.
    pub fn stats_handle(&self) -> Arc<Mutex<FakeStats>> {
        Arc::clone(&self.stats)
    }

    pub fn main_window() -> WindowHandle {
        WindowHandle(MAIN_WINDOW.to_string())
    }

    fn bump(&self, update: impl FnOnce(&mut FakeStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            update(&mut stats);
        }
    }

    fn check_open(&self) -> Result<(), BrowserError> {
        if self.closed {
            return Err(BrowserError::Closed);
        }
        Ok(())
    }

    fn register(&mut self, node: Node) -> ElementRef {
        self.nodes.push(node);
        ElementRef(self.nodes.len() as u64 - 1)
    }

    fn node(&self, element: ElementRef) -> Result<Node, BrowserError> {
        usize::try_from(element.0)
            .ok()
            .and_then(|index| self.nodes.get(index))
            .cloned()
            .ok_or(BrowserError::StaleElement(element))
    }

    fn focused(&self) -> Result<usize, BrowserError> {
        self.focused
            .ok_or_else(|| BrowserError::NoSuchWindow("<none>".to_string()))
    }

    fn controls(&self) -> [&str; 5] {
        let p = &self.portal.profile;
        [
            &p.region_control,
            &p.sub_region_control,
            &p.sub_sub_region_control,
            &p.leaf_filter_control,
            &p.search_control,
        ]
    }

    fn parent_of(&self, control: &str) -> Option<String> {
        let p = &self.portal.profile;
        if control == p.region_control {
            Some(String::new())
        } else if control == p.sub_region_control {
            self.selected.get(&p.region_control).cloned()
        } else if control == p.sub_sub_region_control {
            self.selected.get(&p.sub_region_control).cloned()
        } else {
            None
        }
    }

    fn options_for(&self, control: &str) -> Vec<(String, String)> {
        self.parent_of(control)
            .and_then(|parent| self.portal.options.get(&(control.to_string(), parent)))
            .cloned()
            .unwrap_or_default()
    }

    fn leaf_script(&self) -> Option<&LeafScript> {
        if !self.searched {
            return None;
        }
        self.portal.leaves.get(&self.filter)
    }

    fn listing_pages(&self) -> Option<&Vec<Vec<String>>> {
        self.selected
            .get(&self.portal.profile.sub_sub_region_control)
            .and_then(|value| self.portal.listings.get(value))
    }

    fn render(&self) -> String {
        let Some(pages) = self.listing_pages() else {
            return "<html><body><form></form></body></html>".to_string();
        };
        let total = pages.len();
        let current = self.page.min(total.saturating_sub(1));
        let mut html = String::from(
            "<html><body><table id=\"grdVillages\"><tr><th>Sl No</th><th>Village Name</th></tr>",
        );
        for (row, name) in pages.get(current).into_iter().flatten().enumerate() {
            let _ = write!(html, "<tr><td>{}</td><td>{name}</td></tr>", row + 1);
        }
        if total > 1 {
            let _ = write!(
                html,
                "<tr><td colspan=\"2\">Page {} of {total}</td></tr><tr><td colspan=\"2\"><table><tr>",
                current + 1
            );
            for number in 1..=total {
                if number == current + 1 {
                    let _ = write!(html, "<td><span>{number}</span></td>");
                } else {
                    let _ = write!(
                        html,
                        "<td><a href=\"javascript:__doPostBack('grdVillages','Page${number}')\">{number}</a></td>"
                    );
                }
            }
            html.push_str("</tr></table></td></tr>");
        }
        html.push_str("</table></body></html>");
        html
    }

    fn clear_below(&mut self, control: &str) {
        let p = self.portal.profile.clone();
        if control == p.region_control {
            self.selected.remove(&p.sub_region_control);
            self.selected.remove(&p.sub_sub_region_control);
        } else if control == p.sub_region_control {
            self.selected.remove(&p.sub_sub_region_control);
        }
        self.searched = false;
        self.page = 0;
    }

    fn matches_action_control(&self, locator: &Locator, scoped: bool) -> bool {
        let p = &self.portal.profile;
        let Some(script) = self.leaf_script() else {
            return false;
        };
        match (script.exposure, locator) {
            (ControlExposure::ExactId, Locator::Id(id)) => *id == p.action_control_id,
            (ControlExposure::ExactId, Locator::Css(css)) => {
                css.contains(&p.action_control_scoped_fragment)
            }
            (ControlExposure::IdFragment, Locator::Css(css)) => {
                css.contains(&p.action_control_id_fragment)
            }
            (ControlExposure::ScopedOnly, Locator::Css(css)) => {
                scoped && css.contains(&p.action_control_scoped_fragment)
            }
            _ => false,
        }
    }

    fn action_control(&mut self, locator: &Locator) -> ElementRef {
        let found_by = locator.to_string();
        self.bump(|s| s.control_found_by.push(found_by));
        self.register(Node::ActionControl)
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.check_open()?;
        let navigations = self.stats.lock().map(|s| s.navigations).unwrap_or(0);
        if self.crash_after.is_some_and(|limit| navigations >= limit) {
            self.closed = true;
            return Err(BrowserError::Closed);
        }
        let focused = self.focused()?;
        self.windows[focused].1 = url.to_string();
        self.loaded = true;
        self.selected.clear();
        self.filter.clear();
        self.searched = false;
        self.page = 0;
        self.nodes.clear();
        self.bump(|s| s.navigations += 1);
        Ok(())
    }

    async fn find_element(&mut self, locator: &Locator) -> Result<Option<ElementRef>, BrowserError> {
        self.check_open()?;
        if !self.loaded {
            return Ok(None);
        }
        if let Locator::Name(name) = locator {
            if self.controls().contains(&name.as_str()) {
                let name = name.clone();
                return Ok(Some(self.register(Node::Control(name))));
            }
            return Ok(None);
        }
        if *locator == Locator::css(&self.portal.profile.results_table_selector) {
            if self.leaf_script().is_some() {
                return Ok(Some(self.register(Node::ResultsTable)));
            }
            return Ok(None);
        }
        if self.matches_action_control(locator, false) {
            return Ok(Some(self.action_control(locator)));
        }
        Ok(None)
    }

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<ElementRef>, BrowserError> {
        self.check_open()?;
        if *locator != Locator::css("a") {
            return Ok(self.find_element(locator).await?.into_iter().collect());
        }
        let count = collect_anchors(&self.render()).len();
        Ok((0..count).map(|index| self.register(Node::Anchor(index))).collect())
    }

    async fn find_within(
        &mut self,
        scope: ElementRef,
        locator: &Locator,
    ) -> Result<Option<ElementRef>, BrowserError> {
        self.check_open()?;
        match self.node(scope)? {
            Node::ResultsTable if self.matches_action_control(locator, true) => {
                Ok(Some(self.action_control(locator)))
            }
            _ => Ok(None),
        }
    }

    async fn list_children(
        &mut self,
        element: ElementRef,
        tag: &str,
    ) -> Result<Vec<ElementRef>, BrowserError> {
        self.check_open()?;
        let Node::Control(control) = self.node(element)? else {
            return Ok(Vec::new());
        };
        if tag != "option" {
            return Ok(Vec::new());
        }
        let mut children = vec![self.register(Node::Choice {
            value: "0".to_string(),
            label: "--Select--".to_string(),
        })];
        for (value, label) in self.options_for(&control) {
            children.push(self.register(Node::Choice { value, label }));
        }
        Ok(children)
    }

    async fn attribute(
        &mut self,
        element: ElementRef,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        self.check_open()?;
        Ok(match (self.node(element)?, name) {
            (Node::Choice { value, .. }, "value") => Some(value),
            (Node::ActionControl, "onclick") => {
                self.leaf_script().and_then(|script| script.onclick.clone())
            }
            _ => None,
        })
    }

    async fn text(&mut self, element: ElementRef) -> Result<String, BrowserError> {
        self.check_open()?;
        Ok(match self.node(element)? {
            Node::Choice { label, .. } => label,
            _ => String::new(),
        })
    }

    async fn set_control_value(&mut self, name: &str, value: &str) -> Result<(), BrowserError> {
        self.check_open()?;
        if !self.loaded || !self.controls().contains(&name) {
            return Err(BrowserError::not_found(&Locator::name(name)));
        }
        self.clear_below(name);
        self.selected.insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn clear_and_type(&mut self, element: ElementRef, text: &str) -> Result<(), BrowserError> {
        self.check_open()?;
        if let Node::Control(control) = self.node(element)? {
            if control == self.portal.profile.leaf_filter_control {
                self.filter = text.to_string();
            }
        }
        Ok(())
    }

    async fn dispatch_event(&mut self, element: ElementRef, _event: DomEvent) -> Result<(), BrowserError> {
        self.check_open()?;
        self.node(element).map(|_| ())
    }

    async fn click(&mut self, element: ElementRef, mode: ClickMode) -> Result<(), BrowserError> {
        self.check_open()?;
        match self.node(element)? {
            Node::Control(control) if control == self.portal.profile.search_control => {
                self.searched = true;
            }
            Node::Anchor(index) => {
                let anchors = collect_anchors(&self.render());
                if let Some(number) = anchors
                    .get(index)
                    .and_then(|anchor| anchor.text.parse::<usize>().ok())
                {
                    self.page = number - 1;
                }
                self.bump(|s| s.page_clicks += 1);
            }
            Node::ActionControl => {
                let script = self.leaf_script().cloned().unwrap_or_default();
                if script.script_click_fails && mode == ClickMode::Script {
                    self.bump(|s| s.rejected_clicks += 1);
                    return Err(BrowserError::protocol("click", "element is not clickable"));
                }
                self.bump(|s| {
                    s.action_clicks += 1;
                    if mode == ClickMode::Native {
                        s.native_clicks += 1;
                    }
                });
                if let Some(url) = script.popup_url {
                    let handle = WindowHandle(format!("popup-{}", self.windows.len()));
                    self.windows.push((handle, url));
                    self.bump(|s| s.windows_opened += 1);
                } else if let Some(url) = script.same_tab_url {
                    let focused = self.focused()?;
                    self.windows[focused].1 = url;
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        self.check_open()?;
        Ok(self.render())
    }

    async fn list_windows(&mut self) -> Result<Vec<WindowHandle>, BrowserError> {
        self.check_open()?;
        Ok(self.windows.iter().map(|(handle, _)| handle.clone()).collect())
    }

    async fn current_window(&mut self) -> Result<WindowHandle, BrowserError> {
        self.check_open()?;
        Ok(self.windows[self.focused()?].0.clone())
    }

    async fn switch_window(&mut self, handle: &WindowHandle) -> Result<(), BrowserError> {
        self.check_open()?;
        let index = self
            .windows
            .iter()
            .position(|(h, _)| h == handle)
            .ok_or_else(|| BrowserError::NoSuchWindow(handle.0.clone()))?;
        self.focused = Some(index);
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        self.check_open()?;
        Ok(self.windows[self.focused()?].1.clone())
    }

    async fn close_window(&mut self) -> Result<(), BrowserError> {
        self.check_open()?;
        let focused = self.focused()?;
        self.windows.remove(focused);
        self.focused = None;
        self.bump(|s| s.windows_closed += 1);
        Ok(())
    }

    async fn quit(&mut self) -> Result<(), BrowserError> {
        self.closed = true;
        self.bump(|s| s.quit = true);
        Ok(())
    }
}
