//! Cascade navigator: drives the four dependent dropdown levels.
//!
//! Selecting a level is a three-step protocol: set the control's value, raise
//! `change`, then wait (bounded) for the dependent control to repopulate. A
//! dependent level with no real options is an empty branch, which is a normal
//! outcome and not a fault. The terminal level's listing comes from the
//! results table and may span several pages.

mod discovery;
mod error;
mod listing;
pub mod pagination;

pub use discovery::discover;
pub use error::NavigatorError;
pub use listing::extract_leaf_names;

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::browser::{BrowserError, BrowserSession, ClickMode, DomEvent, Locator, WAIT_POLL_INTERVAL};
use crate::catalog::PathSegment;
use crate::failure::FailureKind;
use crate::portal::PortalProfile;
use pagination::{choose_page_control, collect_anchors, detect_total_pages};

/// Bounded waits used while driving the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeTiming {
    /// Wait for a cascade control to exist.
    pub control_wait: Duration,
    /// Wait for the results table after a search.
    pub results_wait: Duration,
    /// Wait after a click before diffing windows.
    pub popup_wait: Duration,
    /// Pause after a selection or page change before reading the page.
    pub settle_delay: Duration,
}

impl Default for CascadeTiming {
    fn default() -> Self {
        Self {
            control_wait: Duration::from_secs(10),
            results_wait: Duration::from_secs(15),
            popup_wait: Duration::from_millis(1000),
            settle_delay: Duration::from_millis(500),
        }
    }
}

/// One of the three selectable cascade levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeLevel {
    /// First dropdown.
    Region,
    /// Second dropdown.
    SubRegion,
    /// Third dropdown; selecting it renders the leaf table.
    SubSubRegion,
}

impl CascadeLevel {
    /// Control `name` for this level.
    #[must_use]
    pub fn control(self, portal: &PortalProfile) -> &str {
        match self {
            Self::Region => &portal.region_control,
            Self::SubRegion => &portal.sub_region_control,
            Self::SubSubRegion => &portal.sub_sub_region_control,
        }
    }

    /// Control repopulated by selecting this level; `None` for the terminal
    /// level, whose children come from the results table.
    #[must_use]
    pub fn dependent(self, portal: &PortalProfile) -> Option<&str> {
        match self {
            Self::Region => Some(&portal.sub_region_control),
            Self::SubRegion => Some(&portal.sub_sub_region_control),
            Self::SubSubRegion => None,
        }
    }
}

impl fmt::Display for CascadeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Region => "region",
            Self::SubRegion => "sub-region",
            Self::SubSubRegion => "sub-sub-region",
        })
    }
}

/// Why a selection stopped before producing a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Halt {
    /// Level whose selection halted.
    pub level: CascadeLevel,
    /// [`FailureKind::EmptyBranch`] or [`FailureKind::TransientUi`].
    pub kind: FailureKind,
    /// Human-readable detail.
    pub reason: String,
}

/// Outcome of a cascade selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    /// True if every level settled and the listing is meaningful.
    pub ok: bool,
    /// Ordered next-level options (for the terminal level, leaf names with
    /// 1-based positional values).
    pub listing: Vec<PathSegment>,
    /// Set when `ok` is false.
    pub halt: Option<Halt>,
}

impl Selection {
    fn settled(listing: Vec<PathSegment>) -> Self {
        Self {
            ok: true,
            listing,
            halt: None,
        }
    }

    fn halted(level: CascadeLevel, kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            listing: Vec::new(),
            halt: Some(Halt {
                level,
                kind,
                reason: reason.into(),
            }),
        }
    }

    /// True if the selection stopped on a legitimately empty branch.
    #[must_use]
    pub fn is_empty_branch(&self) -> bool {
        self.halt
            .as_ref()
            .is_some_and(|halt| halt.kind == FailureKind::EmptyBranch)
    }
}

/// Converts a browser error into a halted selection unless it is fatal.
fn halt_or_escalate(level: CascadeLevel, error: BrowserError) -> Result<Selection, NavigatorError> {
    let kind = error.failure_kind();
    if kind.is_fatal() {
        return Err(NavigatorError::session(level, error));
    }
    debug!(%level, %error, "selection halted");
    Ok(Selection::halted(level, kind, error.to_string()))
}

/// Assigns 1-based positional values to leaf names.
#[must_use]
pub fn number_leaves(names: Vec<String>) -> Vec<PathSegment> {
    names
        .into_iter()
        .enumerate()
        .map(|(index, name)| PathSegment::new((index + 1).to_string(), name))
        .collect()
}

/// Drives the cascade on one browser session.
#[derive(Debug, Clone)]
pub struct CascadeNavigator {
    portal: PortalProfile,
    timing: CascadeTiming,
}

impl CascadeNavigator {
    /// Creates a navigator for `portal`.
    #[must_use]
    pub fn new(portal: PortalProfile, timing: CascadeTiming) -> Self {
        Self { portal, timing }
    }

    /// Portal description in use.
    #[must_use]
    pub fn portal(&self) -> &PortalProfile {
        &self.portal
    }

    /// Wait bounds in use.
    #[must_use]
    pub fn timing(&self) -> CascadeTiming {
        self.timing
    }

    /// Loads the portal entry page and waits for the first cascade control.
    ///
    /// # Errors
    ///
    /// Returns the session error if the page or control never appears.
    pub async fn open<S>(&self, session: &mut S) -> Result<(), BrowserError>
    where
        S: BrowserSession + ?Sized,
    {
        session.navigate(&self.portal.base_url).await?;
        session
            .wait_for(
                &Locator::name(&self.portal.region_control),
                self.timing.control_wait,
            )
            .await?;
        Ok(())
    }

    /// Reads the real (non-placeholder) options of a dropdown.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::NotFound`] if the control is absent.
    pub async fn read_options<S>(
        &self,
        session: &mut S,
        control: &str,
    ) -> Result<Vec<PathSegment>, BrowserError>
    where
        S: BrowserSession + ?Sized,
    {
        let locator = Locator::name(control);
        let select = session
            .find_element(&locator)
            .await?
            .ok_or_else(|| BrowserError::not_found(&locator))?;
        let mut options = Vec::new();
        for option in session.list_children(select, "option").await? {
            let value = session.attribute(option, "value").await?.unwrap_or_default();
            if PortalProfile::is_placeholder(&value) {
                continue;
            }
            let label = session.text(option).await?.trim().to_string();
            options.push(PathSegment::new(value.trim(), label));
        }
        Ok(options)
    }

    /// Sets a level's value and raises `change`, then lets the page settle.
    ///
    /// # Errors
    ///
    /// Returns the session error if the control never appears or rejects the
    /// value.
    pub async fn select_level<S>(
        &self,
        session: &mut S,
        level: CascadeLevel,
        value: &str,
    ) -> Result<(), BrowserError>
    where
        S: BrowserSession + ?Sized,
    {
        let control = level.control(&self.portal);
        let element = session
            .wait_for(&Locator::name(control), self.timing.control_wait)
            .await?;
        session.set_control_value(control, value).await?;
        session.dispatch_event(element, DomEvent::Change).await?;
        debug!(%level, control, value, "level selected");
        tokio::time::sleep(self.timing.settle_delay).await;
        Ok(())
    }

    /// Waits for `control` to exist and then polls its options until some
    /// appear or the settle window closes.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Timeout`] if the control never appears.
    pub async fn await_options<S>(
        &self,
        session: &mut S,
        control: &str,
    ) -> Result<Vec<PathSegment>, BrowserError>
    where
        S: BrowserSession + ?Sized,
    {
        session
            .wait_for(&Locator::name(control), self.timing.control_wait)
            .await?;
        let deadline = Instant::now() + self.timing.settle_delay;
        loop {
            let options = self.read_options(session, control).await?;
            if !options.is_empty() || Instant::now() >= deadline {
                return Ok(options);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Selects one level and returns what appears beneath it.
    ///
    /// # Errors
    ///
    /// Only fatal session failures are returned; timeouts and empty branches
    /// come back as a halted [`Selection`].
    #[instrument(skip(self, session), fields(level = %level))]
    pub async fn select_and_list<S>(
        &self,
        session: &mut S,
        level: CascadeLevel,
        value: &str,
    ) -> Result<Selection, NavigatorError>
    where
        S: BrowserSession + ?Sized,
    {
        if let Err(error) = self.select_level(session, level, value).await {
            return halt_or_escalate(level, error);
        }

        let listing = match level.dependent(&self.portal) {
            Some(dependent) => match self.await_options(session, dependent).await {
                Ok(options) => options,
                Err(error) => return halt_or_escalate(level, error),
            },
            None => match self.extract_listing(session).await {
                Ok(names) => number_leaves(names),
                Err(error) => return halt_or_escalate(level, error),
            },
        };

        if listing.is_empty() {
            return Ok(Selection::halted(
                level,
                FailureKind::EmptyBranch,
                format!("no options beneath {level} '{value}'"),
            ));
        }
        Ok(Selection::settled(listing))
    }

    /// Drives Region → SubRegion → SubSubRegion from a fresh page and returns
    /// the leaf listing beneath the last level.
    ///
    /// # Errors
    ///
    /// Only fatal session failures are returned.
    #[instrument(skip(self, session))]
    pub async fn select_path<S>(
        &self,
        session: &mut S,
        region: &str,
        sub_region: &str,
        sub_sub_region: &str,
    ) -> Result<Selection, NavigatorError>
    where
        S: BrowserSession + ?Sized,
    {
        if let Err(error) = self.open(session).await {
            return halt_or_escalate(CascadeLevel::Region, error);
        }
        let steps = [
            (CascadeLevel::Region, region),
            (CascadeLevel::SubRegion, sub_region),
            (CascadeLevel::SubSubRegion, sub_sub_region),
        ];
        let mut selection = Selection::default();
        for (level, value) in steps {
            selection = self.select_and_list(session, level, value).await?;
            if !selection.ok {
                return Ok(selection);
            }
        }
        Ok(selection)
    }

    /// Reads every page of the current results table and returns the ordered,
    /// deduplicated leaf names.
    ///
    /// # Errors
    ///
    /// Returns the session error if the page source cannot be read.
    pub async fn extract_listing<S>(&self, session: &mut S) -> Result<Vec<String>, BrowserError>
    where
        S: BrowserSession + ?Sized,
    {
        let mut html = session.page_source().await?;
        let pages = detect_total_pages(&html);
        debug!(total = pages.total, method = ?pages.method, "listing pagination");

        let mut names = extract_leaf_names(&html, &self.portal);
        for page in 2..=pages.total {
            match choose_page_control(&collect_anchors(&html), page) {
                Some((index, strategy)) => {
                    let anchors = session.find_elements(&Locator::css("a")).await?;
                    match anchors.get(index) {
                        Some(anchor) => {
                            debug!(page, ?strategy, "changing results page");
                            session.click(*anchor, ClickMode::Script).await?;
                            tokio::time::sleep(self.timing.settle_delay).await;
                        }
                        None => warn!(page, index, "page control vanished before click"),
                    }
                }
                None => warn!(page, "no control for results page; reading current page"),
            }
            html = session.page_source().await?;
            names.extend(extract_leaf_names(&html, &self.portal));
        }

        let mut seen = HashSet::new();
        names.retain(|name| seen.insert(name.clone()));
        Ok(names)
    }
}
