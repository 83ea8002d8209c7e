//! Document resolver: turns a leaf path into a downloadable document URL.
//!
//! Resolution is an explicit state machine:
//!
//! ```text
//! Navigate → SelectRegion → SelectSubRegion → SelectSubSubRegion
//!   → EnterLeafFilter → Search → AwaitResults → LocateActionControl
//!   → ExtractUrl → done
//! ```
//!
//! Any state may fail on a bounded wait or a missing control. A failure is
//! reported as a [`ResolveFailure`] naming the state, and [`DocumentResolver::resolve`]
//! downgrades it to `None`. Retrying is the orchestrator's job.

mod extract;
mod locate;

pub use extract::{EXTRACT_STRATEGIES, ExtractStrategy, HandlerPatterns, parse_handler};
pub use locate::{ControlLocator, ControlScope, action_control_locators, locate_action_control};

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::browser::{BrowserError, BrowserSession, ClickMode, DomEvent, ElementRef, Locator};
use crate::catalog::LeafPath;
use crate::failure::FailureKind;
use crate::navigator::{CascadeLevel, CascadeNavigator};

/// States of a single resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    /// Load the portal entry page.
    Navigate,
    /// Select the region.
    SelectRegion,
    /// Check the sub-region options, then select.
    SelectSubRegion,
    /// Check the sub-sub-region options, then select.
    SelectSubSubRegion,
    /// Fill the free-text leaf filter.
    EnterLeafFilter,
    /// Press search.
    Search,
    /// Wait for the results table.
    AwaitResults,
    /// Find the download affordance.
    LocateActionControl,
    /// Derive the URL from the affordance.
    ExtractUrl,
}

impl fmt::Display for ResolveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Navigate => "NAVIGATE",
            Self::SelectRegion => "SELECT_REGION",
            Self::SelectSubRegion => "SELECT_SUBREGION",
            Self::SelectSubSubRegion => "SELECT_SUBSUBREGION",
            Self::EnterLeafFilter => "ENTER_LEAF_FILTER",
            Self::Search => "SEARCH",
            Self::AwaitResults => "AWAIT_RESULTS",
            Self::LocateActionControl => "LOCATE_ACTION_CONTROL",
            Self::ExtractUrl => "EXTRACT_URL",
        };
        f.write_str(name)
    }
}

/// Why a resolution failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("resolution failed at {state} ({kind}): {reason}")]
pub struct ResolveFailure {
    /// State that failed.
    pub state: ResolveState,
    /// Failure classification.
    pub kind: FailureKind,
    /// Human-readable detail.
    pub reason: String,
}

impl ResolveFailure {
    /// Creates a failure.
    pub fn new(state: ResolveState, kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            state,
            kind,
            reason: reason.into(),
        }
    }

    /// Wraps a session error raised in `state`.
    #[must_use]
    pub fn from_browser(state: ResolveState, error: &BrowserError) -> Self {
        Self::new(state, error.failure_kind(), error.to_string())
    }

    /// A control or listing that should exist was absent.
    pub fn missing(state: ResolveState, what: impl Into<String>) -> Self {
        Self::new(state, FailureKind::TransientUi, what)
    }
}

/// Resolves leaf paths for the orchestrator.
#[async_trait]
pub trait LeafResolver: Send {
    /// Resolves `path`, reporting why it failed.
    async fn try_resolve(&mut self, path: &LeafPath) -> Result<String, ResolveFailure>;

    /// Resolves `path`, downgrading any failure to `None`.
    async fn resolve(&mut self, path: &LeafPath) -> Option<String> {
        match self.try_resolve(path).await {
            Ok(url) => Some(url),
            Err(failure) => {
                warn!(leaf = %path, %failure, "resolution failed");
                None
            }
        }
    }

    /// Releases any held session. Called once when a run ends.
    async fn release(&mut self) -> Result<(), BrowserError> {
        Ok(())
    }
}

enum Transition {
    Next(ResolveState),
    Resolved(String),
}

#[derive(Default)]
struct Scratch {
    results: Option<ElementRef>,
    control: Option<ElementRef>,
}

/// Drives one browser session through the resolution state machine.
#[derive(Debug, Clone)]
pub struct DocumentResolver {
    navigator: CascadeNavigator,
    patterns: HandlerPatterns,
    control_locators: Vec<ControlLocator>,
    strategies: Vec<ExtractStrategy>,
}

impl DocumentResolver {
    /// Creates a resolver over `navigator`'s portal.
    ///
    /// # Errors
    ///
    /// Returns the regex error if the handler patterns cannot be built.
    pub fn new(navigator: CascadeNavigator) -> Result<Self, regex::Error> {
        let patterns = HandlerPatterns::new(navigator.portal())?;
        let control_locators = action_control_locators(navigator.portal());
        Ok(Self {
            navigator,
            patterns,
            control_locators,
            strategies: EXTRACT_STRATEGIES.to_vec(),
        })
    }

    /// Navigator in use.
    #[must_use]
    pub fn navigator(&self) -> &CascadeNavigator {
        &self.navigator
    }

    /// Resolves `path` to a URL, or `None` on any failure.
    pub async fn resolve<S>(&self, session: &mut S, path: &LeafPath) -> Option<String>
    where
        S: BrowserSession + ?Sized,
    {
        match self.resolve_detailed(session, path).await {
            Ok(url) => Some(url),
            Err(failure) => {
                warn!(leaf = %path, %failure, "resolution failed");
                None
            }
        }
    }

    /// Resolves `path`, naming the state that failed.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolveFailure`] from the first state that cannot proceed.
    #[instrument(skip(self, session, path), fields(leaf = %path.key()))]
    pub async fn resolve_detailed<S>(
        &self,
        session: &mut S,
        path: &LeafPath,
    ) -> Result<String, ResolveFailure>
    where
        S: BrowserSession + ?Sized,
    {
        let mut scratch = Scratch::default();
        let mut state = ResolveState::Navigate;
        loop {
            debug!(%state, "resolve state");
            match self.step(session, path, state, &mut scratch).await? {
                Transition::Next(next) => state = next,
                Transition::Resolved(url) => {
                    debug!(%url, "resolved");
                    return Ok(url);
                }
            }
        }
    }

    async fn step<S>(
        &self,
        session: &mut S,
        path: &LeafPath,
        state: ResolveState,
        scratch: &mut Scratch,
    ) -> Result<Transition, ResolveFailure>
    where
        S: BrowserSession + ?Sized,
    {
        let portal = self.navigator.portal();
        let timing = self.navigator.timing();
        let fail = |error: BrowserError| ResolveFailure::from_browser(state, &error);

        match state {
            ResolveState::Navigate => {
                self.navigator.open(session).await.map_err(fail)?;
                Ok(Transition::Next(ResolveState::SelectRegion))
            }
            ResolveState::SelectRegion => {
                self.navigator
                    .select_level(session, CascadeLevel::Region, &path.region.value)
                    .await
                    .map_err(fail)?;
                Ok(Transition::Next(ResolveState::SelectSubRegion))
            }
            ResolveState::SelectSubRegion => {
                self.require_options(session, CascadeLevel::SubRegion, state)
                    .await?;
                self.navigator
                    .select_level(session, CascadeLevel::SubRegion, &path.sub_region.value)
                    .await
                    .map_err(fail)?;
                Ok(Transition::Next(ResolveState::SelectSubSubRegion))
            }
            ResolveState::SelectSubSubRegion => {
                self.require_options(session, CascadeLevel::SubSubRegion, state)
                    .await?;
                self.navigator
                    .select_level(
                        session,
                        CascadeLevel::SubSubRegion,
                        &path.sub_sub_region.value,
                    )
                    .await
                    .map_err(fail)?;
                Ok(Transition::Next(ResolveState::EnterLeafFilter))
            }
            ResolveState::EnterLeafFilter => {
                let field = session
                    .wait_for(&Locator::name(&portal.leaf_filter_control), timing.control_wait)
                    .await
                    .map_err(fail)?;
                session
                    .clear_and_type(field, &path.leaf.label)
                    .await
                    .map_err(fail)?;
                session
                    .dispatch_event(field, DomEvent::Input)
                    .await
                    .map_err(fail)?;
                session
                    .dispatch_event(field, DomEvent::Change)
                    .await
                    .map_err(fail)?;
                Ok(Transition::Next(ResolveState::Search))
            }
            ResolveState::Search => {
                let button = session
                    .wait_for(&Locator::name(&portal.search_control), timing.control_wait)
                    .await
                    .map_err(fail)?;
                session
                    .click(button, ClickMode::Native)
                    .await
                    .map_err(fail)?;
                Ok(Transition::Next(ResolveState::AwaitResults))
            }
            ResolveState::AwaitResults => {
                let table = session
                    .wait_for(
                        &Locator::css(&portal.results_table_selector),
                        timing.results_wait,
                    )
                    .await
                    .map_err(fail)?;
                tokio::time::sleep(timing.settle_delay).await;
                scratch.results = Some(table);
                Ok(Transition::Next(ResolveState::LocateActionControl))
            }
            ResolveState::LocateActionControl => {
                let table = scratch
                    .results
                    .ok_or_else(|| ResolveFailure::missing(state, "results table"))?;
                let control = locate_action_control(session, table, &self.control_locators)
                    .await
                    .map_err(fail)?
                    .ok_or_else(|| ResolveFailure::missing(state, "no download control in results"))?;
                scratch.control = Some(control);
                Ok(Transition::Next(ResolveState::ExtractUrl))
            }
            ResolveState::ExtractUrl => {
                let control = scratch
                    .control
                    .ok_or_else(|| ResolveFailure::missing(state, "download control"))?;
                self.extract_url(session, control)
                    .await?
                    .map(Transition::Resolved)
                    .ok_or_else(|| {
                        ResolveFailure::missing(state, "no strategy produced a download address")
                    })
            }
        }
    }

    /// Fails with an empty-branch resolution if `level`'s dropdown shows no
    /// real options.
    async fn require_options<S>(
        &self,
        session: &mut S,
        level: CascadeLevel,
        state: ResolveState,
    ) -> Result<(), ResolveFailure>
    where
        S: BrowserSession + ?Sized,
    {
        let control = level.control(self.navigator.portal());
        let options = self
            .navigator
            .await_options(session, control)
            .await
            .map_err(|error| ResolveFailure::from_browser(state, &error))?;
        if options.is_empty() {
            return Err(ResolveFailure::new(
                state,
                FailureKind::EmptyBranch,
                format!("{level} dropdown has no options"),
            ));
        }
        Ok(())
    }

    /// Runs the extraction strategies in order.
    ///
    /// Errors from one strategy are logged and the next strategy is tried;
    /// only a lost session is reported.
    async fn extract_url<S>(
        &self,
        session: &mut S,
        control: ElementRef,
    ) -> Result<Option<String>, ResolveFailure>
    where
        S: BrowserSession + ?Sized,
    {
        let portal = self.navigator.portal();
        let timing = self.navigator.timing();
        for strategy in &self.strategies {
            let outcome = match strategy {
                ExtractStrategy::StaticAttribute => {
                    extract::from_static_attribute(session, control, &self.patterns, portal).await
                }
                ExtractStrategy::PopupClick => {
                    extract::from_popup_click(session, control, portal, &timing).await
                }
            };
            match outcome {
                Ok(Some(url)) => {
                    debug!(?strategy, "download address extracted");
                    return Ok(Some(url));
                }
                Ok(None) => debug!(?strategy, "strategy produced nothing"),
                Err(error) if error.failure_kind().is_fatal() => {
                    return Err(ResolveFailure::from_browser(ResolveState::ExtractUrl, &error));
                }
                Err(error) => warn!(?strategy, %error, "extraction strategy failed"),
            }
        }
        Ok(None)
    }
}

/// A [`DocumentResolver`] bound to the browser session it drives.
pub struct SessionResolver<S> {
    resolver: DocumentResolver,
    session: S,
}

impl<S: BrowserSession> SessionResolver<S> {
    /// Binds `resolver` to `session`.
    pub fn new(resolver: DocumentResolver, session: S) -> Self {
        Self { resolver, session }
    }
}

#[async_trait]
impl<S: BrowserSession> LeafResolver for SessionResolver<S> {
    async fn try_resolve(&mut self, path: &LeafPath) -> Result<String, ResolveFailure> {
        self.resolver.resolve_detailed(&mut self.session, path).await
    }

    async fn release(&mut self) -> Result<(), BrowserError> {
        self.session.quit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names_match_protocol() {
        assert_eq!(ResolveState::SelectSubSubRegion.to_string(), "SELECT_SUBSUBREGION");
        assert_eq!(ResolveState::ExtractUrl.to_string(), "EXTRACT_URL");
    }

    #[test]
    fn test_failure_from_browser_keeps_kind() {
        let failure = ResolveFailure::from_browser(ResolveState::Navigate, &BrowserError::Closed);
        assert_eq!(failure.kind, FailureKind::FatalConfiguration);
        assert!(failure.to_string().contains("NAVIGATE"));
    }
}
