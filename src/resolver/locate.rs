//! Ordered lookup of the per-row download affordance.

use tracing::debug;

use crate::browser::{BrowserError, BrowserSession, ElementRef, Locator};
use crate::portal::PortalProfile;

/// Where a locator is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlScope {
    /// Whole document.
    Document,
    /// Inside the results table only.
    ResultsTable,
}

/// One entry in the action-control lookup order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlLocator {
    /// Search scope.
    pub scope: ControlScope,
    /// What to match.
    pub locator: Locator,
}

/// Lookup order: exact id, id substring in the document, id substring in the
/// results table.
#[must_use]
pub fn action_control_locators(portal: &PortalProfile) -> Vec<ControlLocator> {
    vec![
        ControlLocator {
            scope: ControlScope::Document,
            locator: Locator::id(&portal.action_control_id),
        },
        ControlLocator {
            scope: ControlScope::Document,
            locator: Locator::css(format!(
                "img[id*='{}']",
                portal.action_control_id_fragment
            )),
        },
        ControlLocator {
            scope: ControlScope::ResultsTable,
            locator: Locator::css(format!(
                "img[id*='{}']",
                portal.action_control_scoped_fragment
            )),
        },
    ]
}

/// Returns the first control matched by `locators`, tried in order.
///
/// # Errors
///
/// Propagates session errors; absence at every level is `Ok(None)`.
pub async fn locate_action_control<S>(
    session: &mut S,
    results_table: ElementRef,
    locators: &[ControlLocator],
) -> Result<Option<ElementRef>, BrowserError>
where
    S: BrowserSession + ?Sized,
{
    for candidate in locators {
        let found = match candidate.scope {
            ControlScope::Document => session.find_element(&candidate.locator).await?,
            ControlScope::ResultsTable => {
                session
                    .find_within(results_table, &candidate.locator)
                    .await?
            }
        };
        if let Some(control) = found {
            debug!(locator = %candidate.locator, "action control located");
            return Ok(Some(control));
        }
    }
    Ok(None)
}
