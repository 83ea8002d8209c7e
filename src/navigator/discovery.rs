//! Discovery pass: walks the whole cascade once and builds the catalog.

use tracing::{info, instrument, warn};

use super::{CascadeLevel, CascadeNavigator, NavigatorError, Selection};
use crate::browser::BrowserSession;
use crate::catalog::{Catalog, HierarchyNode, NodeKind, PathSegment};

/// Re-establishes the cascade state for `ancestors` after a halted level.
///
/// Intermediate selection outcomes are ignored: the next selection reports
/// its own halt if the page is still unusable.
async fn reselect<S>(
    navigator: &CascadeNavigator,
    session: &mut S,
    ancestors: &[(CascadeLevel, &str)],
) -> Result<(), NavigatorError>
where
    S: BrowserSession + ?Sized,
{
    if let Err(error) = navigator.open(session).await {
        if error.failure_kind().is_fatal() {
            return Err(NavigatorError::session(CascadeLevel::Region, error));
        }
        warn!(%error, "portal reload failed during discovery");
        return Ok(());
    }
    for (level, value) in ancestors {
        navigator.select_and_list(session, *level, value).await?;
    }
    Ok(())
}

fn leaf_nodes(selection: &Selection) -> Vec<HierarchyNode> {
    selection
        .listing
        .iter()
        .map(|leaf| HierarchyNode::new(NodeKind::Leaf, &leaf.value, &leaf.label))
        .collect()
}

fn log_halt(selection: &Selection, label: &str) {
    if let Some(halt) = &selection.halt {
        if selection.is_empty_branch() {
            info!(level = %halt.level, label, "empty branch");
        } else {
            warn!(level = %halt.level, label, reason = %halt.reason, "branch skipped");
        }
    }
}

/// Drives the cascade top-down once and records every option list.
///
/// A level that times out or shows no options is recorded with zero
/// children and the pass continues.
///
/// # Errors
///
/// Returns [`NavigatorError`] if the portal never loads or the session dies.
#[instrument(skip_all)]
pub async fn discover<S>(
    navigator: &CascadeNavigator,
    session: &mut S,
) -> Result<Catalog, NavigatorError>
where
    S: BrowserSession + ?Sized,
{
    let portal = navigator.portal();
    navigator
        .open(session)
        .await
        .map_err(|e| NavigatorError::portal_unavailable(&portal.base_url, e))?;
    let regions: Vec<PathSegment> = navigator
        .read_options(session, &portal.region_control)
        .await
        .map_err(|e| NavigatorError::portal_unavailable(&portal.base_url, e))?;
    info!(regions = regions.len(), "discovery started");

    let mut catalog = Vec::with_capacity(regions.len());
    for (position, region) in regions.iter().enumerate() {
        info!(
            region = %region.label,
            position = position + 1,
            total = regions.len(),
            "discovering region"
        );
        let mut region_node = HierarchyNode::new(NodeKind::Region, &region.value, &region.label);

        let selection = navigator
            .select_and_list(session, CascadeLevel::Region, &region.value)
            .await?;
        if !selection.ok {
            log_halt(&selection, &region.label);
            catalog.push(region_node);
            if !selection.is_empty_branch() {
                reselect(navigator, session, &[]).await?;
            }
            continue;
        }

        for sub_region in &selection.listing {
            let mut sub_node =
                HierarchyNode::new(NodeKind::SubRegion, &sub_region.value, &sub_region.label);
            let sub_selection = navigator
                .select_and_list(session, CascadeLevel::SubRegion, &sub_region.value)
                .await?;
            if !sub_selection.ok {
                log_halt(&sub_selection, &sub_region.label);
                region_node.children.push(sub_node);
                if !sub_selection.is_empty_branch() {
                    reselect(navigator, session, &[(CascadeLevel::Region, region.value.as_str())])
                        .await?;
                }
                continue;
            }

            for sub_sub_region in &sub_selection.listing {
                let mut sub_sub_node = HierarchyNode::new(
                    NodeKind::SubSubRegion,
                    &sub_sub_region.value,
                    &sub_sub_region.label,
                );
                let leaves = navigator
                    .select_and_list(session, CascadeLevel::SubSubRegion, &sub_sub_region.value)
                    .await?;
                if leaves.ok {
                    sub_sub_node.children = leaf_nodes(&leaves);
                    info!(
                        sub_sub_region = %sub_sub_region.label,
                        leaves = sub_sub_node.children.len(),
                        "leaves listed"
                    );
                } else {
                    log_halt(&leaves, &sub_sub_region.label);
                    if !leaves.is_empty_branch() {
                        reselect(
                            navigator,
                            session,
                            &[
                                (CascadeLevel::Region, region.value.as_str()),
                                (CascadeLevel::SubRegion, sub_region.value.as_str()),
                            ],
                        )
                        .await?;
                    }
                }
                sub_node.children.push(sub_sub_node);
            }
            region_node.children.push(sub_node);
        }
        catalog.push(region_node);
    }

    let catalog = Catalog::new(catalog);
    let stats = catalog.stats();
    info!(
        regions = stats.regions,
        sub_regions = stats.sub_regions,
        sub_sub_regions = stats.sub_sub_regions,
        leaves = stats.leaves,
        "discovery finished"
    );
    Ok(catalog)
}
