//! Integration tests for the per-leaf resolution state machine.

mod support;

use harvest_core::catalog::{LeafPath, PathSegment};
use harvest_core::navigator::CascadeNavigator;
use harvest_core::portal::PortalProfile;
use harvest_core::resolver::{DocumentResolver, LeafResolver, ResolveState, SessionResolver};
use harvest_core::{BrowserSession, FailureKind};

use support::fake_browser::{ControlExposure, FakeBrowser, FakePortal, LeafScript};
use support::fast_timing;

const BASE: &str = "https://landrecords.karnataka.gov.in/service3/";

fn leaf(label: &str) -> LeafPath {
    LeafPath {
        region: PathSegment::new("1", "BANGALORE URBAN"),
        sub_region: PathSegment::new("10", "Anekal"),
        sub_sub_region: PathSegment::new("100", "Attibele"),
        leaf: PathSegment::new("1", label),
    }
}

fn portal() -> FakePortal {
    FakePortal::new(PortalProfile::default())
        .with_options("ddl_district", "", &[("1", "BANGALORE URBAN")])
        .with_options("ddl_taluk", "1", &[("10", "Anekal"), ("11", "Hoskote")])
        .with_options("ddl_hobli", "10", &[("100", "Attibele")])
        .with_listing("100", &[&["Hebbagodi", "Chandapura", "Jigani"]])
        .with_leaf(
            "Hebbagodi",
            LeafScript {
                onclick: Some("window.open('FileDownload.aspx?file=HEB001');return false;".into()),
                popup_url: Some(format!("{BASE}FileDownload.aspx?file=SHOULD_NOT_BE_USED")),
                ..LeafScript::default()
            },
        )
        .with_leaf(
            "Chandapura",
            LeafScript::popup(&format!("{BASE}FileDownload.aspx?file=CHN002")),
        )
        .with_leaf("Jigani", LeafScript::popup("https://landrecords.karnataka.gov.in/error.aspx"))
}

const KODATHI: &str =
    "https://landrecords.karnataka.gov.in/service3/FileDownload.aspx?file=KOD005";

/// The shared portal plus a `Kodathi` leaf driven by `script`.
fn portal_with_kodathi(script: LeafScript) -> FakePortal {
    portal().with_leaf("Kodathi", script)
}

fn resolver() -> DocumentResolver {
    DocumentResolver::new(CascadeNavigator::new(PortalProfile::default(), fast_timing())).unwrap()
}

#[tokio::test]
async fn test_static_handler_wins_without_click_or_window() {
    let mut browser = FakeBrowser::new(portal());
    let stats = browser.stats_handle();

    let url = resolver().resolve(&mut browser, &leaf("Hebbagodi")).await;

    assert_eq!(
        url.as_deref(),
        Some("https://landrecords.karnataka.gov.in/service3/FileDownload.aspx?file=HEB001")
    );
    let stats = stats.lock().unwrap();
    assert_eq!(stats.action_clicks, 0);
    assert_eq!(stats.windows_opened, 0);
    assert_eq!(stats.control_found_by, ["id=grdMaps_ImgPdf_0"]);
}

#[tokio::test]
async fn test_popup_fallback_returns_popup_address_and_restores_focus() {
    let mut browser = FakeBrowser::new(portal());
    let stats = browser.stats_handle();

    let url = resolver().resolve(&mut browser, &leaf("Chandapura")).await;

    assert_eq!(
        url.as_deref(),
        Some("https://landrecords.karnataka.gov.in/service3/FileDownload.aspx?file=CHN002")
    );
    assert_eq!(browser.current_window().await.unwrap(), FakeBrowser::main_window());
    assert_eq!(browser.list_windows().await.unwrap().len(), 1);
    let stats = stats.lock().unwrap();
    assert_eq!(stats.action_clicks, 1);
    assert_eq!(stats.windows_opened, 1);
    assert_eq!(stats.windows_closed, 1);
}

#[tokio::test]
async fn test_popup_without_download_address_fails_at_extract() {
    let mut browser = FakeBrowser::new(portal());

    let failure = resolver()
        .resolve_detailed(&mut browser, &leaf("Jigani"))
        .await
        .unwrap_err();

    assert_eq!(failure.state, ResolveState::ExtractUrl);
    assert_eq!(failure.kind, FailureKind::TransientUi);
    assert_eq!(browser.list_windows().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_leaf_times_out_awaiting_results() {
    let mut browser = FakeBrowser::new(portal());

    let failure = resolver()
        .resolve_detailed(&mut browser, &leaf("Nowhere"))
        .await
        .unwrap_err();

    assert_eq!(failure.state, ResolveState::AwaitResults);
    assert!(failure.kind.is_retryable());
}

#[tokio::test]
async fn test_empty_sub_sub_region_dropdown_is_empty_branch() {
    let mut browser = FakeBrowser::new(portal());
    let mut path = leaf("Hebbagodi");
    path.sub_region = PathSegment::new("11", "Hoskote");

    let failure = resolver()
        .resolve_detailed(&mut browser, &path)
        .await
        .unwrap_err();

    assert_eq!(failure.state, ResolveState::SelectSubSubRegion);
    assert_eq!(failure.kind, FailureKind::EmptyBranch);
}

#[tokio::test]
async fn test_session_resolver_releases_browser() {
    let browser = FakeBrowser::new(portal());
    let stats = browser.stats_handle();
    let mut bound = SessionResolver::new(resolver(), browser);

    assert!(bound.resolve(&leaf("Hebbagodi")).await.is_some());
    bound.release().await.unwrap();

    assert!(stats.lock().unwrap().quit);
    let failure = bound.try_resolve(&leaf("Hebbagodi")).await.unwrap_err();
    assert!(failure.kind.is_fatal());
}

#[tokio::test]
async fn test_same_tab_navigation_is_read_from_original_window() {
    let mut browser = FakeBrowser::new(portal_with_kodathi(LeafScript::same_tab(KODATHI)));
    let stats = browser.stats_handle();

    let url = resolver().resolve(&mut browser, &leaf("Kodathi")).await;

    assert_eq!(url.as_deref(), Some(KODATHI));
    assert_eq!(browser.current_window().await.unwrap(), FakeBrowser::main_window());
    let stats = stats.lock().unwrap();
    assert_eq!(stats.action_clicks, 1);
    assert_eq!(stats.windows_opened, 0);
    assert_eq!(stats.windows_closed, 0);
}

#[tokio::test]
async fn test_rejected_script_click_falls_back_to_native_click() {
    let script = LeafScript::popup(KODATHI).rejecting_script_clicks();
    let mut browser = FakeBrowser::new(portal_with_kodathi(script));
    let stats = browser.stats_handle();

    let url = resolver().resolve(&mut browser, &leaf("Kodathi")).await;

    assert_eq!(url.as_deref(), Some(KODATHI));
    let stats = stats.lock().unwrap();
    assert_eq!(stats.rejected_clicks, 1);
    assert_eq!(stats.native_clicks, 1);
    assert_eq!(stats.windows_opened, 1);
    assert_eq!(stats.windows_closed, 1);
}

#[tokio::test]
async fn test_control_found_by_id_fragment_when_exact_id_is_absent() {
    let script = LeafScript::onclick("window.open('FileDownload.aspx?file=KOD005');")
        .exposed(ControlExposure::IdFragment);
    let mut browser = FakeBrowser::new(portal_with_kodathi(script));
    let stats = browser.stats_handle();

    let url = resolver().resolve(&mut browser, &leaf("Kodathi")).await;

    assert_eq!(url.as_deref(), Some(KODATHI));
    assert_eq!(
        stats.lock().unwrap().control_found_by,
        ["css=img[id*='grdMaps_ImgPdf']"]
    );
}

#[tokio::test]
async fn test_control_found_inside_results_table_as_last_resort() {
    let script = LeafScript::onclick("window.open('FileDownload.aspx?file=KOD005');")
        .exposed(ControlExposure::ScopedOnly);
    let mut browser = FakeBrowser::new(portal_with_kodathi(script));
    let stats = browser.stats_handle();

    let url = resolver().resolve(&mut browser, &leaf("Kodathi")).await;

    assert_eq!(url.as_deref(), Some(KODATHI));
    assert_eq!(stats.lock().unwrap().control_found_by, ["css=img[id*='ImgPdf']"]);
}
