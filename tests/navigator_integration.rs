//! Integration tests for cascade navigation, paginated listing, and discovery.

mod support;

use harvest_core::catalog::NodeKind;
use harvest_core::navigator::{CascadeLevel, CascadeNavigator, discover};
use harvest_core::portal::PortalProfile;
use harvest_core::{BrowserSession, FailureKind};

use support::fake_browser::{FakeBrowser, FakePortal};
use support::fast_timing;

fn portal() -> FakePortal {
    FakePortal::new(PortalProfile::default())
        .with_options("ddl_district", "", &[("1", "BANGALORE URBAN"), ("2", "MYSORE")])
        .with_options("ddl_taluk", "1", &[("10", "Anekal"), ("11", "Hoskote")])
        .with_options("ddl_taluk", "2", &[("20", "Hunsur")])
        .with_options("ddl_hobli", "10", &[("100", "Attibele"), ("101", "Sarjapura")])
        .with_options("ddl_hobli", "20", &[("200", "Bilikere")])
        .with_listing(
            "100",
            &[
                &["Hebbagodi", "Chandapura"],
                &["Bommasandra", "Jigani"],
                &["Kodathi"],
            ],
        )
        .with_listing("101", &[&["Dommasandra", "Mugalur"]])
        .with_listing("200", &[&["Kallahalli"]])
}

fn navigator() -> CascadeNavigator {
    CascadeNavigator::new(PortalProfile::default(), fast_timing())
}

#[tokio::test]
async fn test_listing_is_union_of_all_pages_in_order() {
    let mut browser = FakeBrowser::new(portal());
    let stats = browser.stats_handle();

    let selection = navigator()
        .select_path(&mut browser, "1", "10", "100")
        .await
        .unwrap();

    assert!(selection.ok, "selection halted: {:?}", selection.halt);
    let names: Vec<&str> = selection.listing.iter().map(|l| l.label.as_str()).collect();
    assert_eq!(
        names,
        ["Hebbagodi", "Chandapura", "Bommasandra", "Jigani", "Kodathi"]
    );
    let values: Vec<&str> = selection.listing.iter().map(|l| l.value.as_str()).collect();
    assert_eq!(values, ["1", "2", "3", "4", "5"]);
    assert_eq!(stats.lock().unwrap().page_clicks, 2);
}

#[tokio::test]
async fn test_select_path_halts_at_sub_region_without_sub_sub_regions() {
    let mut browser = FakeBrowser::new(portal());

    let selection = navigator()
        .select_path(&mut browser, "1", "11", "110")
        .await
        .unwrap();

    assert!(!selection.ok);
    assert!(selection.listing.is_empty());
    let halt = selection.halt.unwrap();
    assert_eq!(halt.level, CascadeLevel::SubRegion);
    assert_eq!(halt.kind, FailureKind::EmptyBranch);
}

#[tokio::test]
async fn test_select_path_starts_from_fresh_page_each_time() {
    let mut browser = FakeBrowser::new(portal());
    let stats = browser.stats_handle();
    let navigator = navigator();

    let first = navigator.select_path(&mut browser, "1", "10", "101").await.unwrap();
    let second = navigator.select_path(&mut browser, "2", "20", "200").await.unwrap();

    assert_eq!(first.listing.len(), 2);
    assert!(second.ok);
    assert_eq!(second.listing[0].label, "Kallahalli");
    assert_eq!(second.listing[0].value, "1");
    assert_eq!(stats.lock().unwrap().navigations, 2);
}

#[tokio::test]
async fn test_select_path_reports_lost_session() {
    let mut browser = FakeBrowser::new(portal());
    browser.quit().await.unwrap();

    let result = navigator().select_path(&mut browser, "1", "10", "100").await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_single_page_listing_needs_no_page_clicks() {
    let mut browser = FakeBrowser::new(portal());
    let stats = browser.stats_handle();

    let selection = navigator()
        .select_path(&mut browser, "1", "10", "101")
        .await
        .unwrap();

    assert_eq!(selection.listing.len(), 2);
    assert_eq!(stats.lock().unwrap().page_clicks, 0);
}

#[tokio::test]
async fn test_level_without_options_is_empty_branch() {
    let mut browser = FakeBrowser::new(portal());
    let navigator = navigator();
    navigator.open(&mut browser).await.unwrap();
    navigator
        .select_and_list(&mut browser, CascadeLevel::Region, "1")
        .await
        .unwrap();

    let selection = navigator
        .select_and_list(&mut browser, CascadeLevel::SubRegion, "11")
        .await
        .unwrap();

    assert!(!selection.ok);
    assert!(selection.is_empty_branch());
    assert_eq!(selection.halt.unwrap().kind, FailureKind::EmptyBranch);
}

#[tokio::test]
async fn test_read_options_skips_placeholder() {
    let mut browser = FakeBrowser::new(portal());
    let navigator = navigator();
    navigator.open(&mut browser).await.unwrap();

    let options = navigator.read_options(&mut browser, "ddl_district").await.unwrap();
    let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, ["BANGALORE URBAN", "MYSORE"]);
}

#[tokio::test]
async fn test_discovery_builds_full_catalog() {
    let mut browser = FakeBrowser::new(portal());

    let catalog = discover(&navigator(), &mut browser).await.unwrap();

    let stats = catalog.stats();
    assert_eq!(stats.regions, 2);
    assert_eq!(stats.sub_regions, 3);
    assert_eq!(stats.sub_sub_regions, 3);
    assert_eq!(stats.leaves, 8);

    let hoskote = &catalog.regions()[0].children[1];
    assert_eq!(hoskote.label, "Hoskote");
    assert_eq!(hoskote.kind, NodeKind::SubRegion);
    assert!(hoskote.children.is_empty());

    let keys: Vec<String> = catalog
        .leaves()
        .iter()
        .map(|leaf| leaf.key().as_str().to_string())
        .collect();
    assert_eq!(keys[0], "1_10_100_1");
    assert_eq!(keys[4], "1_10_100_5");
    assert_eq!(keys[7], "2_20_200_1");
}

#[tokio::test]
async fn test_discovery_fails_when_session_is_gone() {
    let mut browser = FakeBrowser::new(portal());
    browser.quit().await.unwrap();

    let result = discover(&navigator(), &mut browser).await;
    assert!(result.is_err());
}
