mod support;

use probate_scraper::{Error, FrameLocatorPath, FrameResolver, PageDriver};
use std::time::Duration;
use support::{FakeCase, FakeSite, Options, Screen};
use tokio::time::Instant;

fn one_page() -> Vec<Vec<FakeCase>> {
    vec![vec![FakeCase::new(1, "01/02/2025"), FakeCase::new(2, "01/03/2025")]]
}

fn list_path() -> FrameLocatorPath {
    FrameLocatorPath::new()
        .name("bodyframe")
        .name("resultFrame")
        .name("resultListFrame")
}

#[tokio::test(start_paused = true)]
async fn test_missing_frame_waits_full_timeout() {
    let site = FakeSite::new(one_page());
    let resolver = FrameResolver::new(&site, Duration::from_millis(250));

    let start = Instant::now();
    let result = resolver
        .resolve_by_name(None, "bodyframe", Duration::from_secs(5))
        .await;

    assert!(matches!(result, Err(Error::FrameNotFound(_))));
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(site.frame_polls() >= 20);
}

#[tokio::test(start_paused = true)]
async fn test_frame_found_after_settling() {
    let site = FakeSite::with_options(
        one_page(),
        Options {
            settle_polls: 4,
            ..Default::default()
        },
    );
    site.show(Screen::Results { page: 0 });
    let resolver = FrameResolver::new(&site, Duration::from_millis(250));

    let start = Instant::now();
    let frame = resolver
        .resolve_path(&list_path(), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(frame.path, vec![0, 0, 0]);
    assert!(start.elapsed() >= Duration::from_millis(1000));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_resolve_path_is_repeatable() {
    let site = FakeSite::new(one_page());
    site.show(Screen::Results { page: 0 });
    let resolver = FrameResolver::new(&site, Duration::from_millis(250));

    let first = resolver
        .resolve_path(&list_path(), Duration::from_secs(1))
        .await
        .unwrap();
    let second = resolver
        .resolve_path(&list_path(), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(first, second);
    assert!(site.frame_html(&first).await.unwrap().contains("inst1"));
}

#[tokio::test(start_paused = true)]
async fn test_stale_handle_is_detached() {
    let site = FakeSite::new(vec![
        vec![FakeCase::new(1, "01/02/2025")],
        vec![FakeCase::new(2, "01/03/2025")],
    ]);
    site.show(Screen::Results { page: 0 });
    let resolver = FrameResolver::new(&site, Duration::from_millis(250));
    let stale = resolver
        .resolve_path(&list_path(), Duration::from_secs(1))
        .await
        .unwrap();

    site.show(Screen::Results { page: 1 });
    let result = site.frame_html(&stale).await;
    assert!(matches!(result, Err(Error::FrameDetached(_))));

    let fresh = resolver
        .resolve_path(&list_path(), Duration::from_secs(1))
        .await
        .unwrap();
    assert_ne!(fresh.url, stale.url);
    assert!(site.frame_html(&fresh).await.unwrap().contains("2025-0002"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_hop_is_named() {
    let site = FakeSite::new(one_page());
    site.show(Screen::Results { page: 0 });
    let resolver = FrameResolver::new(&site, Duration::from_millis(250));

    let path = FrameLocatorPath::new().name("bodyframe").name("documentFrame");
    let err = resolver
        .resolve_path(&path, Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("hop 2"));
    assert!(err.to_string().contains("documentFrame"));
}

#[tokio::test(start_paused = true)]
async fn test_resolve_within_root() {
    let site = FakeSite::new(one_page());
    site.show(Screen::Results { page: 0 });
    let resolver = FrameResolver::new(&site, Duration::from_millis(250));

    let result_frame = resolver
        .resolve_by_name(None, "resultFrame", Duration::from_secs(1))
        .await
        .unwrap();
    let pager = resolver
        .resolve_by_url_fragment(Some(&result_frame), "subnav=1", Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(pager.path, vec![0, 0, 1]);

    let outside = resolver
        .resolve_by_name(Some(&result_frame), "bodyframe", Duration::from_millis(500))
        .await;
    assert!(outside.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_resolve_any_takes_first_hit() {
    let site = FakeSite::new(one_page());
    site.show(Screen::Results { page: 0 });
    let resolver = FrameResolver::new(&site, Duration::from_millis(250));

    let candidates = [
        FrameLocatorPath::new().name("nosuchframe"),
        FrameLocatorPath::new().url("casefile_SearchResultList.jsp"),
    ];
    let frame = resolver
        .resolve_any(&candidates, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(frame.name, "resultListFrame");
}
