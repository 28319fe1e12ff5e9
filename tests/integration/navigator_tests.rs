//! Navigation end to end against a mock Madara site

use crate::support::*;
use chapter_cache::{
    CacheEvent, Chapter, ChapterNavigator, ChapterRate, Navigation, NavigationTask,
    NavigatorState, Session,
};
use futures::StreamExt;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OPEN_ROBOTS: &str = "User-agent: *\nDisallow: /wp-admin/\n";

fn five_pages() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("01.jpg", jpeg_bytes()),
        ("02.jpg", jpeg_bytes()),
        ("03.png", png_bytes()),
        ("04.jpg", jpeg_bytes()),
        ("05.bmp", bmp_bytes()),
    ]
}

fn navigator(server: &MockServer, dir: &TempDir, strategy: &str) -> ChapterNavigator {
    let config = test_config(
        &dir.path().join("cache"),
        &dir.path().join("data.db"),
        &server.uri(),
        strategy,
        None,
    );
    let session = Session::from_config(&config).unwrap();
    ChapterNavigator::from_config(&config, session).unwrap()
}

async fn mount_series_search(server: &MockServer) {
    let body = format!(
        r#"<div class="c-tabs-item">
             <div class="row c-tabs-item__content">
               <a href="{uri}/manga/solo-leveling/" title="Solo Leveling">Solo Leveling</a>
             </div>
             <div class="row c-tabs-item__content">
               <a href="{uri}/manga/solo-leveling-ragnarok/" title="Solo Leveling: Ragnarok">x</a>
             </div>
           </div>"#,
        uri = server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("s", "Solo Leveling"))
        .and(query_param("post_type", "wp-manga"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_next_with_fractional_rate() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let page = "/manga/solo-leveling/chapter-1-5/";
    mount_robots(&server, OPEN_ROBOTS).await;
    mount_head_ok(&server, page).await;
    mount_chapter(&server, page, &five_pages()).await;

    let mut nav = navigator(&server, &dir, "direct");
    nav.session_mut().chapter = Chapter::new(1.0).unwrap();
    nav.session_mut().chapter_rate = ChapterRate::new(0.5).unwrap();
    assert_eq!(nav.state(), NavigatorState::Idle);

    let events: Vec<CacheEvent> = nav.next_chapter().collect().await;

    assert_well_formed(&events);
    assert!(finished(&events));
    assert_eq!(nav.state(), NavigatorState::Settled(true));
    assert_eq!(nav.session().chapter.to_string(), "1.5");
    assert_eq!(
        nav.session().current_url.as_ref().map(|u| u.path()),
        Some(page)
    );
    assert_eq!(nav.pipeline().cached_images().unwrap().len(), 5);
    assert!(nav.session().blacklist.is_empty());
}

#[tokio::test]
async fn test_previous_then_settings_snapshot() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let page = "/manga/solo-leveling/chapter-1/";
    mount_robots(&server, OPEN_ROBOTS).await;
    mount_head_ok(&server, page).await;
    mount_chapter(&server, page, &five_pages()).await;

    let mut nav = navigator(&server, &dir, "direct");
    let events: Vec<CacheEvent> = nav.previous_chapter().collect().await;

    assert!(finished(&events));
    let settings = nav.settings();
    assert_eq!(settings.chapter, 1.0);
    assert_eq!(settings.title, "Solo Leveling");
    assert_eq!(settings.provider, "mock");
}

#[tokio::test]
async fn test_direct_strategy_never_blacklists() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let page = "/manga/solo-leveling/chapter-2/";
    mount_robots(&server, OPEN_ROBOTS).await;
    mount_head_ok(&server, page).await;
    mount_chapter(&server, page, &[("1.jpg", jpeg_bytes())]).await;

    let mut nav = navigator(&server, &dir, "direct");
    let events: Vec<CacheEvent> = nav.reload_chapter().collect().await;

    assert!(finished(&events));
    assert_eq!(nav.pipeline().cached_images().unwrap().len(), 1);
    assert!(nav.session().blacklist.is_empty());
}

#[tokio::test]
async fn test_low_yield_search_result_is_blacklisted() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let page = "/manga/solo-leveling/chapter-2/";
    mount_robots(&server, OPEN_ROBOTS).await;
    mount_series_search(&server).await;
    mount_head_ok(&server, page).await;

    let images = [
        ("1.jpg", jpeg_bytes()),
        ("2.jpg", jpeg_bytes()),
        ("3.jpg", jpeg_bytes()),
    ];
    let html: String = images
        .iter()
        .map(|(name, _)| format!(r#"<img src="/uploads/{}">"#, name))
        .collect();
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .expect(1)
        .mount(&server)
        .await;
    for (name, bytes) in images {
        Mock::given(method("GET"))
            .and(path(format!("/uploads/{}", name)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
            .mount(&server)
            .await;
    }

    let mut nav = navigator(&server, &dir, "site-search");
    let events: Vec<CacheEvent> = nav.reload_chapter().collect().await;

    assert!(finished(&events));
    assert_eq!(nav.pipeline().cached_images().unwrap().len(), 3);
    assert!(nav.session().blacklist.contains("127.0.0.1"));

    // the same page is now rejected before anything is fetched
    let events: Vec<CacheEvent> = nav.reload_chapter().collect().await;
    assert_eq!(events, vec![CacheEvent::Progress(0), CacheEvent::Finished(false)]);
    assert_eq!(nav.state(), NavigatorState::Settled(false));
    assert_eq!(nav.pipeline().cached_images().unwrap().len(), 3);
}

#[tokio::test]
async fn test_unresolved_chapter_keeps_new_value() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_robots(&server, OPEN_ROBOTS).await;
    Mock::given(method("HEAD"))
        .and(path("/manga/solo-leveling/chapter-3/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/manga/solo-leveling/chapter-3/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut nav = navigator(&server, &dir, "direct");
    let events: Vec<CacheEvent> = nav.next_chapter().collect().await;

    assert_eq!(events, vec![CacheEvent::Progress(0), CacheEvent::Finished(false)]);
    assert_eq!(nav.state(), NavigatorState::Settled(false));
    assert_eq!(nav.session().chapter, Chapter::new(3.0).unwrap());
    assert!(nav.session().current_url.is_none());
}

#[tokio::test]
async fn test_navigation_task_returns_navigator() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let page = "/manga/solo-leveling/chapter-3/";
    mount_robots(&server, OPEN_ROBOTS).await;
    mount_head_ok(&server, page).await;
    mount_chapter(&server, page, &five_pages()).await;

    let nav = navigator(&server, &dir, "direct");
    let mut task = NavigationTask::spawn(nav, Navigation::Next);
    assert_eq!(task.action(), Navigation::Next);

    let mut events = Vec::new();
    while let Some(event) = task.next_event().await {
        events.push(event);
    }
    let nav = task.join().await.unwrap();

    assert_well_formed(&events);
    assert!(finished(&events));
    assert_eq!(nav.state(), NavigatorState::Settled(true));
    assert_eq!(nav.session().chapter, Chapter::new(3.0).unwrap());
}

#[tokio::test]
async fn test_blacklist_current_url() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let page = "/manga/solo-leveling/chapter-2/";
    mount_robots(&server, OPEN_ROBOTS).await;
    mount_head_ok(&server, page).await;
    mount_chapter(&server, page, &five_pages()).await;

    let mut nav = navigator(&server, &dir, "direct");
    assert_eq!(nav.blacklist_current_url(), None);

    let events: Vec<CacheEvent> = nav.reload_chapter().collect().await;
    assert!(finished(&events));

    assert_eq!(nav.blacklist_current_url().as_deref(), Some("127.0.0.1"));
    assert!(nav.session().blacklist.contains("127.0.0.1"));
    assert_eq!(nav.settings().blacklist, "127.0.0.1");
}

#[tokio::test]
async fn test_search_titles_lists_site_matches() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_series_search(&server).await;

    let nav = navigator(&server, &dir, "site-search");
    let titles = nav.search_titles("Solo Leveling").await.unwrap();

    assert_eq!(titles, vec!["Solo Leveling", "Solo Leveling: Ragnarok"]);
}

#[tokio::test]
async fn test_unknown_provider_is_rejected() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(
        &dir.path().join("cache"),
        &dir.path().join("data.db"),
        &server.uri(),
        "direct",
        None,
    );
    let mut session = Session::from_config(&config).unwrap();
    session.provider_id = "elsewhere".to_string();

    assert!(ChapterNavigator::from_config(&config, session).is_err());
}

#[tokio::test]
async fn test_aborted_navigation_does_not_leak_into_next_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let slow_page = "/manga/solo-leveling/chapter-2/";
    let next_page = "/manga/solo-leveling/chapter-3/";
    mount_robots(&server, OPEN_ROBOTS).await;
    mount_head_ok(&server, slow_page).await;
    mount_head_ok(&server, next_page).await;
    mount_slow_chapter(&server, slow_page).await;
    mount_chapter(&server, next_page, &[("1.png", png_bytes())]).await;

    let mut task = NavigationTask::spawn(navigator(&server, &dir, "direct"), Navigation::Reload);
    assert_eq!(task.next_event().await, Some(CacheEvent::Progress(0)));
    task.abort();
    assert!(task.join().await.is_err());

    // a fresh navigator on the same cache directory
    let mut nav = navigator(&server, &dir, "direct");
    let events: Vec<CacheEvent> = nav.next_chapter().collect().await;
    assert!(finished(&events));
    assert_eq!(nav.pipeline().cached_images().unwrap().len(), 1);

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    assert_eq!(file_names(nav.pipeline().cache_dir()), vec!["001.png"]);
}
