//! External search resolution against a mock engine and site

use crate::support::*;
use chapter_cache::pipeline::build_http_client;
use chapter_cache::provider::MadaraProvider;
use chapter_cache::resolver::{Resolver, SearchEngineKind};
use chapter_cache::robots::RobotsChecker;
use chapter_cache::{Chapter, Session, Strategy};
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Setup {
    resolver: Resolver,
    session: Session,
    provider: MadaraProvider,
    _dir: TempDir,
}

fn setup(server: &MockServer) -> Setup {
    let dir = TempDir::new().unwrap();
    let endpoint = format!("{}/html/", server.uri());
    let config = test_config(
        &dir.path().join("cache"),
        &dir.path().join("data.db"),
        &server.uri(),
        "duckduckgo",
        Some(&endpoint),
    );
    let client = build_http_client(&config.user_agent).unwrap();
    let robots = Arc::new(RobotsChecker::new(client.clone()));
    let resolver = Resolver::new(
        client,
        robots,
        config.user_agent.header_value(),
        &config.search,
    )
    .unwrap();

    let mut session = Session::from_config(&config).unwrap();
    session.chapter = Chapter::new(3.0).unwrap();
    let provider = MadaraProvider::new("mock", Url::parse(&server.uri()).unwrap());

    Setup {
        resolver,
        session,
        provider,
        _dir: dir,
    }
}

fn result_link(href: &str, text: &str) -> String {
    format!(
        r#"<div class="result"><h2 class="result__title"><a class="result__a" href="{}">{}</a></h2></div>"#,
        href, text
    )
}

async fn mount_results(server: &MockServer, links: &[String]) {
    let body = format!("<html><body>{}</body></html>", links.concat());
    Mock::given(method("GET"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_first_acceptable_result_wins() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let port = server.address().port();
    mount_robots(&server, "User-agent: *\nDisallow: /wp-admin/\n").await;

    let good = format!("{}/manga/solo-leveling/chapter-3/", uri);
    let wrapped_good = format!(
        "//duckduckgo.com/l/?uddg={}",
        good.replace(':', "%3A").replace('/', "%2F")
    );
    mount_results(
        &server,
        &[
            result_link(&format!("{}/other/tower-of-god-3/", uri), "Tower of God Chapter 3"),
            result_link(
                &format!("http://localhost:{}/manga/solo-leveling/chapter-3/", port),
                "Solo Leveling Chapter 3",
            ),
            result_link(&format!("{}/dead/solo-leveling-3/", uri), "Solo Leveling Chapter 3"),
            result_link(&wrapped_good, "Solo Leveling Chapter 3 - Mock Scans"),
        ],
    )
    .await;

    Mock::given(method("HEAD"))
        .and(path("/other/tower-of-god-3/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/dead/solo-leveling-3/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_head_ok(&server, "/manga/solo-leveling/chapter-3/").await;

    let mut s = setup(&server);
    s.session.blacklist.insert("localhost");
    assert_eq!(
        s.session.strategy,
        Strategy::ExternalSearch(SearchEngineKind::DuckDuckGo)
    );

    let resolved = s.resolver.resolve(&s.session, &s.provider).await;

    assert_eq!(resolved.map(String::from), Some(good));
}

#[tokio::test]
async fn test_unreachable_result_is_skipped() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount_robots(&server, "User-agent: *\nDisallow:\n").await;

    // bind then release a port so nothing is listening on it
    let closed_port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    mount_results(
        &server,
        &[
            result_link(
                &format!("http://127.0.0.1:{}/manga/solo-leveling/chapter-3/", closed_port),
                "Solo Leveling Chapter 3",
            ),
            result_link(&format!("{}/read/solo-leveling-3/", uri), "Solo Leveling Chapter 3"),
        ],
    )
    .await;
    mount_head_ok(&server, "/read/solo-leveling-3/").await;

    let s = setup(&server);
    let resolved = s.resolver.resolve(&s.session, &s.provider).await;

    assert_eq!(
        resolved.map(String::from),
        Some(format!("{}/read/solo-leveling-3/", uri))
    );
}

#[tokio::test]
async fn test_robots_denied_result_is_skipped() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount_robots(&server, "User-agent: *\nDisallow: /private/\n").await;
    mount_results(
        &server,
        &[
            result_link(&format!("{}/private/solo-leveling-3/", uri), "Solo Leveling Chapter 3"),
            result_link(&format!("{}/read/solo-leveling-3/", uri), "Solo Leveling Chapter 3"),
        ],
    )
    .await;
    mount_head_ok(&server, "/private/solo-leveling-3/").await;
    mount_head_ok(&server, "/read/solo-leveling-3/").await;

    let s = setup(&server);
    let resolved = s.resolver.resolve(&s.session, &s.provider).await;

    assert_eq!(
        resolved.map(|u| u.path().to_string()),
        Some("/read/solo-leveling-3/".to_string())
    );
}

#[tokio::test]
async fn test_no_matching_result_resolves_nothing() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount_robots(&server, "User-agent: *\nDisallow:\n").await;
    mount_results(
        &server,
        &[
            result_link(&format!("{}/manga/solo-leveling/", uri), "Solo Leveling - Mock Scans"),
            result_link(&format!("{}/manga/solo-leveling/chapter-2/", uri), "Solo Leveling Chapter 2"),
        ],
    )
    .await;

    let s = setup(&server);
    assert!(s.resolver.resolve(&s.session, &s.provider).await.is_none());
}

#[tokio::test]
async fn test_search_engine_down_resolves_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(5)
        .mount(&server)
        .await;

    let s = setup(&server);
    assert!(s.resolver.resolve(&s.session, &s.provider).await.is_none());
}
