// tests/listing_fixture.rs
//
// Listing fetcher against a captured upstream payload and a mock HTTP server.
//
// Covered:
// - currency exclusion + skipped malformed records
// - link / preview fallbacks and text normalization
// - HTTP mode: limit query, non-2xx, non-JSON body

use bid_radar::config::DaemonConfig;
use bid_radar::ingest::providers::freelancer::FreelancerProvider;
use bid_radar::ingest::types::ListingSource;
use bid_radar::RadarError;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BASE: &str = "https://www.freelancer.com/projects";

fn fixture() -> String {
    std::fs::read_to_string("tests/fixtures/projects_active.json").expect("fixture")
}

#[tokio::test]
async fn fixture_drops_excluded_currency_and_bad_records() {
    let p = FreelancerProvider::from_fixture(&fixture(), BASE, vec!["INR".into()]);
    let items = p.fetch_listing().await.expect("fixture parses");

    let ids: Vec<String> = items.iter().map(|it| it.id.to_string()).collect();
    assert_eq!(ids, vec!["39811201", "39811203", "39811204"]);
    assert!(items.iter().all(|it| it.currency.code != "INR"));
    assert!(items.iter().all(|it| !it.is_new), "fetcher never classifies");
}

#[tokio::test]
async fn exclusion_is_case_insensitive_and_configurable() {
    let p = FreelancerProvider::from_fixture(&fixture(), BASE, vec!["usd".into(), "inr".into()]);
    let items = p.fetch_listing().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].currency.code, "EUR");

    let p = FreelancerProvider::from_fixture(&fixture(), BASE, vec![]);
    assert_eq!(p.fetch_listing().await.unwrap().len(), 4);
}

#[tokio::test]
async fn fields_are_normalized_with_fallbacks() {
    let p = FreelancerProvider::from_fixture(&fixture(), BASE, vec!["INR".into()]);
    let items = p.fetch_listing().await.unwrap();

    let cli = &items[0];
    assert_eq!(
        cli.link,
        "https://www.freelancer.com/projects/rust/build-rust-cli-for-log-parsing"
    );
    assert_eq!(
        cli.preview_description,
        "We need a small & fast CLI that parses nginx logs."
    );
    assert_eq!(cli.bid_stats.bid_count, 12);
    assert_eq!(cli.budget_line(), "Budget: $250-750 USD [ Fixed ]");

    let scrape = &items[1];
    assert_eq!(scrape.link, "https://www.freelancer.com/projects/39811203");
    assert_eq!(
        scrape.preview_description,
        "Full description used when the preview is missing."
    );
    assert_eq!(scrape.country.code, "");

    // null sign falls back to `$`
    assert_eq!(items[2].budget_line(), "Budget: $15-25 USD [ Hourly ]");
}

fn cfg_for(server: &MockServer) -> DaemonConfig {
    let mut cfg = DaemonConfig::default();
    cfg.listing.url = format!("{}/api/projects/0.1/projects/active/", server.uri());
    cfg
}

#[tokio::test]
async fn http_mode_sends_limit_and_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/projects/0.1/projects/active/"))
        .and(query_param("limit", "30"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
        .expect(1)
        .mount(&server)
        .await;

    let p = FreelancerProvider::from_config(&cfg_for(&server)).unwrap();
    let items = p.fetch_listing().await.unwrap();
    assert_eq!(items.len(), 3);
}

#[tokio::test]
async fn http_errors_map_to_taxonomy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let p = FreelancerProvider::from_config(&cfg_for(&server)).unwrap();
    assert!(matches!(p.fetch_listing().await, Err(RadarError::Network(_))));
    assert!(matches!(
        p.fetch_listing().await,
        Err(RadarError::UpstreamFormat(_))
    ));
}
