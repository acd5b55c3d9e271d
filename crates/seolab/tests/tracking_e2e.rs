use axum::{http::StatusCode, routing::get, Router};
use seolab::local::competitors::{Competitor, CompetitorStore};
use seolab::local::linking::{self, ApplyOutcome, ContentItem, LinkingStore};
use seolab::local::HttpFetcher;
use std::net::SocketAddr;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const STRONG: &str = r#"<html><head><title>Coffee Grinder Reviews 2024</title>
<meta name="description" content="We tested every coffee grinder worth buying."></head><body>
<h1>Best Coffee Grinder</h1>
<h2>Burr vs Blade Grinders</h2><p>A burr coffee grinder gives an even grind. Blade grinders are cheaper.</p>
<h2>Grind Size Chart</h2><p>Espresso needs a fine grind. French press needs a coarse grind.</p>
<h2>Cleaning Your Grinder</h2><p>Clean the burrs every month.</p>
<img src="/a.jpg" alt="coffee grinder on a counter"><img src="/b.jpg" alt="burrs">
<ul><li>Baratza</li><li>Fellow</li></ul>
<a href="/reviews">More reviews</a> <a href="https://other.example/">Elsewhere</a>
</body></html>"#;

const OURS: &str = r#"<html><head><title>Our Grinder Notes</title></head><body>
<h2>Burr vs Blade Grinders</h2><p>We like burr grinders.</p></body></html>"#;

async fn serve_competitors() -> SocketAddr {
    let app = Router::new()
        .route("/strong", get(|| async { STRONG }))
        .route("/gone", get(|| async { (StatusCode::NOT_FOUND, "missing") }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn competitor_tracking_round_trip() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let addr = serve_competitors().await;
    let store = CompetitorStore::new(tmp.path());
    let kw = "coffee grinder";

    let strong = format!("http://{addr}/strong");
    let gone = format!("http://{addr}/gone");
    assert!(store.add(kw, Competitor::new(strong.clone(), "")).unwrap());
    assert!(store.add(kw, Competitor::new(gone.clone(), "Gone")).unwrap());
    assert!(!store.add(kw, Competitor::new(strong.clone(), "dup")).unwrap());
    store
        .update_our_content(kw, "https://ours.example/grinders", OURS)
        .unwrap();

    let fetcher = HttpFetcher::with_defaults().unwrap();
    let outcomes = store.analyze_all(&fetcher, kw).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].error.is_none());
    assert!(outcomes[1].error.is_some());

    let data = store.load(kw).unwrap().unwrap();
    let refreshed = &data.competitors[0];
    assert_eq!(refreshed.title, "Coffee Grinder Reviews 2024");
    let m = refreshed.metrics.as_ref().unwrap();
    assert_eq!(m.image_count, 2);
    assert_eq!(m.images_with_alt, 2);
    assert_eq!(m.internal_links, 1);
    assert_eq!(m.external_links, 1);
    assert!(m.score > 0);
    assert!(data.competitors[1].metrics.is_none());

    let analysis = store.analysis(kw).unwrap().unwrap();
    assert_eq!(analysis.competitor_count, 2);
    assert_eq!(
        analysis.best_competitor.as_ref().map(|c| c.url.as_str()),
        Some(strong.as_str())
    );
    assert!(!analysis.comparison.recommendations.is_empty());

    let csv = store.export_csv(kw).unwrap();
    assert!(csv.lines().count() >= 4);
    assert!(csv.contains("YOUR CONTENT"));
    assert!(csv.contains(&strong));

    let tracked = store.list_tracked().unwrap();
    assert_eq!(tracked.len(), 1);
    assert!(store.delete(kw).unwrap());
    assert!(store.list_tracked().unwrap().is_empty());
}

#[test]
fn internal_linking_round_trip() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let items = vec![
        ContentItem::page(
            1,
            "Espresso Machines",
            "espresso-machines",
            "<p>Our espresso machines pair well with a burr grinder. \
             Read the <a href=\"/blog/grinder-guide\">grinder guide</a>.</p>",
        ),
        ContentItem::article(
            2,
            "Grinder Guide",
            "grinder-guide",
            "<p>Choosing a burr grinder for espresso machines and pour over coffee.</p>",
        ),
        ContentItem::article(
            3,
            "Pour Over Coffee",
            "pour-over-coffee",
            "<p>Pour over coffee needs a medium grind from a burr grinder.</p>",
        ),
    ];

    let analysis = linking::analyze_all(&items).unwrap();
    assert_eq!(analysis.total_pages, 1);
    assert_eq!(analysis.total_articles, 2);
    assert_eq!(analysis.statistics.total_internal_links, 1);
    assert!(analysis.orphan_pages.iter().any(|o| o.id == 3));
    assert!(!analysis.orphan_pages.iter().any(|o| o.id == 2));

    let store = LinkingStore::new(tmp.path());
    store.save(&analysis).unwrap();
    assert_eq!(store.load().unwrap(), Some(analysis));

    match linking::apply_link(&items[1], &items[2], "pour over coffee").unwrap() {
        ApplyOutcome::Applied { content, url, .. } => {
            assert_eq!(url, "/blog/pour-over-coffee");
            assert!(content.contains("<a href=\"/blog/pour-over-coffee\">pour over coffee</a>"));
            let undone = linking::remove_link(&content, &url).unwrap();
            assert_eq!(undone, items[1].content);
        }
        other => panic!("expected link to be applied, got {other:?}"),
    }

    assert!(linking::apply_link(&items[0], &items[1], "").is_err());
}
