//! End-to-end bulk runs against an in-memory store and a mocked provider.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use tagsync_core::http::{MockClient, MockResponse, RateLimiter, ResilientFetcher, RetryPolicy};
use tagsync_core::orchestrator::{BulkOptions, BulkScraper, ItemOutcome, SkipPolicy, SkipReason};
use tagsync_core::provider::{PostPage, PostPageStrategy, POST_PAGE_STRATEGY};
use tagsync_core::store::{EntityKind, MemoryStore};
use tagsync_core::types::{ItemKind, ScrapeItem, TagRef};

const SITE: &str = "https://booru.example";

const POST_HTML: &str = r##"<ul id="tag-sidebar">
    <li class="tag-type-copyright tag"><a href="#">?</a> <a href="/t">metroid</a></li>
    <li class="tag-type-character tag"><a href="#">?</a> <a href="/t">samus_aran</a></li>
    <li class="tag-type-artist tag"><a href="#">?</a> <a href="/t">painter</a></li>
    <li class="tag-type-general tag"><a href="#">?</a> <a href="/t">solo</a></li>
</ul>"##;

fn image(id: &str, path: &str) -> ScrapeItem {
    ScrapeItem {
        id: id.into(),
        kind: ItemKind::Image,
        title: None,
        path: Some(path.into()),
        checksum: None,
        tags: vec![],
        organized: false,
        added_at: None,
    }
}

fn post_page_strategy(client: MockClient) -> Arc<PostPageStrategy> {
    let fetcher = Arc::new(ResilientFetcher::new(
        Arc::new(client),
        RateLimiter::disabled(),
        RetryPolicy::new(2, Duration::from_millis(1)),
    ));
    Arc::new(PostPageStrategy::new(PostPage::new(fetcher, SITE), None, "r34"))
}

fn post_url(id: u32) -> String {
    format!("{SITE}/index.php?page=post&s=view&id={id}")
}

#[tokio::test(start_paused = true)]
async fn test_bulk_run_with_post_page_strategy() {
    let client = MockClient::new()
        .with_html(&post_url(77), POST_HTML)
        .with_html(
            &post_url(78),
            "<p>Nobody here but us chickens!</p>",
        );

    let mut tagged = image("3", "/media/r34_79_done.png");
    tagged.tags.push(TagRef {
        id: "tag-9".into(),
        name: "[Scraped]".into(),
    });

    let store = Arc::new(
        MemoryStore::new()
            .with_entity(EntityKind::Tag, "tag-1", "r34:solo")
            .with_item(image("1", "/media/r34_77_samus.png"))
            .with_item(image("2", "/media/r34_78_gone.png"))
            .with_item(tagged),
    );

    let options = BulkOptions {
        skip: SkipPolicy {
            exclusion_tags: vec!["[scraped]".into()],
            ..Default::default()
        },
        ..Default::default()
    };
    let mut scraper = BulkScraper::new(store.clone(), options)
        .with_strategy(post_page_strategy(client));

    let results = scraper
        .run(ItemKind::Image, Some(POST_PAGE_STRATEGY), None)
        .await
        .unwrap();
    assert_eq!(results.len(), 3);

    let first = &results[0];
    assert_eq!(first.outcome, ItemOutcome::Success);
    assert_eq!(first.strategy, POST_PAGE_STRATEGY);
    assert_eq!(
        first.tags_added,
        vec!["r34:solo", "r34:artist:painter", "r34:series:metroid"]
    );
    assert_eq!(
        first.tags_created,
        vec!["r34:artist:painter", "r34:series:metroid"]
    );
    assert_eq!(first.performers_created, vec!["samus aran"]);
    assert_eq!(first.studio_created.as_deref(), Some("painter"));

    // A post that no longer exists is "no data", not an error upstream.
    assert_eq!(
        results[1].outcome,
        ItemOutcome::Failed("no data returned from any strategy".into())
    );
    assert_eq!(
        results[2].outcome,
        ItemOutcome::Skipped(SkipReason::ExclusionTag("[scraped]".into()))
    );

    let stats = scraper.stats();
    assert_eq!((stats.total, stats.processed), (3, 3));
    assert_eq!((stats.successful, stats.failed, stats.skipped), (1, 1, 1));
    assert_eq!(stats.tags_created, 2);

    let updates = store.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, "1");
    assert_eq!(
        store.entity_names(EntityKind::Performer),
        vec!["samus aran".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_dry_run_touches_nothing() {
    let client = MockClient::new()
        .with_html(&post_url(77), POST_HTML);
    let store = Arc::new(MemoryStore::new().with_item(image("1", "/media/r34_77.png")));

    let options = BulkOptions {
        dry_run: true,
        ..Default::default()
    };
    let mut scraper = BulkScraper::new(store.clone(), options)
        .with_strategy(post_page_strategy(client));
    let results = scraper.run(ItemKind::Image, None, None).await.unwrap();

    assert!(results[0].is_success());
    assert!(store.updates().is_empty());
    assert!(store.entity_names(EntityKind::Tag).is_empty());
    assert!(store.entity_names(EntityKind::Studio).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retries_share_the_run_rate_limit() {
    let client = Arc::new(
        MockClient::new()
            .with_sequence(
                &post_url(77),
                vec![MockResponse::Status(429, String::new()), MockResponse::Html(POST_HTML.into())],
            )
            .with_html(&post_url(80), POST_HTML),
    );
    let limiter = RateLimiter::new(Duration::from_secs(5));
    let fetcher = Arc::new(ResilientFetcher::new(
        client.clone(),
        limiter.clone(),
        RetryPolicy::new(3, Duration::from_secs(1)),
    ));
    let strategy = Arc::new(PostPageStrategy::new(PostPage::new(fetcher, SITE), None, "r34"));
    let store = Arc::new(
        MemoryStore::new()
            .with_item(image("1", "/media/r34_77_samus.png"))
            .with_item(image("2", "/media/r34_80_samus.png")),
    );
    let mut scraper = BulkScraper::new(store, BulkOptions::default()).with_strategy(strategy);

    let start = Instant::now();
    let results = scraper.run(ItemKind::Image, None, None).await.unwrap();

    assert!(results.iter().all(|r| r.is_success()));
    assert_eq!(client.requests().len(), 3);
    // 429 at 0s, 1s backoff, retry held by the limiter until 5s, next item at 10s.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(10), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(11), "elapsed {elapsed:?}");
}
