//! The booru-style content provider: post API, post pages and wiki.

pub mod credentials;
pub mod identity;
pub mod mapping;
pub mod post_api;
pub mod post_page;
pub mod strategies;
pub mod wiki;

pub const DEFAULT_SITE_URL: &str = "https://rule34.xxx";
pub const DEFAULT_API_URL: &str = "https://api.rule34.xxx";
pub const DEFAULT_TAG_PREFIX: &str = "r34";

pub use credentials::Credentials;
pub use identity::{identify, PostIdentifier};
pub use mapping::{to_scraped_data, PostMeta, TagCategories, TagStyle};
pub use post_api::{PostApi, PostRecord};
pub use post_page::PostPage;
pub use strategies::{PostApiStrategy, PostPageStrategy, POST_API_STRATEGY, POST_PAGE_STRATEGY};
pub use wiki::WikiScraper;
