#![forbid(unsafe_code)]

mod config;
mod crawler;
mod discover;
mod error;
mod normalize;
mod queue;

pub use config::{CrawlConfig, CrawlConfigBuilder, Credentials, UrlPriority, BLOCKED_EXTENSIONS, DEFAULT_PRIORITY_PATTERNS};
pub use crawler::{CrawlResult, CrawlState, CrawledPage, IntelligentCrawler};
pub use discover::{DiscoveredForm, FormField};
pub use error::CrawlerError;
pub use normalize::normalize_url;
pub use queue::CrawlQueueItem;
