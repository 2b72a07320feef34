pub mod crawl;
pub mod error;
pub mod output;
pub mod source;

pub use crawl::{
    CrawlOptions, CrawlProgressCallback, CrawlReport, execute_crawl, generate_crawl_report,
};
pub use error::CoreError;
pub use output::{LineCounts, OutputPaths};
