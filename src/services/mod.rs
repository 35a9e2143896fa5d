mod page_fetcher;

pub use page_fetcher::{Link, Page, PageFetcher};
