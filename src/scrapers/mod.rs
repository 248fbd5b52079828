pub mod mock;
pub mod page;
pub mod traits;
pub mod types;

pub use mock::MockPriceSource;
pub use page::PageScraper;
pub use traits::PriceSource;
pub use types::{FetchOptions, ScrapedListing};
