pub mod browser;
pub mod extract;
pub mod humanize;
pub mod session;
pub mod static_page;
pub mod traits;
pub mod types;

pub use browser::ChromeSession;
pub use session::ListingCrawler;
pub use static_page::StaticPage;
