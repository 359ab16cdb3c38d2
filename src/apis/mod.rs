pub mod odds_feed;
pub mod season_page;

pub use odds_feed::OddsFeedClient;
pub use season_page::SeasonPageClient;
