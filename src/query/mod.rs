pub mod rankings;
pub mod search;

pub use rankings::{RankedItem, Ranking, RankingQueries};
pub use search::{ItemSearch, ItemSummary};
