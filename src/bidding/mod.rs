pub mod commands;
pub mod model;

pub use commands::{BidRepository, PlaceBidCommand};
pub use model::{Bid, CreateItemAttrs, Item, MAX_EXACT_AMOUNT};
