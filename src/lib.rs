pub mod bidding;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ids;
pub mod items;
pub mod keys;
pub mod lock;
pub mod query;
pub mod state;
pub mod store;
pub mod transaction;
pub mod users;
pub mod views;
