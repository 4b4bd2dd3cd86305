//! Marketplace and chat API clients.

pub mod chat_api;
pub mod client;
pub mod orders_api;
pub mod types;

pub use chat_api::ChatApi;
pub use client::{RetryPolicy, WbHttpClient};
pub use orders_api::OrdersApi;
