//! # WB Autobot
//!
//! A polling bot for a Wildberries seller account. Every cycle it stores new
//! marketplace orders locally and creates a remote folder per order, then
//! reads buyer chat events, works out which order each chat belongs to,
//! copies buyer photos into the matching Yandex Disk folder and sends one
//! welcome reply per chat.

pub mod bot;
pub mod config;
pub mod db;
pub mod deduplication;
pub mod disk;
pub mod errors;
pub mod localization;
pub mod observability;
pub mod observability_config;
pub mod order_patterns;
pub mod path_validation;
pub mod traits;
pub mod wb;

// Re-export types for easier access
pub use bot::{Collaborators, EventCycle};
pub use config::AppConfig;
pub use errors::{AppError, AppResult};
