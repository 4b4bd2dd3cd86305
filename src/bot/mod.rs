//! Bot module: chat-to-order reconciliation and the polling cycle
//!
//! This module is split into several submodules:
//! - `rid_resolver`: finds the order reference (RID) of a chat
//! - `order_matcher`: maps composite RIDs to stored orders and picks media folders
//! - `reply_dispatcher`: sends the one-time welcome reply per chat
//! - `media_handlers`: copies buyer image attachments to the remote disk
//! - `event_cycle`: owns the bot state and drives one poll cycle after another

pub mod event_cycle;
pub mod media_handlers;
pub mod order_matcher;
pub mod reply_dispatcher;
pub mod rid_resolver;

use std::sync::Arc;

use crate::traits::{ChatTransport, OrderSource, OrderStore, RemoteStorage};

/// External collaborators shared by the pipeline stages
#[derive(Clone)]
pub struct Collaborators {
    pub orders: Arc<dyn OrderSource>,
    pub chat: Arc<dyn ChatTransport>,
    pub store: Arc<dyn OrderStore>,
    pub storage: Arc<dyn RemoteStorage>,
}

pub use event_cycle::{ChatEventsReport, CycleReport, EventCycle};
pub use media_handlers::{save_event_media, MediaSaveReport};
pub use order_matcher::{match_order, media_target, FolderLayout, MediaTarget, TargetKind};
pub use reply_dispatcher::{
    format_order_date, OrderDate, OrderInfo, OrderInfoSource, ReplyDispatcher, ReplyOutcome,
};
pub use rid_resolver::{RidResolution, RidResolver, RidSource};
