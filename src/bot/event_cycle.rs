//! Poll cycle orchestration
//!
//! One [`EventCycle`] owns all mutable bot state: the event deduplicator, the
//! chat RID cache, the set of answered chats and the event checkpoint. A
//! cycle runs to completion, awaiting every collaborator call in sequence,
//! before the loop sleeps for the poll interval. Events of a batch are handled
//! strictly in delivery order.
//!
//! The deduplicator is not persisted. A crash in the middle of a batch
//! followed by a restart redelivers the batch, which may repeat media uploads
//! and folder creation. Replies are not repeated within one process lifetime.

use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::bot::media_handlers::save_event_media;
use crate::bot::order_matcher::{match_order, media_target, FolderLayout};
use crate::bot::reply_dispatcher::{ReplyDispatcher, ReplyOutcome};
use crate::bot::rid_resolver::RidResolver;
use crate::bot::Collaborators;
use crate::db::NewTask;
use crate::deduplication::EventDeduplicator;
use crate::errors::{error_logging, AppResult};
use crate::wb::types::{ChatEvent, NewOrder};

/// Counters of one chat-events step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatEventsReport {
    pub events_received: usize,
    pub duplicates: usize,
    pub new_messages: usize,
    pub media_saved: usize,
    pub replies_sent: usize,
}

/// Outcome of one full poll cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub iteration: u64,
    /// `None` when the order step failed
    pub orders_stored: Option<usize>,
    /// `None` when the events fetch failed
    pub chat_events: Option<ChatEventsReport>,
}

pub struct EventCycle {
    deps: Collaborators,
    layout: FolderLayout,
    deduplicator: EventDeduplicator,
    resolver: RidResolver,
    dispatcher: ReplyDispatcher,
    /// Unix ms; events at or before it are ignored
    checkpoint: i64,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl EventCycle {
    /// New cycle state with the checkpoint at the current time
    pub fn new(
        deps: Collaborators,
        layout: FolderLayout,
        deduplicator: EventDeduplicator,
        dispatcher: ReplyDispatcher,
    ) -> Self {
        Self {
            deps,
            layout,
            deduplicator,
            resolver: RidResolver::new(),
            dispatcher,
            checkpoint: now_ms(),
        }
    }

    pub fn checkpoint(&self) -> i64 {
        self.checkpoint
    }

    pub fn set_checkpoint(&mut self, checkpoint_ms: i64) {
        self.checkpoint = checkpoint_ms;
    }

    pub fn resolver(&self) -> &RidResolver {
        &self.resolver
    }

    pub fn dispatcher(&self) -> &ReplyDispatcher {
        &self.dispatcher
    }

    pub fn deduplicator(&self) -> &EventDeduplicator {
        &self.deduplicator
    }

    /// Store orders not seen before, each after its remote folder exists.
    ///
    /// Returns the number of orders stored.
    pub async fn process_new_orders(&mut self) -> AppResult<usize> {
        let orders = self.deps.orders.list_new_orders().await?;
        if orders.is_empty() {
            info!("No new orders");
            return Ok(0);
        }

        let mut stored = 0;
        for order in &orders {
            if self.store_order(order).await {
                stored += 1;
            }
        }

        info!(received = orders.len(), stored, "New orders processed");
        crate::observability::record_orders_stored(stored);
        Ok(stored)
    }

    async fn store_order(&self, order: &NewOrder) -> bool {
        if order.id.is_empty() {
            return false;
        }

        match self.deps.store.find_by_rid(&order.id).await {
            Ok(Some(_)) => return false,
            Ok(None) => {}
            Err(_) => return false,
        }

        info!(
            order_id = %order.id,
            order_uid = ?order.order_uid,
            article = ?order.article,
            nm_id = ?order.nm_id,
            price = ?order.price,
            created_at = ?order.created_at,
            "New order detected"
        );

        let folder = self.layout.order_folder(&order.id);
        if let Err(e) = self.deps.storage.ensure_folder(&folder).await {
            error_logging::log_storage_error(&e, "create_order_folder", Some(&folder), None);
            return false;
        }

        let task = NewTask {
            rid: order.id.clone(),
            order_uid: order.order_uid.clone(),
            nm_id: order.nm_id,
            article: order.article.clone(),
            price: order.price.map(|minor| minor as f64 / 100.0),
            created_at: order.created_at.clone(),
        };
        self.deps.store.insert_task(task).await.is_ok()
    }

    /// Fetch events since the checkpoint and run every new client message
    /// through the pipeline.
    ///
    /// A failed fetch abandons the step and leaves the checkpoint unchanged.
    /// After a fetched batch the checkpoint moves to the current time, whatever
    /// happened to the individual events.
    pub async fn process_chat_events(&mut self) -> AppResult<ChatEventsReport> {
        match self.deps.chat.list_chats().await {
            Ok(chats) => info!(chats = chats.len(), "Chat list received"),
            Err(e) => warn!(error = %e, "Chat list unavailable"),
        }

        let page = self.deps.chat.fetch_events(Some(self.checkpoint)).await?;
        let mut report = ChatEventsReport {
            events_received: page.events.len(),
            ..Default::default()
        };

        for event in &page.events {
            self.handle_event(event, &page.events, &mut report).await;
        }

        self.checkpoint = now_ms();
        info!(
            events = report.events_received,
            new_messages = report.new_messages,
            media_saved = report.media_saved,
            replies_sent = report.replies_sent,
            checkpoint = self.checkpoint,
            "Chat events processed"
        );
        Ok(report)
    }

    async fn handle_event(
        &mut self,
        event: &ChatEvent,
        batch: &[ChatEvent],
        report: &mut ChatEventsReport,
    ) {
        if self.deduplicator.seen(&event.event_id) {
            report.duplicates += 1;
            crate::observability::record_event("duplicate");
            return;
        }
        self.deduplicator.mark(&event.event_id);

        if event.timestamp <= self.checkpoint || !event.is_message() {
            crate::observability::record_event("stale_or_other");
            return;
        }
        if !event.is_from_client() {
            crate::observability::record_event("not_client");
            return;
        }

        report.new_messages += 1;
        crate::observability::record_event("client_message");

        let chat_id = event.chat_id.as_str();
        let client_name = event.client_name();
        if event.text().is_empty() {
            info!(chat_id = %chat_id, client = %client_name, added = ?event.add_time, "New media message");
        } else {
            info!(chat_id = %chat_id, client = %client_name, added = ?event.add_time, text = %event.text(), "New message");
        }

        let resolution = self
            .resolver
            .resolve(chat_id, event, batch, self.deps.chat.as_ref())
            .await;
        let rid = resolution.as_ref().map(|found| found.rid.as_str());

        let matched = match rid {
            Some(rid) => match_order(self.deps.store.as_ref(), rid).await,
            None => None,
        };
        let target = media_target(&self.layout, matched.as_deref(), rid, client_name, chat_id);

        if !event.images().is_empty() {
            debug!(chat_id = %chat_id, folder = %target.path, kind = ?target.kind, "Media target selected");
            let saved = save_event_media(&self.deps, event, &target).await;
            report.media_saved += saved.saved.len();
        }

        match rid {
            Some(rid) => {
                let outcome = self
                    .dispatcher
                    .maybe_reply(&self.deps, chat_id, rid, matched.as_deref(), client_name, event)
                    .await;
                if outcome == ReplyOutcome::Sent {
                    report.replies_sent += 1;
                }
            }
            None => info!(chat_id = %chat_id, "No RID, welcome reply not sent"),
        }
    }

    /// One full cycle: orders first, then chat events. Failures of either step
    /// are logged and do not stop the other.
    pub async fn run_cycle(&mut self, iteration: u64) -> CycleReport {
        let started = Instant::now();

        let orders_stored = match self.process_new_orders().await {
            Ok(stored) => Some(stored),
            Err(e) => {
                error_logging::log_internal_error(&e, "event_cycle", "process_new_orders");
                None
            }
        };

        let chat_events = match self.process_chat_events().await {
            Ok(report) => Some(report),
            Err(e) => {
                error_logging::log_internal_error(&e, "event_cycle", "process_chat_events");
                None
            }
        };

        let success = orders_stored.is_some() && chat_events.is_some();
        crate::observability::record_cycle(started.elapsed(), success);

        CycleReport {
            iteration,
            orders_stored,
            chat_events,
        }
    }

    /// Run cycles until `shutdown` is cancelled. Cancellation is honoured
    /// between cycles only.
    pub async fn run(&mut self, interval: Duration, shutdown: CancellationToken) {
        info!(interval_secs = interval.as_secs(), "Polling loop started");
        let mut iteration: u64 = 0;

        while !shutdown.is_cancelled() {
            iteration += 1;
            let report = self
                .run_cycle(iteration)
                .instrument(crate::observability::cycle_span(iteration))
                .await;

            if report.orders_stored.is_none() && report.chat_events.is_none() {
                error!(iteration, "Both cycle steps failed");
            }
            debug!(
                iteration,
                cached_chats = self.resolver.cached_chats(),
                answered_chats = self.dispatcher.processed_count(),
                dedup = ?self.deduplicator.stats(),
                "Cycle finished"
            );

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!(iterations = iteration, "Polling loop stopped");
    }
}
