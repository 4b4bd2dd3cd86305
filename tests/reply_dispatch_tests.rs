//! # Order Matching and Reply Dispatch Tests
//!
//! Covers composite RID matching against the store and the one-time welcome
//! reply, including the order detail lookup chain.


use std::sync::Arc;
use test_helpers::*;
use wb_autobot::bot::{
    match_order, media_target, FolderLayout, OrderDate, OrderInfoSource, ReplyDispatcher,
    ReplyOutcome, TargetKind,
};
use wb_autobot::localization::create_localization_manager;
use wb_autobot::traits::OrderStore;
use wb_autobot::wb::types::ChatSummary;

fn dispatcher(language: &str) -> ReplyDispatcher {
    let localization = create_localization_manager().expect("Failed to create localization manager");
    ReplyDispatcher::new(localization, language)
}

#[tokio::test]
async fn test_composite_rid_matches_stored_order() {
    let store = FakeOrderStore::new();
    store.insert(new_task("ORD1", Some("UID123")));

    assert_eq!(match_order(store.as_ref(), "x.UID123.y").await.as_deref(), Some("ORD1"));
    assert_eq!(match_order(store.as_ref(), "plainid").await, None);
    assert_eq!(match_order(store.as_ref(), "x.OTHER.y").await, None);
}

#[tokio::test]
async fn test_match_against_sqlite_store() {
    let store = setup_test_store().await;
    store.insert_task(new_task("ORD1", Some("UID123"))).await.unwrap();

    assert_eq!(match_order(store.as_ref(), "x.UID123.y").await.as_deref(), Some("ORD1"));
    assert_eq!(match_order(store.as_ref(), "plainid").await, None);
}

#[tokio::test]
async fn test_store_failure_reads_as_no_match() {
    let store = FakeOrderStore::new();
    store.insert(new_task("ORD1", Some("UID123")));
    *store.fail.lock() = true;

    assert_eq!(match_order(store.as_ref(), "x.UID123.y").await, None);
}

#[test]
fn test_media_folder_selection() {
    let layout = FolderLayout::default();

    let matched = media_target(&layout, Some("ORD1"), Some("x.UID123.y"), "Анна", "c1");
    assert_eq!(matched.path, "WB_Orders/ORD1");
    assert_eq!(matched.kind, TargetKind::MatchedOrder);

    let by_rid = media_target(&layout, None, Some("a.b.c"), "Анна", "c1");
    assert_eq!(by_rid.path, "WB_Orders/a.b.c");
    assert_eq!(by_rid.kind, TargetKind::ChatRid);

    let by_chat = media_target(&layout, None, None, "Анна", "c1");
    assert!(by_chat.path.starts_with("WB_Chats/"));
    assert_eq!(by_chat.kind, TargetKind::ChatFolder);
}

#[tokio::test]
async fn test_single_reply_per_chat() {
    let world = TestWorld::new();
    let deps = world.collaborators();
    let mut dispatcher = dispatcher("ru");
    let event = client_message("e1", "c1", 100, "привет");

    let first = dispatcher.maybe_reply(&deps, "c1", "a.b.c", None, "Анна", &event).await;
    let second = dispatcher.maybe_reply(&deps, "c1", "a.b.c", None, "Анна", &event).await;

    assert_eq!(first, ReplyOutcome::Sent);
    assert_eq!(second, ReplyOutcome::AlreadyProcessed);
    let sent = world.chat.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat_id, "c1");
    assert_eq!(sent[0].reply_sign.as_deref(), Some("sign-c1"));
    assert!(dispatcher.is_processed("c1"));
}

#[tokio::test]
async fn test_failed_send_keeps_chat_eligible() {
    let world = TestWorld::new();
    let deps = world.collaborators();
    let mut dispatcher = dispatcher("ru");
    let event = client_message("e1", "c1", 100, "привет");

    *world.chat.fail_send.lock() = true;
    let outcome = dispatcher.maybe_reply(&deps, "c1", "a.b.c", None, "Анна", &event).await;
    assert_eq!(outcome, ReplyOutcome::Failed);
    assert!(!dispatcher.is_processed("c1"));

    *world.chat.fail_send.lock() = false;
    let outcome = dispatcher.maybe_reply(&deps, "c1", "a.b.c", None, "Анна", &event).await;
    assert_eq!(outcome, ReplyOutcome::Sent);
    assert_eq!(world.chat.sent_messages().len(), 1);
}

#[tokio::test]
async fn test_reply_sign_falls_back_to_chat_list() {
    let world = TestWorld::new();
    *world.chat.chats.lock() = vec![ChatSummary {
        chat_id: "c1".to_string(),
        reply_sign: Some("listed-sign".to_string()),
        client_name: None,
    }];
    let deps = world.collaborators();
    let mut dispatcher = dispatcher("ru");
    let mut event = client_message("e1", "c1", 100, "привет");
    event.reply_sign = None;

    dispatcher.maybe_reply(&deps, "c1", "rid", None, "Анна", &event).await;
    assert_eq!(
        world.chat.sent_messages()[0].reply_sign.as_deref(),
        Some("listed-sign")
    );
}

#[tokio::test]
async fn test_order_info_from_store_by_matched_id() {
    let world = TestWorld::new();
    world.store.insert(new_task("ORD1", Some("UID123")));
    let dispatcher = dispatcher("ru");

    let deps = world.collaborators();
    let matched = match_order(deps.store.as_ref(), "x.UID123.y").await;
    let info = dispatcher
        .lookup_order_info(&deps, "x.UID123.y", matched.as_deref())
        .await;
    assert_eq!(info.order_id, "ORD1");
    assert_eq!(info.source, OrderInfoSource::Store);
    assert_eq!(info.article.as_deref(), Some("ART-1"));
    assert_eq!(*world.orders.calls.lock(), 0);
}

#[tokio::test]
async fn test_order_info_from_orders_api() {
    let world = TestWorld::new();
    *world.orders.orders.lock() = vec![new_order("777")];
    let dispatcher = dispatcher("ru");

    let info = dispatcher.lookup_order_info(&world.collaborators(), "777", None).await;
    assert_eq!(info.order_id, "777");
    assert_eq!(info.source, OrderInfoSource::OrdersApi);
    assert_eq!(
        info.order_date,
        OrderDate::Raw("2024-02-01T08:15:00Z".to_string())
    );
}

#[tokio::test]
async fn test_order_info_fallback_when_everything_fails() {
    let world = TestWorld::new();
    *world.orders.fail.lock() = true;
    let deps = world.collaborators();
    let mut dispatcher = dispatcher("ru");

    let info = dispatcher.lookup_order_info(&deps, "a.b.c", None).await;
    assert_eq!(info.order_id, "a.b.c");
    assert_eq!(info.order_date, OrderDate::Unknown);
    assert_eq!(info.source, OrderInfoSource::Fallback);

    // The reply still goes out with placeholders
    let event = client_message("e1", "c1", 100, "");
    dispatcher.maybe_reply(&deps, "c1", "a.b.c", None, "Анна", &event).await;
    let text = &world.chat.sent_messages()[0].text;
    assert!(text.contains("a.b.c от недавно, артикул - неизвестно"));
}

#[tokio::test]
async fn test_reply_language_english() {
    let world = TestWorld::new();
    world.store.insert(new_task("ORD1", Some("UID123")));
    let deps = world.collaborators();
    let mut dispatcher = dispatcher("en-US");
    let event = client_message("e1", "c1", 100, "hello");

    dispatcher.maybe_reply(&deps, "c1", "ORD1", None, "Anna", &event).await;
    let text = &world.chat.sent_messages()[0].text;
    assert!(text.contains("Your order number ORD1 from 15.01.2024 10:30, article ART-1"));
}

#[tokio::test]
async fn test_unknown_language_falls_back_to_russian() {
    let localization = create_localization_manager().unwrap();
    let dispatcher = ReplyDispatcher::new(Arc::clone(&localization), "de");
    let world = TestWorld::new();

    let info = dispatcher.lookup_order_info(&world.collaborators(), "plain", None).await;
    let text = dispatcher.compose_welcome_message(&info);
    assert!(text.contains("Ваш номер заказа plain"));
}
