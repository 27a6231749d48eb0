mod common;

use std::time::Duration;

use aitu_gateway::{ConnectionState, RECONNECT_DELAY};
use aitu_sync::{Command, SendOutcome, SendRejection};
use aitu_types::events::ClientFrame;
use aitu_types::models::ConversationId;
use tokio::time::Instant;

use common::{FakeApi, Harness, contents, direct, group, message, user};

fn join(id: &str) -> ClientFrame {
    ClientFrame::Join {
        conversation_id: ConversationId::from(id),
    }
}

#[tokio::test(start_paused = true)]
async fn selecting_fetches_history_and_joins() {
    let ada = user("u2", "Ada", "Lovelace");
    let api = FakeApi::new().with(|s| s.conversations = Some(vec![direct("1", &ada)]));
    let mut h = Harness::new(api);
    let mut link = h.boot().await;

    let view = h.orch.view();
    assert!(!view.loading);
    assert_eq!(view.conversations.len(), 1);
    assert_eq!(view.conversations[0].display_name(), "Ada Lovelace");

    h.orch.select_conversation(view.conversations[0].clone());
    h.settle().await;

    assert_eq!(h.api.history_requests(), vec![ConversationId::from("1")]);
    assert_eq!(link.written(), vec![join("1")]);
    let view = h.orch.view();
    assert_eq!(view.active.map(|c| c.id), Some(ConversationId::from("1")));
    assert!(view.messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn join_waits_for_the_socket_to_open() {
    let mut h = Harness::new(FakeApi::new());
    h.orch.start();
    h.settle().await;

    // Socket is still opening
    h.orch.select_conversation(group("1", "SE-2203"));
    h.settle().await;

    let mut link = h.opened.recv().await.unwrap();
    assert!(link.written().is_empty());

    link.accept();
    h.settle().await;
    assert_eq!(link.written(), vec![join("1")]);
}

#[tokio::test(start_paused = true)]
async fn push_for_active_conversation_appends_at_end() {
    let api = FakeApi::new().with(|s| {
        s.histories
            .insert("1".into(), vec![message("1", "u2", "a"), message("1", "u2", "b")]);
    });
    let mut h = Harness::new(api);
    let link = h.boot().await;
    h.orch.select_conversation(group("1", "SE-2203"));
    h.settle().await;

    link.push(&message("1", "u2", "hi"));
    h.settle().await;

    assert_eq!(contents(&h.orch.view().messages), ["a", "b", "hi"]);
}

#[tokio::test(start_paused = true)]
async fn unexpected_close_reconnects_after_fixed_delay_and_rejoins() {
    let mut h = Harness::new(FakeApi::new());
    let mut first = h.boot().await;
    h.orch.select_conversation(group("1", "SE-2203"));
    h.settle().await;
    assert_eq!(first.written(), vec![join("1")]);

    let dropped_at = Instant::now();
    first.drop_connection();
    h.settle().await;

    assert_eq!(h.orch.connection_state(), ConnectionState::Disconnected);
    assert_eq!(h.orch.connection().reconnect_deadline(), Some(dropped_at + RECONNECT_DELAY));
    assert!(h.opened.try_recv().is_err());

    // Timer fires, a new link is opened
    h.orch.step().await;
    let fired = Instant::now() - dropped_at;
    assert!(fired >= RECONNECT_DELAY && fired < RECONNECT_DELAY + Duration::from_millis(2));
    assert_eq!(h.orch.connection_state(), ConnectionState::Connecting);

    let mut second = h.opened.recv().await.unwrap();
    assert_ne!(second.id, first.id);
    second.accept();
    h.settle().await;

    assert!(h.orch.connection().is_connected());
    assert_eq!(second.written(), vec![join("1")]);
    assert!(first.written().is_empty());
    assert!(h.opened.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn submit_while_disconnected_changes_nothing() {
    let api = FakeApi::new().with(|s| {
        s.histories.insert("1".into(), vec![message("1", "u2", "a")]);
    });
    let mut h = Harness::new(api);
    let link = h.boot().await;
    h.orch.select_conversation(group("1", "SE-2203"));
    h.settle().await;

    link.drop_connection();
    h.settle().await;

    h.orch.set_compose("hello");
    assert_eq!(
        h.orch.send_message(),
        SendOutcome::Rejected(SendRejection::NotConnected)
    );
    assert_eq!(h.orch.compose(), "hello");
    assert_eq!(contents(&h.orch.view().messages), ["a"]);
    assert!(!h.orch.view().can_send());
}

#[tokio::test(start_paused = true)]
async fn sent_message_appears_only_through_echo() {
    let mut h = Harness::new(FakeApi::new());
    let mut link = h.boot().await;
    h.orch.select_conversation(group("1", "SE-2203"));
    h.settle().await;
    link.written();

    h.orch.set_compose("on my way");
    assert_eq!(h.orch.send_message(), SendOutcome::Sent);
    h.settle().await;
    assert!(h.orch.view().messages.is_empty());
    assert_eq!(
        link.written(),
        vec![ClientFrame::Message {
            conversation_id: "1".into(),
            content: "on my way".into()
        }]
    );

    link.push(&message("1", "me", "on my way"));
    h.settle().await;
    let view = h.orch.view();
    assert_eq!(contents(&view.messages), ["on my way"]);
    assert!(view.is_mine(&view.messages[0]));
}

#[tokio::test(start_paused = true)]
async fn thousand_pushes_keep_arrival_order() {
    let mut h = Harness::new(FakeApi::new());
    let link = h.boot().await;
    h.orch.select_conversation(group("1", "SE-2203"));
    h.settle().await;

    for i in 0..1000 {
        link.push(&message("1", "u2", &i.to_string()));
    }
    h.settle().await;

    let view = h.orch.view();
    assert_eq!(view.messages.len(), 1000);
    for (i, msg) in view.messages.iter().enumerate() {
        assert_eq!(msg.content, i.to_string());
    }
}

#[tokio::test(start_paused = true)]
async fn refetch_replaces_accumulated_pushes() {
    let mut h = Harness::new(FakeApi::new());
    let link = h.boot().await;
    h.orch.select_conversation(group("1", "SE-2203"));
    h.settle().await;

    link.push(&message("1", "u2", "live"));
    h.settle().await;
    assert_eq!(h.orch.cache().len(&"1".into()), 1);

    h.api.state.lock().unwrap().histories.insert(
        "1".into(),
        vec![message("1", "u2", "x"), message("1", "u2", "y")],
    );
    h.orch.select_conversation(group("1", "SE-2203"));
    h.settle().await;

    assert_eq!(contents(&h.orch.view().messages), ["x", "y"]);
}

#[tokio::test(start_paused = true)]
async fn slow_history_lands_on_its_own_conversation() {
    let api = FakeApi::new().with(|s| {
        s.histories.insert("1".into(), vec![message("1", "u2", "old")]);
        s.histories.insert("2".into(), vec![message("2", "u3", "two")]);
        s.history_delays.insert("1".into(), Duration::from_millis(500));
    });
    let mut h = Harness::new(api);
    let link = h.boot().await;

    h.orch.select_conversation(group("1", "slow"));
    h.orch.select_conversation(group("2", "fast"));
    h.settle().await;
    assert_eq!(contents(&h.orch.view().messages), ["two"]);

    link.push(&message("1", "u2", "live"));
    h.settle().await;
    assert_eq!(contents(h.orch.cache().messages(&"1".into())), ["live"]);

    // The late fetch overwrites conversation 1 without touching the active one
    h.orch.step().await;
    assert_eq!(contents(h.orch.cache().messages(&"1".into())), ["old"]);
    assert_eq!(contents(&h.orch.view().messages), ["two"]);

    // Switching back shows the cached list until the refetch resolves
    h.orch.select_conversation(group("1", "slow"));
    assert_eq!(contents(&h.orch.view().messages), ["old"]);
}

#[tokio::test(start_paused = true)]
async fn push_for_other_conversation_goes_to_its_own_list() {
    let mut h = Harness::new(FakeApi::new());
    let link = h.boot().await;
    h.orch.select_conversation(group("1", "SE-2203"));
    h.orch.select_conversation(group("2", "SE-2204"));
    h.settle().await;

    link.push(&message("1", "u2", "for one"));
    h.settle().await;

    assert!(h.orch.view().messages.is_empty());
    assert_eq!(contents(h.orch.cache().messages(&"1".into())), ["for one"]);
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_mutate_nothing() {
    let api = FakeApi::new().with(|s| {
        s.histories.insert("1".into(), vec![message("1", "u2", "a")]);
    });
    let mut h = Harness::new(api);
    let link = h.boot().await;
    h.orch.select_conversation(group("1", "SE-2203"));
    h.settle().await;
    let before = h.orch.view();

    link.push_text("not json at all");
    link.push_text(r#"{"type":"typing","conversation_id":"1"}"#);
    link.push_text(r#"{"type":"message","conversation_id":"1","content":"no author"}"#);
    link.push_text(r#"{"conversation_id":"1","content":"no type"}"#);
    h.settle().await;

    assert_eq!(h.orch.view(), before);
    assert!(h.orch.connection().is_connected());
}

#[tokio::test(start_paused = true)]
async fn failed_history_fetch_empties_the_list() {
    let mut h = Harness::new(FakeApi::new());
    let link = h.boot().await;
    h.orch.select_conversation(group("1", "SE-2203"));
    h.settle().await;
    link.push(&message("1", "u2", "live"));
    h.settle().await;

    h.api.state.lock().unwrap().failing_histories.push("1".into());
    h.orch.select_conversation(group("1", "SE-2203"));
    h.settle().await;

    assert!(h.orch.view().messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_conversation_fetch_leaves_empty_list_and_clears_loading() {
    let api = FakeApi::new().with(|s| s.conversations = None);
    let mut h = Harness::new(api);
    h.orch.start();
    assert!(h.orch.view().loading);
    h.settle().await;

    let view = h.orch.view();
    assert!(!view.loading);
    assert!(view.conversations.is_empty());
    // The socket still comes up
    assert!(h.opened.try_recv().is_ok());
}

#[tokio::test(start_paused = true)]
async fn failed_current_user_skips_connect() {
    let api = FakeApi::new().with(|s| s.me = None);
    let mut h = Harness::new(api);
    h.orch.start();
    h.settle().await;

    let view = h.orch.view();
    assert!(!view.loading);
    assert!(view.current_user.is_none());
    assert_eq!(h.api.conversation_requests(), 0);
    assert!(h.opened.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn start_chat_adds_and_selects_direct_conversation() {
    let timur = user("u9", "Timur", "B");
    let api = FakeApi::new().with(|s| {
        s.users = Some(vec![timur.clone()]);
        s.direct.insert(timur.id.clone(), "42".into());
    });
    let mut h = Harness::new(api);
    let mut link = h.boot().await;
    assert!(h.orch.store().is_empty());

    // The server lists the chat once it exists
    h.api.state.lock().unwrap().conversations = Some(vec![direct("42", &timur)]);

    h.orch.open_new_chat();
    h.settle().await;
    let view = h.orch.view();
    assert!(view.new_chat_open);
    assert_eq!(view.candidates, vec![timur.clone()]);

    h.orch.start_chat(timur.clone());
    h.settle().await;

    let view = h.orch.view();
    assert!(!view.new_chat_open);
    let active = view.active.unwrap();
    assert_eq!(active.id, ConversationId::from("42"));
    assert_eq!(active.display_name(), "Timur B");
    assert!(h.orch.store().contains(&"42".into()));
    assert_eq!(link.written(), vec![join("42")]);
    assert_eq!(h.api.history_requests(), vec![ConversationId::from("42")]);
    // Bootstrap plus the refresh after creating the chat
    assert_eq!(h.api.conversation_requests(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_user_list_keeps_picker_closed() {
    let api = FakeApi::new().with(|s| s.users = None);
    let mut h = Harness::new(api);
    h.boot().await;

    h.orch.open_new_chat();
    h.settle().await;

    let view = h.orch.view();
    assert!(!view.new_chat_open);
    assert!(view.candidates.is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_final_with_bootstrap_in_flight() {
    let mut h = Harness::new(FakeApi::new());
    h.orch.start();
    h.orch.handle_command(Command::Shutdown);
    h.settle().await;

    assert!(h.orch.is_closed());
    assert_eq!(h.orch.connection_state(), ConnectionState::Disconnected);
    assert!(h.opened.try_recv().is_err());
    assert_eq!(h.api.conversation_requests(), 0);
    assert!(h.orch.view().current_user.is_none());
}

#[tokio::test(start_paused = true)]
async fn no_reconnect_after_shutdown() {
    let mut h = Harness::new(FakeApi::new());
    let link = h.boot().await;

    h.orch.shutdown();
    link.drop_connection();
    tokio::time::sleep(RECONNECT_DELAY * 2).await;
    h.settle().await;

    assert!(!h.orch.connection().has_pending_reconnect());
    assert!(h.opened.try_recv().is_err());
    assert!(!h.orch.view().connected);
}

#[tokio::test(start_paused = true)]
async fn one_step_applies_a_whole_burst() {
    let mut h = Harness::new(FakeApi::new());
    let link = h.boot().await;
    h.orch.select_conversation(group("1", "SE-2203"));
    h.settle().await;

    let mut views = h.orch.subscribe();
    views.borrow_and_update();

    for i in 0..100 {
        link.push(&message("1", "u2", &i.to_string()));
    }
    h.orch.step().await;

    assert!(views.has_changed().unwrap());
    assert_eq!(views.borrow_and_update().messages.len(), 100);
}

#[tokio::test(start_paused = true)]
async fn refetch_bumps_history_generation() {
    let mut h = Harness::new(FakeApi::new());
    h.boot().await;
    h.orch.select_conversation(group("1", "SE-2203"));
    h.settle().await;
    let first = h.orch.view().history_generation;

    h.orch.select_conversation(group("1", "SE-2203"));
    h.settle().await;
    assert_eq!(h.orch.view().history_generation, first + 1);
}
