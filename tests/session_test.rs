//! Session tracker used the way the handlers use it
//!
//! Run with: cargo test --test session_test

use std::sync::Arc;

use pretty_assertions::assert_eq;
use wordzen::core::session::{InMemorySessions, SessionData, SessionStore, Step};
use wordzen::core::types::Source;

#[tokio::test]
async fn registration_collects_fields_across_steps() {
    let sessions = InMemorySessions::new();

    sessions.begin(7, Step::Source).await;
    sessions
        .update(
            7,
            SessionData {
                source: Some(Source::Teacher),
                ..Default::default()
            },
        )
        .await;
    sessions.advance(7, Step::Promo).await;
    sessions
        .update(
            7,
            SessionData {
                promo_code: Some("TEACHER01".to_string()),
                ..Default::default()
            },
        )
        .await;
    sessions.advance(7, Step::Email).await;
    sessions
        .update(
            7,
            SessionData {
                email: Some("reader@mail.uz".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert_eq!(sessions.current_step(7).await, Some(Step::Email));
    let data = sessions.data(7).await.unwrap();
    assert_eq!(data.source, Some(Source::Teacher));
    assert_eq!(data.promo_code.as_deref(), Some("TEACHER01"));
    assert_eq!(data.email.as_deref(), Some("reader@mail.uz"));
    assert_eq!(data.telegram, None);
}

#[tokio::test]
async fn ending_a_session_forgets_it() {
    let sessions = InMemorySessions::new();
    sessions.begin(7, Step::MessageToAdmin).await;

    assert_eq!(sessions.end(7).await, Some(Step::MessageToAdmin));
    assert_eq!(sessions.end(7).await, None);
    assert_eq!(sessions.data(7).await, None);
}

#[tokio::test]
async fn shared_store_is_visible_from_every_clone() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessions::new());

    let mut tasks = Vec::new();
    for user_id in 1..=20 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            store.begin(user_id, Step::BookSelection).await;
            store
                .update(
                    user_id,
                    SessionData {
                        books: Some(vec![user_id as usize]),
                        ..Default::default()
                    },
                )
                .await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for user_id in 1..=20 {
        let data = store.data(user_id).await.unwrap();
        assert_eq!(data.selected_books(), &[user_id as usize]);
    }
}
