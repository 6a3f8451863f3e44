//! Session protocol handler: interprets inbound typed messages, mutates the
//! connection's session context, and dispatches classifier calls.

use std::time::Duration;

use quill_core::checker::WritingChecker;
use quill_core::events::{ClientMessage, ServerEvent};
use quill_core::ids::ClientId;

use crate::connection::ConnectionManager;

/// Parse one inbound text frame and dispatch it.
///
/// A frame that is not valid JSON (or lacks a `type`) gets an `error` event
/// and the loop continues — a bad frame never tears down the connection.
pub async fn handle_frame(
    manager: &ConnectionManager,
    checker: &dyn WritingChecker,
    client_id: &ClientId,
    raw: &str,
    checker_timeout: Duration,
) {
    match serde_json::from_str::<ClientMessage>(raw) {
        Ok(msg) => handle_message(manager, checker, client_id, msg, checker_timeout).await,
        Err(e) => {
            tracing::debug!(client_id = %client_id, error = %e, "malformed inbound frame");
            manager
                .send_to(client_id, &ServerEvent::error(format!("invalid message: {e}")))
                .await;
        }
    }
}

/// Dispatch one typed message for a connection.
///
/// Session states are advisory: every message type is accepted whether or
/// not `start_session` has been seen. Classifier and advisory faults become
/// an `error` event for this connection only.
pub async fn handle_message(
    manager: &ConnectionManager,
    checker: &dyn WritingChecker,
    client_id: &ClientId,
    msg: ClientMessage,
    checker_timeout: Duration,
) {
    match msg {
        ClientMessage::StartSession => {
            if manager.with_context(client_id, |ctx| ctx.start()).await.is_none() {
                return;
            }
            manager
                .send_to(
                    client_id,
                    &ServerEvent::SessionStarted {
                        message: "Writing session started.".into(),
                    },
                )
                .await;
        }

        ClientMessage::TextUpdate { text } => {
            // `text` is the full buffer each update, not a delta.
            let Some(newest) = manager
                .with_context(client_id, |ctx| ctx.apply_update(&text))
                .await
            else {
                return; // disconnected mid-processing
            };
            // Same last sentence as before means nothing new to analyze.
            let Some(sentence) = newest else {
                return;
            };

            manager
                .send_to(
                    client_id,
                    &ServerEvent::Analyzing {
                        sentence: sentence.clone(),
                    },
                )
                .await;

            match tokio::time::timeout(
                checker_timeout,
                checker.check_sentence(&sentence, Some(&text)),
            )
            .await
            {
                Ok(Ok(feedback)) => {
                    manager
                        .send_to(client_id, &ServerEvent::feedback(sentence, feedback))
                        .await;
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        client_id = %client_id,
                        error_kind = e.error_kind(),
                        "sentence check failed"
                    );
                    manager
                        .send_to(
                            client_id,
                            &ServerEvent::error(format!("sentence check failed: {e}")),
                        )
                        .await;
                }
                Err(_) => {
                    tracing::warn!(client_id = %client_id, "sentence check timed out");
                    manager
                        .send_to(client_id, &ServerEvent::error("sentence check timed out"))
                        .await;
                }
            }
        }

        ClientMessage::RequestImprovement { text } => {
            match tokio::time::timeout(checker_timeout, checker.improve_text(&text)).await {
                Ok(Ok(report)) => {
                    manager
                        .send_to(client_id, &ServerEvent::Improvement { data: report })
                        .await;
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        client_id = %client_id,
                        error_kind = e.error_kind(),
                        "improvement request failed"
                    );
                    manager
                        .send_to(
                            client_id,
                            &ServerEvent::error(format!("improvement request failed: {e}")),
                        )
                        .await;
                }
                Err(_) => {
                    tracing::warn!(client_id = %client_id, "improvement request timed out");
                    manager
                        .send_to(client_id, &ServerEvent::error("improvement request timed out"))
                        .await;
                }
            }
        }

        ClientMessage::Ping => {
            manager.send_to(client_id, &ServerEvent::Pong).await;
        }

        ClientMessage::Unknown => {
            tracing::debug!(client_id = %client_id, "ignoring unrecognized message type");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_check::MockChecker;
    use quill_core::errors::CheckerError;
    use quill_core::feedback::{ImprovementReport, SentenceFeedback};
    use tokio::sync::mpsc;

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn setup(id: &str) -> (ConnectionManager, ClientId, mpsc::Receiver<String>) {
        let manager = ConnectionManager::new(32);
        let client_id = ClientId::from_raw(id);
        let rx = manager.register(client_id.clone()).unwrap();
        (manager, client_id, rx)
    }

    fn next_event(rx: &mut mpsc::Receiver<String>) -> serde_json::Value {
        let json = rx.try_recv().expect("expected an event");
        serde_json::from_str(&json).unwrap()
    }

    fn assert_no_event(rx: &mut mpsc::Receiver<String>) {
        assert!(rx.try_recv().is_err(), "expected no further events");
    }

    #[tokio::test]
    async fn end_to_end_message_flow() {
        let (manager, id, mut rx) = setup("c1");
        let checker = MockChecker::new().with_sentence(SentenceFeedback::neutral("looks good"));

        handle_message(&manager, &checker, &id, ClientMessage::StartSession, TIMEOUT).await;
        assert_eq!(next_event(&mut rx)["type"], "session_started");

        handle_message(
            &manager,
            &checker,
            &id,
            ClientMessage::TextUpdate {
                text: "I like cat.".into(),
            },
            TIMEOUT,
        )
        .await;
        let analyzing = next_event(&mut rx);
        assert_eq!(analyzing["type"], "analyzing");
        assert_eq!(analyzing["sentence"], "I like cat.");
        let feedback = next_event(&mut rx);
        assert_eq!(feedback["type"], "feedback");
        assert_eq!(feedback["sentence"], "I like cat.");
        assert_eq!(feedback["score"], 1.0);

        handle_message(&manager, &checker, &id, ClientMessage::Ping, TIMEOUT).await;
        assert_eq!(next_event(&mut rx)["type"], "pong");
        assert_no_event(&mut rx);
    }

    #[tokio::test]
    async fn duplicate_text_update_analyzed_once() {
        let (manager, id, mut rx) = setup("c1");
        let checker = MockChecker::new().with_sentence(SentenceFeedback::neutral("ok"));

        let update = ClientMessage::TextUpdate {
            text: "Hello world.".into(),
        };
        handle_message(&manager, &checker, &id, update.clone(), TIMEOUT).await;
        handle_message(&manager, &checker, &id, update, TIMEOUT).await;

        assert_eq!(next_event(&mut rx)["type"], "analyzing");
        assert_eq!(next_event(&mut rx)["type"], "feedback");
        assert_no_event(&mut rx);
        assert_eq!(checker.call_count(), 1);
    }

    #[tokio::test]
    async fn incomplete_text_triggers_nothing() {
        let (manager, id, mut rx) = setup("c1");
        let checker = MockChecker::new();

        handle_message(
            &manager,
            &checker,
            &id,
            ClientMessage::TextUpdate {
                text: "still typing".into(),
            },
            TIMEOUT,
        )
        .await;

        assert_no_event(&mut rx);
        assert_eq!(checker.call_count(), 0);
    }

    #[tokio::test]
    async fn classifier_failure_surfaces_as_error_event() {
        let (manager, id, mut rx) = setup("c1");
        let checker =
            MockChecker::new().with_sentence_error(CheckerError::NetworkError("down".into()));

        handle_message(
            &manager,
            &checker,
            &id,
            ClientMessage::TextUpdate { text: "Oops.".into() },
            TIMEOUT,
        )
        .await;

        assert_eq!(next_event(&mut rx)["type"], "analyzing");
        let error = next_event(&mut rx);
        assert_eq!(error["type"], "error");
        assert!(error["message"].as_str().unwrap().contains("sentence check failed"));
    }

    #[tokio::test]
    async fn classifier_failure_isolated_to_one_connection() {
        let manager = ConnectionManager::new(32);
        let a = ClientId::from_raw("a");
        let b = ClientId::from_raw("b");
        let mut rx_a = manager.register(a.clone()).unwrap();
        let mut rx_b = manager.register(b.clone()).unwrap();

        let checker = MockChecker::new()
            .with_sentence_error(CheckerError::ServerError {
                status: 500,
                body: "boom".into(),
            })
            .with_sentence(SentenceFeedback::neutral("fine"));

        handle_message(
            &manager,
            &checker,
            &a,
            ClientMessage::TextUpdate { text: "First.".into() },
            TIMEOUT,
        )
        .await;
        handle_message(
            &manager,
            &checker,
            &b,
            ClientMessage::TextUpdate { text: "Second.".into() },
            TIMEOUT,
        )
        .await;

        assert_eq!(next_event(&mut rx_a)["type"], "analyzing");
        assert_eq!(next_event(&mut rx_a)["type"], "error");
        assert_no_event(&mut rx_a);

        assert_eq!(next_event(&mut rx_b)["type"], "analyzing");
        assert_eq!(next_event(&mut rx_b)["type"], "feedback");
        assert_no_event(&mut rx_b);
    }

    #[tokio::test]
    async fn improvement_request_returns_report() {
        let (manager, id, mut rx) = setup("c1");
        let mut report = ImprovementReport::neutral("a solid draft");
        report.score = 0.8;
        let checker = MockChecker::new().with_improvement(report);

        handle_message(
            &manager,
            &checker,
            &id,
            ClientMessage::RequestImprovement {
                text: "My essay. It is short.".into(),
            },
            TIMEOUT,
        )
        .await;

        let event = next_event(&mut rx);
        assert_eq!(event["type"], "improvement");
        assert_eq!(event["data"]["overall_assessment"], "a solid draft");
        assert_eq!(event["data"]["score"], 0.8);
    }

    #[tokio::test]
    async fn improvement_failure_surfaces_as_error_event() {
        let (manager, id, mut rx) = setup("c1");
        let checker = MockChecker::new()
            .with_improvement_error(CheckerError::RateLimited { retry_after: None });

        handle_message(
            &manager,
            &checker,
            &id,
            ClientMessage::RequestImprovement { text: "Text.".into() },
            TIMEOUT,
        )
        .await;

        let error = next_event(&mut rx);
        assert_eq!(error["type"], "error");
        assert!(error["message"]
            .as_str()
            .unwrap()
            .contains("improvement request failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_classifier_times_out() {
        let (manager, id, mut rx) = setup("c1");
        let checker = MockChecker::new()
            .with_delayed_sentence(Duration::from_secs(120), SentenceFeedback::neutral("late"));

        handle_message(
            &manager,
            &checker,
            &id,
            ClientMessage::TextUpdate { text: "Slow.".into() },
            Duration::from_secs(30),
        )
        .await;

        assert_eq!(next_event(&mut rx)["type"], "analyzing");
        let error = next_event(&mut rx);
        assert_eq!(error["type"], "error");
        assert!(error["message"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn malformed_frame_emits_error_and_continues() {
        let (manager, id, mut rx) = setup("c1");
        let checker = MockChecker::new();

        handle_frame(&manager, &checker, &id, "this is not json", TIMEOUT).await;
        let error = next_event(&mut rx);
        assert_eq!(error["type"], "error");
        assert!(error["message"].as_str().unwrap().contains("invalid message"));

        // the connection still works afterwards
        handle_frame(&manager, &checker, &id, r#"{"type":"ping"}"#, TIMEOUT).await;
        assert_eq!(next_event(&mut rx)["type"], "pong");
    }

    #[tokio::test]
    async fn frame_without_type_emits_error() {
        let (manager, id, mut rx) = setup("c1");
        let checker = MockChecker::new();

        handle_frame(&manager, &checker, &id, r#"{"text":"hi"}"#, TIMEOUT).await;
        assert_eq!(next_event(&mut rx)["type"], "error");
    }

    #[tokio::test]
    async fn unknown_type_silently_ignored() {
        let (manager, id, mut rx) = setup("c1");
        let checker = MockChecker::new();

        handle_frame(
            &manager,
            &checker,
            &id,
            r#"{"type":"reticulate_splines"}"#,
            TIMEOUT,
        )
        .await;
        assert_no_event(&mut rx);
    }

    #[tokio::test]
    async fn messages_for_disconnected_client_are_dropped() {
        let (manager, id, _rx) = setup("c1");
        manager.unregister(&id);
        let checker = MockChecker::new();

        // must not panic, must not call the checker
        handle_message(
            &manager,
            &checker,
            &id,
            ClientMessage::TextUpdate { text: "Gone.".into() },
            TIMEOUT,
        )
        .await;
        handle_message(&manager, &checker, &id, ClientMessage::StartSession, TIMEOUT).await;
        assert_eq!(checker.call_count(), 0);
    }
}
