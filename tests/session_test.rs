// tests/session_test.rs — Integration test: session machine over a scripted transport

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::broadcast;

use common::{initiate_response, recording, ScriptedTransport};
use dualqa::feedback::{FeedbackRecorder, FeedbackSubmission, Verdict};
use dualqa::infra::config::{RetryMode, SessionConfig};
use dualqa::infra::errors::QaError;
use dualqa::session::{Session, SessionHandle, SessionMachine, SessionStatus};
use dualqa::transport::ChannelEvent;

fn machine(transport: &Arc<ScriptedTransport>) -> SessionMachine {
    SessionMachine::new(transport.clone(), SessionConfig::default())
}

/// Submit and apply the initiate response.
async fn streaming(machine: &mut SessionMachine, question: &str) {
    machine.submit(question).unwrap();
    assert!(machine.step().await);
    assert_eq!(machine.status(), SessionStatus::Streaming);
}

async fn next_update(rx: &mut broadcast::Receiver<Session>) -> Session {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("update in time")
        .expect("channel open")
}

async fn feed(machine: &mut SessionMachine, transport: &ScriptedTransport, n: usize, event: ChannelEvent) {
    transport.emit(n, event);
    assert!(machine.step().await);
}

#[tokio::test]
async fn test_fast_answer_then_streamed_answer_completes() {
    let transport = ScriptedTransport::new();
    transport.push_response(Ok(initiate_response("s1", Some("X is a thing."))));
    let mut machine = machine(&transport);
    let (seen, observer) = recording();
    machine.subscribe(observer);

    machine.submit("What is X?").unwrap();
    assert_eq!(machine.status(), SessionStatus::AwaitingFastAnswer);
    assert!(machine.session().fast_answer.is_none());

    assert!(machine.step().await);
    let session = machine.session();
    assert_eq!(session.status, SessionStatus::Streaming);
    assert_eq!(session.id.as_deref(), Some("s1"));
    assert_eq!(session.fast_answer.as_ref().unwrap().text, "X is a thing.");
    assert_eq!(session.streamed_answer(), "");
    assert!(machine.has_open_channel());

    for fragment in ["Hel", "lo ", "world"] {
        feed(&mut machine, &transport, 0, ChannelEvent::Chunk(fragment.into())).await;
    }
    feed(&mut machine, &transport, 0, ChannelEvent::Complete).await;

    let session = machine.session();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.streamed_answer(), "Hello world");
    assert_eq!(session.fragment_count(), 3);
    assert!(session.error.is_none());
    assert!(!machine.has_open_channel());
    assert_eq!(transport.closed(), 1);

    // One snapshot per transition and per fragment, in order.
    let seen = seen.lock().unwrap();
    let statuses: Vec<_> = seen.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            SessionStatus::AwaitingFastAnswer,
            SessionStatus::Streaming,
            SessionStatus::Streaming,
            SessionStatus::Streaming,
            SessionStatus::Streaming,
            SessionStatus::Completed,
        ]
    );
    let texts: Vec<_> = seen[2..5].iter().map(|s| s.streamed_answer().to_string()).collect();
    assert_eq!(texts, vec!["Hel", "Hello ", "Hello world"]);
}

#[tokio::test]
async fn test_empty_question_rejected_without_transition() {
    let transport = ScriptedTransport::new();
    let mut machine = machine(&transport);
    let (seen, observer) = recording();
    machine.subscribe(observer);
    let generation = machine.generation();

    let err = machine.submit("   ").unwrap_err();
    assert!(matches!(err, QaError::Validation(_)));
    assert_eq!(machine.status(), SessionStatus::Idle);
    assert_eq!(machine.generation(), generation);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_before_fast_answer() {
    let transport = ScriptedTransport::new();
    transport.hold_initiate();
    let mut machine = machine(&transport);

    machine.submit("What is X?").unwrap();
    machine.cancel().unwrap();
    transport.release();

    let session = machine.session();
    assert_eq!(session.status, SessionStatus::Interrupted);
    assert!(session.error.is_none());
    assert!(session.id.is_none());
    assert_eq!(transport.opened(), 0);

    // The aborted request never lands.
    let late = tokio::time::timeout(Duration::from_millis(50), machine.step()).await;
    assert!(late.is_err());
    assert_eq!(machine.status(), SessionStatus::Interrupted);

    assert!(matches!(machine.retry().unwrap_err(), QaError::Unsupported(_)));
    assert!(matches!(
        machine.cancel().unwrap_err(),
        QaError::InvalidState { .. }
    ));
}

#[tokio::test]
async fn test_cancel_while_streaming_ignores_late_fragments() {
    let transport = ScriptedTransport::new();
    let mut machine = machine(&transport);
    streaming(&mut machine, "What is X?").await;
    feed(&mut machine, &transport, 0, ChannelEvent::Chunk("Hel".into())).await;

    machine.cancel().unwrap();
    assert_eq!(machine.status(), SessionStatus::Interrupted);
    assert!(machine.session().error.is_none());
    assert_eq!(transport.closed(), 1);

    // A fragment already in flight on the cancelled channel.
    feed(&mut machine, &transport, 0, ChannelEvent::Chunk("lo".into())).await;
    assert_eq!(machine.session().streamed_answer(), "Hel");
    assert_eq!(machine.status(), SessionStatus::Interrupted);
}

#[tokio::test]
async fn test_new_question_replaces_channel() {
    let transport = ScriptedTransport::new();
    transport.push_response(Ok(initiate_response("s1", None)));
    transport.push_response(Ok(initiate_response("s2", None)));
    let mut machine = machine(&transport);

    streaming(&mut machine, "first").await;
    feed(&mut machine, &transport, 0, ChannelEvent::Chunk("one".into())).await;

    machine.submit("second").unwrap();
    assert_eq!(transport.closed(), 1);
    assert!(!machine.has_open_channel());
    assert!(machine.session().streamed_answer().is_empty());

    assert!(machine.step().await);
    assert_eq!(machine.session().id.as_deref(), Some("s2"));
    assert_eq!(transport.opened() - transport.closed(), 1);

    feed(&mut machine, &transport, 0, ChannelEvent::Complete).await;
    assert_eq!(machine.status(), SessionStatus::Streaming);

    feed(&mut machine, &transport, 1, ChannelEvent::Chunk("two".into())).await;
    assert_eq!(machine.session().streamed_answer(), "two");
    assert_eq!(machine.session().question, "second");
}

#[tokio::test(start_paused = true)]
async fn test_silence_interrupts_then_retry_reuses_session() {
    let transport = ScriptedTransport::new();
    let config = SessionConfig {
        max_silence_seconds: 5,
        ..SessionConfig::default()
    };
    let mut machine = SessionMachine::new(transport.clone(), config);

    streaming(&mut machine, "What is X?").await;
    feed(&mut machine, &transport, 0, ChannelEvent::Chunk("Hel".into())).await;

    // Nothing arrives; the deadline fires.
    assert!(machine.step().await);
    let session = machine.session();
    assert_eq!(session.status, SessionStatus::Interrupted);
    assert!(session.error.as_deref().unwrap().contains("no channel activity"));
    assert_eq!(transport.closed(), 1);

    machine.retry().unwrap();
    let session = machine.session();
    assert_eq!(session.status, SessionStatus::Streaming);
    assert_eq!(session.id.as_deref(), Some("s1"));
    assert!(session.error.is_none());
    assert!(session.streamed_answer().is_empty());
    assert_eq!(transport.opened(), 2);

    feed(&mut machine, &transport, 1, ChannelEvent::Chunk("Hello".into())).await;
    feed(&mut machine, &transport, 1, ChannelEvent::Complete).await;
    assert_eq!(machine.status(), SessionStatus::Completed);
    assert_eq!(machine.session().streamed_answer(), "Hello");
}

#[tokio::test]
async fn test_unbounded_silence_never_times_out() {
    let transport = ScriptedTransport::new();
    let config = SessionConfig {
        max_silence_seconds: u64::MAX,
        ..SessionConfig::default()
    };
    let mut machine = SessionMachine::new(transport.clone(), config);

    streaming(&mut machine, "What is X?").await;
    feed(&mut machine, &transport, 0, ChannelEvent::Chunk("Hel".into())).await;

    let idle = tokio::time::timeout(Duration::from_millis(50), machine.step()).await;
    assert!(idle.is_err());
    assert_eq!(machine.status(), SessionStatus::Streaming);

    feed(&mut machine, &transport, 0, ChannelEvent::Complete).await;
    assert_eq!(machine.status(), SessionStatus::Completed);
    assert_eq!(machine.session().streamed_answer(), "Hel");
}

#[tokio::test]
async fn test_retry_after_completion_is_unsupported() {
    let transport = ScriptedTransport::new();
    let mut machine = machine(&transport);
    streaming(&mut machine, "What is X?").await;
    feed(&mut machine, &transport, 0, ChannelEvent::Chunk("done".into())).await;
    feed(&mut machine, &transport, 0, ChannelEvent::Complete).await;

    let err = machine.retry().unwrap_err();
    assert!(matches!(err, QaError::Unsupported(_)));
    assert_eq!(machine.status(), SessionStatus::Completed);
    assert_eq!(machine.session().streamed_answer(), "done");
    assert_eq!(transport.opened(), 1);
}

#[tokio::test]
async fn test_initiate_failure_fails_session() {
    let transport = ScriptedTransport::new();
    transport.push_response(Err(QaError::Transport {
        message: "initiate: HTTP 500 Internal Server Error".into(),
        status: Some(500),
    }));
    let mut machine = machine(&transport);

    machine.submit("What is X?").unwrap();
    assert!(machine.step().await);

    let session = machine.session();
    assert_eq!(session.status, SessionStatus::Failed);
    assert!(session.error.as_deref().unwrap().contains("500"));
    assert!(session.id.is_none());
    assert_eq!(transport.opened(), 0);
    assert!(matches!(machine.retry().unwrap_err(), QaError::Unsupported(_)));
}

#[tokio::test]
async fn test_upstream_error_event_fails_then_retry_recovers() {
    let transport = ScriptedTransport::new();
    let mut machine = machine(&transport);
    streaming(&mut machine, "What is X?").await;

    feed(&mut machine, &transport, 0, ChannelEvent::Error("model overloaded".into())).await;
    assert_eq!(machine.status(), SessionStatus::Failed);
    assert_eq!(machine.session().error.as_deref(), Some("model overloaded"));

    machine.retry().unwrap();
    assert_eq!(machine.status(), SessionStatus::Streaming);
    feed(&mut machine, &transport, 1, ChannelEvent::Complete).await;
    assert_eq!(machine.status(), SessionStatus::Completed);
}

#[tokio::test]
async fn test_continue_mode_keeps_buffer_across_retry() {
    let transport = ScriptedTransport::new();
    let config = SessionConfig {
        retry_mode: RetryMode::Continue,
        ..SessionConfig::default()
    };
    let mut machine = SessionMachine::new(transport.clone(), config);
    streaming(&mut machine, "What is X?").await;
    feed(&mut machine, &transport, 0, ChannelEvent::Chunk("Hel".into())).await;
    feed(&mut machine, &transport, 0, ChannelEvent::Dropped("connection reset".into())).await;

    assert_eq!(machine.status(), SessionStatus::Interrupted);
    assert!(machine.session().error.as_deref().unwrap().contains("connection reset"));

    machine.retry().unwrap();
    assert_eq!(machine.session().streamed_answer(), "Hel");
    feed(&mut machine, &transport, 1, ChannelEvent::Chunk("lo".into())).await;
    assert_eq!(machine.session().streamed_answer(), "Hello");
    assert_eq!(machine.session().fragment_count(), 2);
}

#[tokio::test]
async fn test_retry_refused_when_upstream_cannot_resume() {
    let transport = ScriptedTransport::new();
    transport.disable_resume();
    let mut machine = machine(&transport);
    streaming(&mut machine, "What is X?").await;
    feed(&mut machine, &transport, 0, ChannelEvent::Dropped("eof".into())).await;

    assert!(matches!(machine.retry().unwrap_err(), QaError::Unsupported(_)));
    assert_eq!(machine.status(), SessionStatus::Interrupted);
    assert_eq!(transport.opened(), 1);
}

#[tokio::test]
async fn test_clear_returns_to_idle_and_closes_channel() {
    let transport = ScriptedTransport::new();
    let mut machine = machine(&transport);
    streaming(&mut machine, "What is X?").await;

    machine.clear();
    assert_eq!(machine.status(), SessionStatus::Idle);
    assert!(machine.session().id.is_none());
    assert_eq!(transport.closed(), 1);
}

#[tokio::test]
async fn test_feedback_tracks_current_session() {
    let transport = ScriptedTransport::new();
    transport.push_response(Ok(initiate_response("s1", Some("fast"))));
    transport.push_response(Ok(initiate_response("s2", Some("fast"))));
    let mut machine = machine(&transport);
    let recorder = Arc::new(FeedbackRecorder::new(transport.clone()));
    let tracker = recorder.clone();
    machine.subscribe(move |session| tracker.track(session));

    streaming(&mut machine, "first").await;
    let early = FeedbackSubmission::for_session(machine.session(), Verdict::Fast, "").unwrap();
    assert!(matches!(
        recorder.submit(early).await.unwrap_err(),
        QaError::InvalidState { .. }
    ));

    feed(&mut machine, &transport, 0, ChannelEvent::Complete).await;
    let submission =
        FeedbackSubmission::for_session(machine.session(), Verdict::Streamed, "better").unwrap();
    recorder.submit(submission.clone()).await.unwrap();
    recorder.submit(submission.clone()).await.unwrap();
    assert_eq!(transport.feedback().len(), 1);
    assert_eq!(transport.feedback()[0].fast_answer_id.as_deref(), Some("fa-s1"));

    streaming(&mut machine, "second").await;
    let err = recorder.submit(submission).await.unwrap_err();
    assert!(matches!(err, QaError::StaleSession { .. }));
}

#[tokio::test]
async fn test_handle_fans_out_every_snapshot() {
    let transport = ScriptedTransport::new();
    let handle = SessionHandle::spawn(machine(&transport));
    let mut updates = handle.subscribe();

    let session = handle.submit("What is X?").await.unwrap();
    assert_eq!(session.status, SessionStatus::AwaitingFastAnswer);

    let first = next_update(&mut updates).await;
    assert_eq!(first.status, SessionStatus::AwaitingFastAnswer);
    let second = next_update(&mut updates).await;
    assert_eq!(second.status, SessionStatus::Streaming);

    transport.emit(0, ChannelEvent::Chunk("Hi".into()));
    transport.emit(0, ChannelEvent::Complete);
    let third = next_update(&mut updates).await;
    assert_eq!(third.streamed_answer(), "Hi");
    let fourth = next_update(&mut updates).await;
    assert_eq!(fourth.status, SessionStatus::Completed);

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Completed);
    assert!(matches!(
        handle.retry().await.unwrap_err(),
        QaError::Unsupported(_)
    ));
}
