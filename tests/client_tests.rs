//! Completion client against a fake inference server

mod common;

use std::time::Duration;

use common::FakeServer;
use lorewright::{CompletionClient, GenerationParams, LorewrightError};

fn client_for(server: &FakeServer, timeout: Duration) -> CompletionClient {
    CompletionClient::new(server.base_url(), timeout).unwrap()
}

#[test]
fn test_completion_is_trimmed() {
    let server = FakeServer::start("\n\n  The lighthouse keeper counted ships.  \n");
    let client = client_for(&server, Duration::from_secs(5));

    let text = client.complete("Write a scene", &GenerationParams::default());
    assert_eq!(text.as_deref(), Some("The lighthouse keeper counted ships."));
    assert_eq!(server.state.completions(), 1);
}

#[test]
fn test_parameters_are_sent_flat() {
    let server = FakeServer::start("ok");
    let client = client_for(&server, Duration::from_secs(5));
    let params = GenerationParams {
        temperature: 0.5,
        top_p: 0.75,
        top_k: 20,
        repeat_penalty: 1.25,
        max_tokens: 300,
    };

    client.try_complete("Describe the tower", &params).unwrap();

    let body = server.state.last_request().unwrap();
    assert_eq!(body["prompt"], "Describe the tower");
    assert_eq!(body["temperature"], 0.5);
    assert_eq!(body["top_p"], 0.75);
    assert_eq!(body["top_k"], 20);
    assert_eq!(body["repeat_penalty"], 1.25);
    assert_eq!(body["max_tokens"], 300);
}

#[test]
fn test_timeout_yields_none() {
    let server = FakeServer::start("too late");
    server.state.set_delay(Duration::from_millis(1_500));
    let client = client_for(&server, Duration::from_millis(300));

    assert!(client.complete("slow", &GenerationParams::default()).is_none());
}

#[test]
fn test_error_status_is_transport_failure() {
    let server = FakeServer::start("ignored");
    server.state.set_status(500);
    let client = client_for(&server, Duration::from_secs(5));

    let err = client
        .try_complete("x", &GenerationParams::default())
        .unwrap_err();
    assert!(matches!(err, LorewrightError::Transport(ref msg) if msg.contains("500")));
    assert!(client.complete("x", &GenerationParams::default()).is_none());
}

#[test]
fn test_malformed_bodies() {
    let server = FakeServer::start("ignored");
    let client = client_for(&server, Duration::from_secs(5));

    server.state.set_raw_body("<html>not json</html>");
    assert!(matches!(
        client.try_complete("x", &GenerationParams::default()),
        Err(LorewrightError::MalformedResponse(_))
    ));

    server.state.set_raw_body(r#"{"tokens_predicted": 12}"#);
    assert!(matches!(
        client.try_complete("x", &GenerationParams::default()),
        Err(LorewrightError::MalformedResponse(_))
    ));
    assert!(client.complete("x", &GenerationParams::default()).is_none());
}

#[test]
fn test_blank_content_is_malformed() {
    let server = FakeServer::start("  \n\t ");
    let client = client_for(&server, Duration::from_secs(5));

    assert!(matches!(
        client.try_complete("x", &GenerationParams::default()),
        Err(LorewrightError::MalformedResponse(_))
    ));
    assert!(client.complete("x", &GenerationParams::default()).is_none());
}
