use std::collections::BTreeSet;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use crate::{
    crypto::sign,
    providers::{Provider, ProviderError, WebhookRequest},
};

use super::GitHubProvider;

const PUSH_SAMPLE: &str = include_str!("./push_sample.json");
const PING_SAMPLE: &str = include_str!("./ping_sample.json");

fn provider() -> GitHubProvider {
    GitHubProvider::new(None, None).unwrap()
}

fn signed_request(event: &str, body: &str, secret: &str) -> WebhookRequest {
    let signature = format!("sha256={}", sign(body.as_bytes(), secret));
    WebhookRequest::with_headers(
        &[
            ("X-GitHub-Event", event),
            ("X-Hub-Signature-256", &signature),
            ("Content-Type", "application/json"),
        ],
        body.to_string(),
    )
}

#[test]
fn test_validate_correct_signature() {
    let request = signed_request("push", PUSH_SAMPLE, "secret");
    let payload = provider().validate(&request, Some("secret")).unwrap();
    assert_eq!(&payload[..], PUSH_SAMPLE.as_bytes());
}

#[test]
fn test_validate_flipped_body_byte() {
    let request = signed_request("push", PUSH_SAMPLE, "secret");

    let mut body = PUSH_SAMPLE.as_bytes().to_vec();
    body[10] ^= 0x20;
    let tampered = WebhookRequest::with_headers(
        &[(
            "X-Hub-Signature-256",
            request.header("X-Hub-Signature-256").unwrap(),
        )],
        body,
    );

    assert_matches!(
        provider().validate(&tampered, Some("secret")),
        Err(ProviderError::InvalidSignature(_))
    );
}

#[test]
fn test_validate_missing_signature() {
    let request = WebhookRequest::with_headers(&[("X-GitHub-Event", "push")], PUSH_SAMPLE);
    assert_matches!(
        provider().validate(&request, Some("secret")),
        Err(ProviderError::MissingSignature(_))
    );
}

#[test]
fn test_validate_signature_without_prefix() {
    let signature = sign(PUSH_SAMPLE.as_bytes(), "secret");
    let request = WebhookRequest::with_headers(&[("X-Hub-Signature-256", &signature)], PUSH_SAMPLE);
    assert_matches!(
        provider().validate(&request, Some("secret")),
        Err(ProviderError::InvalidSignature(_))
    );
}

#[test]
fn test_validate_form_payload() {
    let body: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("payload", PUSH_SAMPLE)
        .finish();
    let signature = format!("sha256={}", sign(body.as_bytes(), "secret"));
    let request = WebhookRequest::with_headers(
        &[
            ("X-Hub-Signature-256", &signature),
            ("Content-Type", "application/x-www-form-urlencoded"),
        ],
        body,
    );

    let payload = provider().validate(&request, Some("secret")).unwrap();
    assert_eq!(&payload[..], PUSH_SAMPLE.as_bytes());
}

#[test]
fn test_parse_push_event() {
    let request = signed_request("push", PUSH_SAMPLE, "secret");
    let event = provider()
        .parse_push_event(&request, PUSH_SAMPLE.as_bytes())
        .unwrap();

    assert_eq!(event.owner, "acme");
    assert_eq!(event.repo, "platform-config");
    assert_eq!(event.reference, "refs/heads/main");
    assert_eq!(event.after, "0d1a26e67d8f5eaf1f6ba5c57fc3c7d91ac0fd1c");
    assert_eq!(
        event.modified_files,
        BTreeSet::from(
            [
                "apps/redis/README.md",
                "apps/redis/deployment.yaml",
                "apps/redis/service.YAML",
                "kustomization.yml",
            ]
            .map(String::from)
        )
    );
    assert!(!event
        .modified_files
        .contains("apps/memcached/deployment.yaml"));
}

#[test]
fn test_parse_ping_event() {
    let request = signed_request("ping", PING_SAMPLE, "secret");
    assert_matches!(
        provider().parse_push_event(&request, PING_SAMPLE.as_bytes()),
        Err(ProviderError::NotAPushEvent(e)) if e == "ping"
    );
}

#[test]
fn test_parse_other_event() {
    let request = signed_request("issues", "{}", "secret");
    assert_matches!(
        provider().parse_push_event(&request, b"{}"),
        Err(ProviderError::NotAPushEvent(e)) if e == "issues"
    );
}

#[test]
fn test_parse_missing_event_header() {
    let request = WebhookRequest::with_headers(&[], PUSH_SAMPLE);
    assert_matches!(
        provider().parse_push_event(&request, PUSH_SAMPLE.as_bytes()),
        Err(ProviderError::MissingEventHeader(_))
    );
}

#[test]
fn test_parse_malformed_body() {
    let request = signed_request("push", "", "secret");
    assert_matches!(
        provider().parse_push_event(&request, b""),
        Err(ProviderError::MalformedPayload(_))
    );
}

#[test]
fn test_parse_branch_deletion() {
    let body = serde_json::json!({
        "ref": "refs/heads/feature",
        "after": "0000000000000000000000000000000000000000",
        "deleted": true,
        "commits": [],
        "repository": { "full_name": "acme/platform-config" }
    })
    .to_string();
    let request = signed_request("push", &body, "secret");

    assert_matches!(
        provider().parse_push_event(&request, body.as_bytes()),
        Err(ProviderError::NotAPushEvent(_))
    );
}
