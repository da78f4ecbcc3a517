use std::{collections::BTreeSet, sync::Arc};

use assert_matches::assert_matches;
use axum::http::HeaderMap;
use pretty_assertions::assert_eq;

use crate::{
    config::Config,
    error::ErrorCode,
    k8s::{Applier, ClusterError, DecodeFailurePolicy, FakeCluster},
    providers::{FakeFailure, FakeProvider, PushEvent, WebhookRequest},
    service::ServiceHandler,
};

use super::{filter_manifest_files, is_manifest, process_delivery, ManifestSelection, WebhookOutcome};

const CONFIG_MAP: &str = "apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
data:
  mode: blue
";

const TWO_DOCUMENTS: &str = "apiVersion: v1
kind: ConfigMap
metadata:
  name: first
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: second
";

fn push_event(files: &[&str]) -> PushEvent {
    PushEvent {
        owner: "acme".into(),
        repo: "platform-config".into(),
        reference: "refs/heads/main".into(),
        after: "0d1a26e".into(),
        modified_files: files.iter().map(|f| f.to_string()).collect(),
    }
}

fn config() -> Config {
    let mut config = Config::empty();
    config.set_namespace("ops");
    config
}

fn services(provider: FakeProvider, cluster: &Arc<FakeCluster>) -> ServiceHandler {
    ServiceHandler::new(
        Arc::new(provider),
        Applier::new(cluster.clone(), DecodeFailurePolicy::Skip),
    )
}

fn fake_provider(services: &ServiceHandler) -> &FakeProvider {
    services
        .provider()
        .as_any()
        .downcast_ref::<FakeProvider>()
        .unwrap()
}

fn request() -> WebhookRequest {
    WebhookRequest::new(HeaderMap::new(), "{}".into())
}

#[test]
fn test_manifest_extensions() {
    assert!(is_manifest("apps/web.yaml"));
    assert!(is_manifest("apps/web.YML"));
    assert!(is_manifest("service.YAML"));
    assert!(!is_manifest("README.md"));
    assert!(!is_manifest("yaml"));
    assert!(!is_manifest("apps/web.yaml.bak"));
}

#[test]
fn test_filter_keeps_manifests_only() {
    let files: BTreeSet<String> = ["b.yml", "a.yaml", "notes.txt"]
        .iter()
        .map(|f| f.to_string())
        .collect();

    assert_eq!(
        filter_manifest_files(&files),
        ManifestSelection::Files(BTreeSet::from(["a.yaml".to_string(), "b.yml".to_string()]))
    );
}

#[test]
fn test_filter_resync_marker_wins() {
    let files: BTreeSet<String> = [".", "a.yaml"].iter().map(|f| f.to_string()).collect();
    assert_eq!(filter_manifest_files(&files), ManifestSelection::Resync);
}

#[tokio::test]
async fn test_invalid_delivery_stops_before_parsing() {
    let provider = FakeProvider::new(push_event(&["a.yaml"]));
    provider.validate.return_value(Err(FakeFailure::InvalidSignature));
    let cluster = Arc::new(FakeCluster::new());
    let services = services(provider, &cluster);

    let mut config = config();
    config.set_webhook_secret("secret");

    let err = process_delivery(&config, &services, &request())
        .await
        .unwrap_err();
    assert_matches!(err, ErrorCode::InvalidDelivery(_));

    let provider = fake_provider(&services);
    assert_eq!(provider.validate.calls(), vec![Some("secret".to_string())]);
    assert!(!provider.parse_push_event.called());
    assert!(!cluster.get.called());
}

#[tokio::test]
async fn test_non_push_event_is_ignored() {
    let provider = FakeProvider::new(push_event(&[]));
    provider
        .parse_push_event
        .return_value(Err(FakeFailure::NotAPushEvent("ping".into())));
    let cluster = Arc::new(FakeCluster::new());
    let services = services(provider, &cluster);

    let outcome = process_delivery(&config(), &services, &request())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::Ignored {
            reason: "ping".into()
        }
    );
    assert!(!fake_provider(&services).download_file.called());
}

#[tokio::test]
async fn test_missing_event_header_is_a_bad_request() {
    let provider = FakeProvider::new(push_event(&[]));
    provider
        .parse_push_event
        .return_value(Err(FakeFailure::MissingEventHeader));
    let cluster = Arc::new(FakeCluster::new());
    let services = services(provider, &cluster);

    let err = process_delivery(&config(), &services, &request())
        .await
        .unwrap_err();
    assert_matches!(err, ErrorCode::MissingEventHeader(_));
}

#[tokio::test]
async fn test_push_without_manifests() {
    let provider = FakeProvider::new(push_event(&["README.md", "docs/index.md"]));
    let cluster = Arc::new(FakeCluster::new());
    let services = services(provider, &cluster);

    let outcome = process_delivery(&config(), &services, &request())
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::NoChanges);
    assert!(!fake_provider(&services).download_file.called());
}

#[tokio::test]
async fn test_manifests_applied_in_sorted_order_at_after() {
    let provider = FakeProvider::new(push_event(&["z/last.yml", "README.md", "a/first.yaml"]))
        .with_file("a/first.yaml", TWO_DOCUMENTS)
        .with_file("z/last.yml", CONFIG_MAP);
    let cluster = Arc::new(FakeCluster::new());
    let services = services(provider, &cluster);

    let outcome = process_delivery(&config(), &services, &request())
        .await
        .unwrap();

    let provider = fake_provider(&services);
    assert_eq!(
        provider.download_file.calls(),
        vec![
            ("0d1a26e".to_string(), "a/first.yaml".to_string()),
            ("0d1a26e".to_string(), "z/last.yml".to_string()),
        ]
    );

    let applied_names: Vec<_> = cluster.get.calls().into_iter().map(|(_, _, n)| n).collect();
    assert_eq!(applied_names, vec!["first", "second", "settings"]);

    assert_matches!(
        outcome,
        WebhookOutcome::Applied { files, created, updated, .. } => {
            assert_eq!(files, vec!["a/first.yaml", "z/last.yml"]);
            assert_eq!((created, updated), (3, 0));
        }
    );

    let namespaces: BTreeSet<_> = cluster
        .create
        .calls()
        .into_iter()
        .map(|(_, ns, _)| ns)
        .collect();
    assert_eq!(namespaces, BTreeSet::from([Some("ops".to_string())]));
}

#[tokio::test]
async fn test_resync_lists_files_and_applies_manifests() {
    let provider = FakeProvider::new(PushEvent::resync(
        "acme",
        "platform-config",
        "refs/heads/main",
        "9fceb02",
    ))
    .with_file("deploy/app.yaml", CONFIG_MAP);
    provider.list_files.return_value(Ok(vec![
        "README.md".into(),
        "deploy/app.yaml".into(),
        "scripts/run.sh".into(),
    ]));
    let cluster = Arc::new(FakeCluster::new());
    let services = services(provider, &cluster);

    let outcome = process_delivery(&config(), &services, &request())
        .await
        .unwrap();

    let provider = fake_provider(&services);
    assert_eq!(provider.list_files.calls(), vec!["9fceb02".to_string()]);
    assert_eq!(provider.downloaded_paths(), vec!["deploy/app.yaml"]);
    assert_matches!(outcome, WebhookOutcome::Applied { files, .. } if files == vec!["deploy/app.yaml"]);
}

#[tokio::test]
async fn test_download_failure_stops_processing() {
    let provider = FakeProvider::new(push_event(&["a.yaml", "b.yaml"]))
        .with_failing_file("a.yaml", FakeFailure::FileNotFound)
        .with_file("b.yaml", CONFIG_MAP);
    let cluster = Arc::new(FakeCluster::new());
    let services = services(provider, &cluster);

    let err = process_delivery(&config(), &services, &request())
        .await
        .unwrap_err();

    assert_matches!(err, ErrorCode::DownloadFailure { path, .. } if path == "a.yaml");
    assert_eq!(fake_provider(&services).downloaded_paths(), vec!["a.yaml"]);
    assert!(!cluster.get.called());
}

#[tokio::test]
async fn test_apply_failure_names_the_file() {
    let provider = FakeProvider::new(push_event(&["a.yaml", "b.yaml"]))
        .with_file("a.yaml", CONFIG_MAP)
        .with_file("b.yaml", CONFIG_MAP);
    let cluster = Arc::new(FakeCluster::new());
    cluster
        .create
        .return_value(Err(ClusterError::Transport("connection reset".into())));
    let services = services(provider, &cluster);

    let err = process_delivery(&config(), &services, &request())
        .await
        .unwrap_err();

    assert_matches!(err, ErrorCode::ApplyFailure { ref path, .. } if path == "a.yaml");
    assert_eq!(err.details().status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(fake_provider(&services).downloaded_paths(), vec!["a.yaml"]);
}

#[tokio::test]
async fn test_list_failure_is_a_processing_error() {
    let provider = FakeProvider::new(PushEvent::resync("acme", "repo", "refs/heads/main", "HEAD"));
    provider.list_files.return_value(Err(FakeFailure::Unreachable));
    let cluster = Arc::new(FakeCluster::new());
    let services = services(provider, &cluster);

    let err = process_delivery(&config(), &services, &request())
        .await
        .unwrap_err();
    assert_matches!(err, ErrorCode::ListFilesFailure(_));
}
