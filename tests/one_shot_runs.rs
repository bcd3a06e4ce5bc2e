//! Integration tests for one-shot runs.
//!
//! These drive the full downstream pipeline (fabric, coordinator with a
//! real file materializer, expiry and counter observers) from a scripted
//! event stream and assert on the terminal state, the written files and
//! the aggregated metrics.

use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;

use keysync::coordinator::{RunCoordinator, RunMode, RunState, DEFAULT_MAX_INFLIGHT};
use keysync::events::{Fabric, LifecycleEvent, Payload};
use keysync::observers::{CounterObserver, ExpiryObserver};
use keysync::output::{FileMaterializer, OutputPipeline};
use keysync::resources::{Resource, ResourceKind};
use keysync::telemetry::Aggregator;

fn resource(kind: ResourceKind, path: &str, max_retries: u32) -> Resource {
    let mut r = Resource::new(kind, path);
    r.max_retries = max_retries;
    r
}

fn payload(entries: &[(&str, serde_json::Value)]) -> Payload {
    let mut p = Payload::new();
    for (k, v) in entries {
        p.insert((*k).to_string(), v.clone());
    }
    p
}

struct Harness {
    aggregator: Arc<Aggregator>,
    fabric: Arc<Fabric>,
    run: tokio::task::JoinHandle<RunState>,
    observers: Vec<tokio::task::JoinHandle<()>>,
    output_dir: tempfile::TempDir,
}

/// Wire a one-shot pipeline the way the runtime does, with every
/// subscription registered before any event is published.
fn start(resources: &[Resource]) -> Harness {
    let aggregator = Arc::new(Aggregator::new("test").unwrap());
    let fabric = Arc::new(Fabric::new(10));

    let coordinator_sub = fabric.register();
    let expiry_sub = fabric.register();
    let counter_sub = fabric.register();

    let output_dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(
        OutputPipeline::new(Arc::clone(&aggregator))
            .with_step(Arc::new(FileMaterializer::new(output_dir.path()).unwrap())),
    );
    let coordinator = Arc::new(RunCoordinator::new(
        RunMode::OneShot,
        resources,
        pipeline,
        DEFAULT_MAX_INFLIGHT,
    ));

    let run = tokio::spawn(Arc::clone(&coordinator).run(coordinator_sub));
    let observers = vec![
        tokio::spawn(ExpiryObserver::new(Arc::clone(&aggregator), resources).run(expiry_sub)),
        tokio::spawn(CounterObserver::new(Arc::clone(&aggregator)).run(counter_sub)),
    ];

    drop(coordinator);
    Harness {
        aggregator,
        fabric,
        run,
        observers,
        output_dir,
    }
}

impl Harness {
    async fn publish(&self, event: LifecycleEvent) {
        self.fabric.publish(event).await;
    }

    /// Close the stream and wait for the run plus all observers.
    async fn finish(self) -> (RunState, Arc<Aggregator>, tempfile::TempDir) {
        let Harness {
            aggregator,
            fabric,
            run,
            observers,
            output_dir,
        } = self;
        drop(fabric);
        let state = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("run should terminate")
            .unwrap();
        for observer in observers {
            tokio::time::timeout(Duration::from_secs(5), observer)
                .await
                .expect("observer should stop")
                .unwrap();
        }
        (state, aggregator, output_dir)
    }
}

#[tokio::test]
#[serial]
async fn two_successes_drain_the_run_and_write_both_files() {
    let resources = [
        resource(ResourceKind::Secret, "platform/db", 0),
        resource(ResourceKind::Secret, "platform/queue", 0),
    ];
    let harness = start(&resources);

    harness
        .publish(LifecycleEvent::success(
            "secret:platform/db",
            payload(&[("username", serde_json::json!("svc"))]),
        ))
        .await;
    harness
        .publish(LifecycleEvent::success(
            "secret:platform/queue",
            payload(&[("token", serde_json::json!("t0"))]),
        ))
        .await;

    let (state, aggregator, dir) = harness.finish().await;
    assert_eq!(state, RunState::DrainedOk);
    assert_eq!(state.exit_code(), 0);

    assert!(dir.path().join("secret_platform_db.json").exists());
    assert!(dir.path().join("secret_platform_queue.json").exists());

    let snap = aggregator.snapshot();
    assert_eq!(snap.resource_totals["secret:platform/db"], 1);
    assert_eq!(snap.resource_successes["secret:platform/queue"], 1);
    assert_eq!(snap.stages["secret:platform/db"]["write"].success, 1);
}

#[tokio::test]
#[serial]
async fn exhausted_retry_budget_fails_the_run() {
    let resources = [resource(ResourceKind::Secret, "platform/db", 2)];
    let harness = start(&resources);

    for _ in 0..3 {
        harness
            .publish(LifecycleEvent::failure("secret:platform/db", "sealed"))
            .await;
    }

    let (state, aggregator, _dir) = harness.finish().await;
    assert_eq!(state, RunState::DrainedFailed);
    assert_eq!(state.exit_code(), 1);

    let snap = aggregator.snapshot();
    assert_eq!(snap.resource_errors["secret:platform/db"], 3);
    assert!(!snap.resource_successes.contains_key("secret:platform/db"));
}

#[tokio::test]
#[serial]
async fn certificate_success_exports_an_expiry_gauge() {
    let resources = [resource(ResourceKind::Certificate, "pki/issue/web", 0)];
    let harness = start(&resources);

    let expiration = chrono::Utc::now().timestamp() + 86_400;
    harness
        .publish(LifecycleEvent::success(
            "certificate:pki/issue/web",
            payload(&[("expiration", serde_json::json!(expiration))]),
        ))
        .await;

    let (state, aggregator, _dir) = harness.finish().await;
    assert_eq!(state, RunState::DrainedOk);

    let snap = aggregator.snapshot();
    let seconds = snap.resource_expiry["certificate:pki/issue/web"];
    assert!((86_390.0..=86_410.0).contains(&seconds), "got {seconds}");
}

#[tokio::test]
#[serial]
async fn malformed_certificate_payload_is_isolated() {
    let resources = [resource(ResourceKind::Certificate, "pki/issue/web", 0)];
    let harness = start(&resources);

    harness
        .publish(LifecycleEvent::success(
            "certificate:pki/issue/web",
            payload(&[("certificate", serde_json::json!("PEM..."))]),
        ))
        .await;

    let (state, aggregator, _dir) = harness.finish().await;
    // The run still drains: a malformed payload is a metric, not a crash.
    assert_eq!(state, RunState::DrainedOk);

    let snap = aggregator.snapshot();
    assert_eq!(snap.generic_errors["no_expiration_in_resource"], 1);
    assert!(snap.resource_expiry.is_empty());
}

#[tokio::test]
#[serial]
async fn mixed_outcomes_converge_regardless_of_interleaving() {
    let resources = [
        resource(ResourceKind::Secret, "a", 0),
        resource(ResourceKind::Secret, "b", 1),
        resource(ResourceKind::Certificate, "pki/issue/web", 0),
    ];
    let harness = start(&resources);

    harness
        .publish(LifecycleEvent::failure("secret:b", "transient"))
        .await;
    harness
        .publish(LifecycleEvent::success("secret:a", Payload::new()))
        .await;
    harness
        .publish(LifecycleEvent::success(
            "certificate:pki/issue/web",
            payload(&[("expiration", serde_json::json!(0))]),
        ))
        .await;
    harness
        .publish(LifecycleEvent::success("secret:b", Payload::new()))
        .await;

    let (state, _aggregator, _dir) = harness.finish().await;
    assert_eq!(state, RunState::DrainedOk);
}
