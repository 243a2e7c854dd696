//! Cross-component scenarios spanning `push_read`, `ReplicaGroupGate`,
//! and `MetricsIngress` together — the things a single module's
//! `#[cfg(test)]` block can't exercise because they require more than
//! one component wired up, mirroring the cross-layer style of
//! `tower-shot`'s own integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use replica_gate::EndpointRegistry;
use replica_gate::GateConfig;
use replica_gate::InMemoryMessenger;
use replica_gate::MetricsIngress;
use replica_gate::ReadRequest;
use replica_gate::ReplicaGroupGate;
use replica_gate::SentKind;
use replica_gate::StaticSnitch;
use replica_gate::compare_endpoints;
use replica_gate::push_read;
use replica_limit::RateLimitConfig;

fn request(key: &'static str, original_size: usize) -> ReadRequest<&'static str, &'static str, ()> {
    ReadRequest {
        key,
        command: "GET",
        original_size,
        handler: (),
    }
}

fn metadata(queue_size: u32, service_time_ns: i64) -> HashMap<String, Vec<u8>> {
    let mut map = HashMap::new();
    map.insert("QSZ".to_string(), queue_size.to_be_bytes().to_vec());
    map.insert("MU".to_string(), service_time_ns.to_be_bytes().to_vec());
    map
}

/// Specification end-to-end scenario 4: two endpoints with identical
/// service time but different queue depth rank by the cubic queue
/// penalty, not the linear wait term.
#[test]
fn score_ordering_matches_the_worked_example() {
    let registry: EndpointRegistry<&'static str> = EndpointRegistry::new(RateLimitConfig::default());
    let config = GateConfig::default();

    registry.get_or_create(&"replica-a").score_tracker().update(0, 1.0, 6.0);
    registry.get_or_create(&"replica-b").score_tracker().update(10, 1.0, 6.0);

    assert_eq!(
        compare_endpoints(&"replica-a", &"replica-b", &registry, &config),
        std::cmp::Ordering::Less
    );
}

/// A full admit-then-reply round trip: `push_read` dispatches a data
/// request and two digests, the data endpoint's reply is ingested, and
/// its pending count returns to zero while its score becomes nonzero.
#[tokio::test]
async fn admission_then_reply_round_trip_updates_pending_and_score() {
    let registry: EndpointRegistry<&'static str> = EndpointRegistry::new(RateLimitConfig::default());
    let snitch = StaticSnitch::new(vec!["a", "b", "c"]);
    let messenger: InMemoryMessenger<&'static str> = InMemoryMessenger::new();
    let config = GateConfig::default();
    let ingress = MetricsIngress::new();

    push_read(request("k", 3), &snitch, &registry, &messenger, &"coordinator", &config).await;

    let record = registry.get_or_create(&"a");
    assert_eq!(record.pending_count(), 1);

    let md = metadata(2, 1_500_000);
    ingress.ingest_reply(&registry, &"a", &md, 4_000_000);

    assert_eq!(record.pending_count(), 0);
    assert!(record.score_tracker().score(registry.len() as u32, record.pending_count()) > 0.0);
}

/// Specification end-to-end scenario 6 (FIFO under deferral), driven
/// through the real [`ReplicaGroupGate`] rather than calling
/// `push_read` directly: three reads submitted while the group's only
/// replica has no budget all dispatch in submission order once the
/// timer unblocks the gate.
#[tokio::test(start_paused = true)]
async fn gate_preserves_fifo_order_across_a_deferral() {
    let rate_limit = RateLimitConfig {
        rate_limiter_max_tokens: 3.0,
        ..RateLimitConfig::default()
    };
    let registry = Arc::new(EndpointRegistry::<&'static str>::new(rate_limit));
    let record = registry.get_or_create(&"only-replica");
    for _ in 0..3 {
        assert_eq!(record.rate_controller().try_acquire(), 0.0);
    }

    let snitch = Arc::new(StaticSnitch::new(vec!["only-replica"]));
    let messenger = Arc::new(InMemoryMessenger::<&'static str>::new());
    let gate = ReplicaGroupGate::spawn(snitch, registry, messenger.clone(), "coordinator", GateConfig::default());

    gate.submit(request("r1", 1));
    tokio::task::yield_now().await;
    gate.submit(request("r2", 1));
    gate.submit(request("r3", 1));
    tokio::task::yield_now().await;
    assert!(messenger.sent().is_empty());

    tokio::time::advance(Duration::from_secs(1)).await;
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    let sent = messenger.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|(endpoint, kind)| *endpoint == "only-replica" && *kind == SentKind::Data));
}

/// A reply whose metadata is missing `QSZ`/`MU` must still release the
/// pending slot (`MissingMetric`'s "drop but still decrement" rule) even
/// though no score update happens.
#[tokio::test]
async fn malformed_reply_still_releases_pending_count() {
    let registry: EndpointRegistry<&'static str> = EndpointRegistry::new(RateLimitConfig::default());
    let snitch = StaticSnitch::new(vec!["a"]);
    let messenger: InMemoryMessenger<&'static str> = InMemoryMessenger::new();
    let config = GateConfig::default();

    push_read(request("k", 1), &snitch, &registry, &messenger, &"coordinator", &config).await;
    let record = registry.get_or_create(&"a");
    assert_eq!(record.pending_count(), 1);

    let ingress = MetricsIngress::new();
    let empty = HashMap::new();
    ingress.ingest_reply(&registry, &"a", &empty, 1_000_000);

    assert_eq!(record.pending_count(), 0);
    assert_eq!(record.score_tracker().score(1, 0), 0.0);
}

/// `strategy = "default"` bypasses both admission control and scoring:
/// every probe succeeds immediately and every comparison is `Equal`.
#[tokio::test]
async fn default_strategy_bypasses_the_adaptive_core() {
    use replica_gate::Strategy;

    let registry: EndpointRegistry<&'static str> = EndpointRegistry::new(RateLimitConfig::default());
    let record = registry.get_or_create(&"a");
    record.rate_controller().send_limiter().set_rate(0.0001);
    let _ = record.rate_controller().try_acquire();

    let snitch = StaticSnitch::new(vec!["a"]);
    let messenger: InMemoryMessenger<&'static str> = InMemoryMessenger::new();
    let config = GateConfig {
        strategy: Strategy::Default,
        ..GateConfig::default()
    };

    let outcome = push_read(request("k", 1), &snitch, &registry, &messenger, &"coordinator", &config).await;
    assert!(matches!(outcome, replica_gate::PushOutcome::Admitted));
    assert_eq!(
        compare_endpoints(&"a", &"b", &registry, &config),
        std::cmp::Ordering::Equal
    );
}
