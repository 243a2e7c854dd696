//! Worked example: three replicas, one coordinator, a handful of reads.
//!
//! Wires a [`StaticSnitch`] and an [`InMemoryMessenger`] through
//! [`push_read`] directly (bypassing [`ReplicaGroupGate`], whose
//! deferral/replay behavior is exercised in its own tests) to show the
//! score-driven ordering shift after a slow reply comes back through
//! [`MetricsIngress`].

use replica_gate::EndpointRegistry;
use replica_gate::GateConfig;
use replica_gate::InMemoryMessenger;
use replica_gate::MetricsIngress;
use replica_gate::ReadRequest;
use replica_gate::StaticSnitch;
use replica_gate::compare_endpoints;
use replica_gate::push_read;
use replica_limit::RateLimitConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let registry: EndpointRegistry<&'static str> = EndpointRegistry::new(RateLimitConfig::default());
    let snitch = StaticSnitch::new(vec!["replica-1", "replica-2", "replica-3"]);
    let messenger: InMemoryMessenger<&'static str> = InMemoryMessenger::new();
    let config = GateConfig::default();
    let ingress = MetricsIngress::new();

    let request = ReadRequest {
        key: "user:42",
        command: "SELECT * FROM users WHERE id = 42",
        original_size: 3,
        handler: (),
    };

    let outcome = push_read(request, &snitch, &registry, &messenger, &"coordinator", &config).await;
    println!("admission outcome: {outcome:?}");
    println!("dispatched: {:?}", messenger.sent());

    // `replica-1` answers slowly with a deep server-side queue; feed
    // that back through metrics ingress.
    let mut metadata = std::collections::HashMap::new();
    metadata.insert("QSZ".to_string(), 12u32.to_be_bytes().to_vec());
    metadata.insert("MU".to_string(), 8_000_000i64.to_be_bytes().to_vec());
    ingress.ingest_reply(&registry, &"replica-1", &metadata, 20_000_000);

    // `replica-2` answers quickly with an empty queue.
    let mut fast_metadata = std::collections::HashMap::new();
    fast_metadata.insert("QSZ".to_string(), 0u32.to_be_bytes().to_vec());
    fast_metadata.insert("MU".to_string(), 1_000_000i64.to_be_bytes().to_vec());
    ingress.ingest_reply(&registry, &"replica-2", &fast_metadata, 2_000_000);

    let ordering = compare_endpoints(&"replica-1", &"replica-2", &registry, &config);
    println!("replica-1 vs replica-2 after replies: {ordering:?} (Less means replica-1 now ranks better)");
}
