use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::trace;

use crate::admission::PushOutcome;
use crate::admission::ReadRequest;
use crate::admission::push_read;
use crate::config::GateConfig;
use crate::endpoint::Endpoint;
use crate::endpoint::EndpointRegistry;
use crate::messaging::Messenger;
use crate::snitch::Snitch;

/// Messages accepted by a [`ReplicaGroupGate`]'s mailbox: a caller's
/// read, or the internal wake-up fired by an expired deferral timer.
enum GateMessage<Req> {
    Read(Req),
    Unblock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Ready,
    Waiting,
}

/// A per-replica-group serialization point.
///
/// Exactly two states, per the specification's §4.5 transition table:
/// `Ready` admits incoming reads immediately (or defers them), and
/// `Waiting` stashes every incoming read in arrival order until a
/// single-shot timer delivers `Unblock`, at which point the whole stash
/// is replayed back through the mailbox rather than invoked directly —
/// preserving the single-consumer property described there. Cloning a
/// handle shares the same mailbox and therefore the same state machine;
/// it does not spawn a second gate.
pub struct ReplicaGroupGate<K, Cmd, H> {
    sender: mpsc::UnboundedSender<GateMessage<ReadRequest<K, Cmd, H>>>,
}

impl<K, Cmd, H> Clone for ReplicaGroupGate<K, Cmd, H> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<K, Cmd, H> ReplicaGroupGate<K, Cmd, H>
where
    K: Send + 'static,
    Cmd: Send + 'static,
    H: Send + 'static,
{
    /// Spawns the gate's background task (a single-consumer loop over
    /// its own mailbox) and returns a handle for submitting reads.
    ///
    /// An unbounded mailbox is used deliberately: the gate must never
    /// drop a stashed read, and a bounded channel would make the
    /// Unblock-time replay (which resends the entire stash to the same
    /// channel it is draining) a potential self-deadlock if the stash
    /// ever outgrew the channel's capacity.
    pub fn spawn<E, S, M>(
        snitch: Arc<S>,
        registry: Arc<EndpointRegistry<E>>,
        messenger: Arc<M>,
        local: E,
        config: GateConfig,
    ) -> Self
    where
        E: Endpoint,
        S: Snitch<K, E> + Send + Sync + 'static,
        M: Messenger<E, Cmd> + Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let loopback = sender.clone();

        tokio::spawn(run(
            receiver, loopback, snitch, registry, messenger, local, config,
        ));

        Self { sender }
    }

    /// Delivers a read request to this group's mailbox. Never blocks:
    /// the mailbox is unbounded, matching [`Self::spawn`]'s rationale.
    pub fn submit(&self, request: ReadRequest<K, Cmd, H>) {
        let _ = self.sender.send(GateMessage::Read(request));
    }
}

async fn run<E, K, Cmd, H, S, M>(
    mut receiver: mpsc::UnboundedReceiver<GateMessage<ReadRequest<K, Cmd, H>>>,
    loopback: mpsc::UnboundedSender<GateMessage<ReadRequest<K, Cmd, H>>>,
    snitch: Arc<S>,
    registry: Arc<EndpointRegistry<E>>,
    messenger: Arc<M>,
    local: E,
    config: GateConfig,
) where
    E: Endpoint,
    K: Send + 'static,
    Cmd: Send + 'static,
    H: Send + 'static,
    S: Snitch<K, E> + Send + Sync + 'static,
    M: Messenger<E, Cmd> + Send + Sync + 'static,
{
    let mut state = GateState::Ready;
    let mut stash: VecDeque<ReadRequest<K, Cmd, H>> = VecDeque::new();
    let mut timer: Option<JoinHandle<()>> = None;

    while let Some(message) = receiver.recv().await {
        match (state, message) {
            (GateState::Ready, GateMessage::Read(request)) => {
                match push_read(request, snitch.as_ref(), registry.as_ref(), messenger.as_ref(), &local, &config).await {
                    PushOutcome::Admitted => {
                        trace!("admitted read without deferral");
                    }
                    PushOutcome::Deferred { wait, request } => {
                        trace!(?wait, "no replica budget available; gate transitions to waiting");
                        stash.push_back(request);
                        state = GateState::Waiting;
                        timer = Some(arm_timer(wait, loopback.clone()));
                    }
                }
            }
            (GateState::Waiting, GateMessage::Read(request)) => {
                stash.push_back(request);
            }
            (GateState::Ready, GateMessage::Unblock) => {
                debug!("spurious unblock while ready; ignoring");
            }
            (GateState::Waiting, GateMessage::Unblock) => {
                if let Some(handle) = timer.take() {
                    handle.abort();
                }
                state = GateState::Ready;
                trace!(stashed = stash.len(), "unblocked; replaying stash in fifo order");
                for request in stash.drain(..) {
                    let _ = loopback.send(GateMessage::Read(request));
                }
            }
        }
    }
}

/// Arms a single-shot wake-up timer that, after `wait` elapses, delivers
/// one `Unblock` message to the gate's own mailbox.
///
/// If the gate has since been dropped (the receiving end closed), the
/// send is a silent no-op — there is nothing left to unblock. A timer
/// that never fires at all (the `TimerLost` error kind) is not
/// representable here: a `tokio` sleep cannot fail to complete short of
/// the whole runtime stopping, so that failure mode is left to the
/// external watchdog the specification assigns it to.
fn arm_timer<Req: Send + 'static>(
    wait: Duration,
    sender: mpsc::UnboundedSender<GateMessage<Req>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(wait).await;
        let _ = sender.send(GateMessage::Unblock);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::InMemoryMessenger;
    use crate::messaging::SentKind;
    use crate::snitch::StaticSnitch;
    use replica_limit::RateLimitConfig;
    use std::time::Duration as StdDuration;

    fn request(key: &'static str, original_size: usize) -> ReadRequest<&'static str, &'static str, ()> {
        ReadRequest {
            key,
            command: "GET",
            original_size,
            handler: (),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn admits_immediately_when_budget_is_available() {
        let registry = Arc::new(EndpointRegistry::<&'static str>::new(RateLimitConfig::default()));
        let snitch = Arc::new(StaticSnitch::new(vec!["a", "b"]));
        let messenger = Arc::new(InMemoryMessenger::<&'static str>::new());
        let gate = ReplicaGroupGate::spawn(snitch, registry, messenger.clone(), "coordinator", GateConfig::default());

        gate.submit(request("k", 2));
        tokio::task::yield_now().await;
        tokio::time::sleep(StdDuration::from_millis(1)).await;

        assert_eq!(messenger.sent()[0], ("a", SentKind::Data));
    }

    #[tokio::test(start_paused = true)]
    async fn defers_then_admits_after_the_timer_fires() {
        let rate_limit = RateLimitConfig {
            rate_limiter_max_tokens: 1.0,
            ..RateLimitConfig::default()
        };
        let registry = Arc::new(EndpointRegistry::<&'static str>::new(rate_limit));
        // Drain the only candidate's budget so the first submit defers.
        let record = registry.get_or_create(&"a");
        record.rate_controller().send_limiter().set_rate(1.0);
        assert_eq!(record.rate_controller().try_acquire(), 0.0);

        let snitch = Arc::new(StaticSnitch::new(vec!["a"]));
        let messenger = Arc::new(InMemoryMessenger::<&'static str>::new());
        let gate = ReplicaGroupGate::spawn(snitch, registry, messenger.clone(), "coordinator", GateConfig::default());

        gate.submit(request("k", 1));
        tokio::task::yield_now().await;
        assert!(messenger.sent().is_empty(), "should be waiting, not yet admitted");

        // Advance virtual time past the refill interval so the armed
        // timer fires and the stash replays.
        tokio::time::advance(StdDuration::from_secs(1)).await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(messenger.sent()[0], ("a", SentKind::Data));
    }

    #[tokio::test(start_paused = true)]
    async fn stashed_reads_are_replayed_in_fifo_order() {
        let rate_limit = RateLimitConfig {
            rate_limiter_max_tokens: 4.0,
            ..RateLimitConfig::default()
        };
        let registry = Arc::new(EndpointRegistry::<&'static str>::new(rate_limit));
        let record = registry.get_or_create(&"a");
        record.rate_controller().send_limiter().set_rate(1.0);
        // Drain the full starting balance so the first submit defers;
        // after the timer fires, virtual time has advanced far enough
        // for the balance to refill back up to its cap, leaving enough
        // tokens for all three stashed reads to admit on replay.
        for _ in 0..4 {
            assert_eq!(record.rate_controller().try_acquire(), 0.0);
        }

        let snitch = Arc::new(StaticSnitch::new(vec!["a"]));
        let messenger = Arc::new(InMemoryMessenger::<&'static str>::new());
        let gate = ReplicaGroupGate::spawn(snitch, registry, messenger.clone(), "coordinator", GateConfig::default());

        gate.submit(request("r1", 1));
        tokio::task::yield_now().await;
        gate.submit(request("r2", 1));
        gate.submit(request("r3", 1));
        tokio::task::yield_now().await;

        tokio::time::advance(StdDuration::from_secs(1)).await;
        for _ in 0..6 {
            tokio::task::yield_now().await;
        }

        // Every stashed read targeted the same single replica "a", so
        // FIFO preservation shows up as three data dispatches in a row.
        let sent = messenger.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|(e, kind)| *e == "a" && *kind == SentKind::Data));
    }
}
