/// Failures this subsystem surfaces to its embedder.
///
/// Per-reply data problems (a missing metric, a latency/service-time
/// invariant violation) are *not* represented here: the specification
/// treats those as local, logged-and-skipped events that never
/// propagate to a caller's read result. Admission itself (`push_read`)
/// is infallible per the specification ("admission never throws; it
/// only returns durations") — it never constructs this type. The sole
/// remaining variant is the error type of the [`crate::Messenger`]
/// trait's `send_data`/`send_digest` methods, for implementors whose
/// dispatch is a real, fallible network call; `push_read` itself
/// catches and logs that failure rather than propagating it, so even a
/// failed dispatch never reaches a caller through this type.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdmissionError {
    #[error("dispatch to replica failed: {0}")]
    Dispatch(String),
}
