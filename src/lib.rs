/// Fixed-precision conversion between human coin amounts and the node's
/// raw base-unit representation. Truncates, never rounds.
pub mod amount;

/// Run configuration (wallet, source account, node endpoint), loaded
/// from a JSON file in the working directory.
pub mod config;

/// Batch executor: consumes input records one at a time, dispatches
/// send or balance-check calls against the node and journals every
/// outcome.
///
/// NOTE: the executor is generic over [`rpc::NodeRpc`] so tests can
/// script node behaviour without a network in sight.
pub mod executor;

/// Line-oriented input reading: comment/blank filtering, field
/// splitting, line counting.
pub mod input;

/// Append-only run journal, mirrored to the live log and flushed on
/// every write.
pub mod journal;

/// Node RPC interface, plus an HTTP implementation speaking the node's
/// JSON-POST protocol.
pub mod rpc;
