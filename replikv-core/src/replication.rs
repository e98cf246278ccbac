//! Outbound replication: leader broadcasts and follower forwards.
//!
//! A broadcast is a group of independent dispatches, one per target, owned
//! by a supervisor task that collects and logs the outcomes. The caller gets
//! a [`BroadcastHandle`] back immediately and is free to drop it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::message::{ReplicationEnvelope, Request, Response};
use crate::topology::Peer;
use crate::transport::PeerTransport;

pub const DEFAULT_REPLICATION_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// Upper bound for a single peer call, including time spent waiting for
    /// a dispatch slot.
    pub timeout: Duration,
    /// Outbound broadcast dispatches allowed to run at once.
    pub max_in_flight: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REPLICATION_TIMEOUT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// Result of one dispatch within a broadcast.
#[derive(Debug)]
pub struct PeerOutcome {
    pub peer: Peer,
    pub result: Result<Response>,
}

#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub outcomes: Vec<PeerOutcome>,
}

impl BroadcastReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> Vec<&PeerOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err()).collect()
    }

    pub fn outcome_for(&self, peer_id: u64) -> Option<&PeerOutcome> {
        self.outcomes.iter().find(|o| o.peer.id == peer_id)
    }
}

/// Handle on a running broadcast. Dropping it leaves the broadcast running.
#[derive(Debug)]
pub struct BroadcastHandle {
    task: JoinHandle<BroadcastReport>,
}

impl BroadcastHandle {
    /// Waits for every dispatch to finish or time out.
    pub async fn wait(self) -> BroadcastReport {
        match self.task.await {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "broadcast supervisor did not complete");
                BroadcastReport::default()
            }
        }
    }
}

pub struct Replicator<T> {
    transport: Arc<T>,
    config: ReplicationConfig,
    permits: Arc<Semaphore>,
}

impl<T: PeerTransport> Replicator<T> {
    pub fn new(transport: Arc<T>, config: ReplicationConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        Self {
            transport,
            config,
            permits,
        }
    }

    /// Sends `envelope` to every target in parallel without waiting for any
    /// of them. Must be called from within a tokio runtime.
    pub fn broadcast(
        &self,
        envelope: ReplicationEnvelope,
        targets: Vec<Peer>,
    ) -> BroadcastHandle {
        let request = envelope.to_request();
        let limit = self.config.timeout;
        let mut dispatches = JoinSet::new();

        for peer in targets {
            let transport = Arc::clone(&self.transport);
            let permits = Arc::clone(&self.permits);
            let request = request.clone();

            dispatches.spawn(async move {
                let attempt = async {
                    let _permit = permits.acquire_owned().await.map_err(|_| {
                        Error::ReplicationUnreachable {
                            peer: peer.id,
                            addr: peer.addr.clone(),
                            reason: "replication pool closed".to_string(),
                        }
                    })?;
                    call_peer(transport.as_ref(), &peer, request).await
                };
                let result = match tokio::time::timeout(limit, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(timed_out(&peer, limit)),
                };
                PeerOutcome { peer, result }
            });
        }

        let from = envelope.requester_id;
        let op = envelope.op.name();
        let key = envelope.op.key().to_string();

        let task = tokio::spawn(async move {
            let mut report = BroadcastReport::default();
            while let Some(joined) = dispatches.join_next().await {
                let outcome = match joined {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(node = from, error = %err, "replication dispatch aborted");
                        continue;
                    }
                };
                match &outcome.result {
                    Ok(_) => {
                        debug!(node = from, peer = %outcome.peer, op, key = %key, "replicated")
                    }
                    Err(err) => warn!(
                        node = from,
                        peer = %outcome.peer,
                        op,
                        key = %key,
                        error = %err,
                        "replication failed"
                    ),
                }
                report.outcomes.push(outcome);
            }
            report
        });

        BroadcastHandle { task }
    }

    /// Sends `envelope` to the leader and waits for its answer. The leader's
    /// answer, or the failure to get one, becomes the caller's result.
    pub async fn forward(&self, envelope: ReplicationEnvelope, leader: &Peer) -> Result<Response> {
        let request = envelope.to_request();
        let limit = self.config.timeout;
        info!(
            node = envelope.requester_id,
            leader = %leader,
            op = envelope.op.name(),
            key = envelope.op.key(),
            "forwarding write to leader"
        );

        let call = call_peer(self.transport.as_ref(), leader, request);
        let result = match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(timed_out(leader, limit)),
        };
        if let Err(err) = &result {
            warn!(
                node = envelope.requester_id,
                leader = %leader,
                error = %err,
                "forward to leader failed"
            );
        }
        result
    }
}

async fn call_peer<T: PeerTransport>(
    transport: &T,
    peer: &Peer,
    request: Request,
) -> Result<Response> {
    match transport.call(&peer.addr, request).await {
        Ok(Response::Error { code, message }) => Err(Error::from_wire(code, message)),
        Ok(response) => Ok(response),
        Err(err) => Err(Error::ReplicationUnreachable {
            peer: peer.id,
            addr: peer.addr.clone(),
            reason: err.to_string(),
        }),
    }
}

fn timed_out(peer: &Peer, timeout: Duration) -> Error {
    Error::ReplicationTimeout {
        peer: peer.id,
        addr: peer.addr.clone(),
        timeout,
    }
}
