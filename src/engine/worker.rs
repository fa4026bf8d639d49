//! Worker execution unit.
//!
//! A worker is drawn from the idle pool, bound to exactly one contract for
//! the duration of one watch cycle, and returned to the pool afterwards. It
//! polls at the heartbeat interval and fires the contract's timeout action
//! once the deadline has passed, unless told to stop first.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::types::WatchReport;
use crate::core::contract::Contract;
use crate::core::time;

/// Everything a worker needs for one watch cycle.
pub(crate) struct WatchAssignment<C> {
    /// Engine-wide shutdown signal.
    pub root: CancellationToken,
    /// Per-contract cancellation signal (owned by the engine, observed here).
    pub hot_exit: CancellationToken,
    /// Polling interval.
    pub heartbeat: Duration,
    /// The contract under watch.
    pub contract: Arc<C>,
    /// Completion channel back to the run loop.
    pub done: mpsc::Sender<WatchReport>,
}

/// A single execution unit in the worker pool.
pub(crate) struct Worker {
    id: usize,
    ticked: u64,
    stop: CancellationToken,
    idle_tx: mpsc::Sender<Worker>,
}

impl Worker {
    pub(crate) fn new(id: usize, idle_tx: mpsc::Sender<Worker>) -> Self {
        Self {
            id,
            ticked: 0,
            stop: CancellationToken::new(),
            idle_tx,
        }
    }

    /// Pool-assigned worker number, used in dispatch events and logs.
    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Request that the worker stop after its current evaluation cycle.
    pub(crate) fn stop(&self) {
        self.stop.cancel();
    }

    /// Begin watching one contract.
    ///
    /// Spawns the polling loop and consumes the worker; it hands itself back
    /// to the idle pool on every exit path. The worker stops without firing
    /// when the root signal, its own stop request, or the contract's hot-exit
    /// signal fires; cancellation checks come before the deadline check, so a
    /// prune observed in the same cycle as expiry always wins.
    pub(crate) fn start<C: Contract>(mut self, watch: WatchAssignment<C>) {
        tokio::spawn(async move {
            let id = watch.contract.identifier().clone();
            let mut ticker = tokio::time::interval(watch.heartbeat);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = watch.root.cancelled() => {
                        tracing::debug!(worker = self.id, id = %id, ticks = self.ticked, "worker released by shutdown");
                        break;
                    }

                    _ = self.stop.cancelled() => {
                        break;
                    }

                    _ = watch.hot_exit.cancelled() => {
                        tracing::debug!(worker = self.id, id = %id, "contract pruned mid-watch");
                        let _ = watch.done.send(WatchReport::cancelled(id.clone())).await;
                        break;
                    }

                    _ = ticker.tick() => {
                        self.ticked += 1;
                        if time::is_past(watch.contract.deadline()) || watch.contract.has_expired() {
                            let action_failed = match watch.contract.execute_timeout_action().await {
                                Ok(()) => false,
                                Err(e) => {
                                    watch.contract.report_error(&e);
                                    true
                                }
                            };
                            if watch.done.send(WatchReport::fired(id.clone(), action_failed)).await.is_err() {
                                tracing::debug!(worker = self.id, id = %id, "engine gone before completion report");
                            }
                            // mirror the idle-pool hand-off of every other exit:
                            // request our own stop and leave through the select
                            self.stop();
                        }
                    }
                }
            }

            // every exit path conserves the pool: reset tick accounting,
            // arm a fresh stop signal, and rejoin the idle queue
            self.ticked = 0;
            self.stop = CancellationToken::new();
            let idle_tx = self.idle_tx.clone();
            let _ = idle_tx.send(self).await;
        });
    }
}
