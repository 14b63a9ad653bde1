//! Long-poll exit delivery
//!
//! Polls the checkpoint oracle for one burn on a fixed interval and hands the
//! exit transaction to a sink once the burn block is checkpointed. The
//! watcher is a tokio task owned through an [`ExitWatchHandle`]; cancelling
//! or dropping the handle stops it, including an oracle read or a delivery in
//! flight.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ethers::types::{Address, H256};
use reqwest::Client;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::bridge::checkpoint::CheckpointOracle;
use crate::bridge::errors::BridgeError;
use crate::bridge::types::{BurnStatus, ExitNotification};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Destination of a ready exit transaction
#[async_trait]
pub trait ExitSink: Send + Sync {
    async fn deliver(&self, notification: &ExitNotification) -> Result<(), BridgeError>;
}

/// POSTs the notification as JSON to a callback URL
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(client: Client, url: &str) -> Self {
        Self { client, url: url.to_string() }
    }

    fn failure(&self, reason: impl ToString) -> BridgeError {
        BridgeError::DeliveryFailure {
            destination: self.url.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl ExitSink for WebhookSink {
    async fn deliver(&self, notification: &ExitNotification) -> Result<(), BridgeError> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| self.failure(e))?;
        if !response.status().is_success() {
            return Err(self.failure(format!("callback answered {}", response.status())));
        }
        Ok(())
    }
}

/// Forwards the notification into a tokio channel
pub struct ChannelSink {
    tx: mpsc::Sender<ExitNotification>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ExitNotification>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ExitSink for ChannelSink {
    async fn deliver(&self, notification: &ExitNotification) -> Result<(), BridgeError> {
        self.tx.send(notification.clone()).await.map_err(|_| BridgeError::DeliveryFailure {
            destination: "channel".to_string(),
            reason: "receiver dropped".to_string(),
        })
    }
}

/// The burn being watched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitWatch {
    pub child_chain_id: u64,
    pub block_number: u64,
    pub burn_tx_hash: H256,
    pub initiator: Address,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchOutcome {
    Delivered(ExitNotification),
    Cancelled,
    /// Non-retryable oracle error
    Failed(BridgeError),
}

pub struct ExitWatcher {
    oracle: Arc<CheckpointOracle>,
    poll_interval: Duration,
}

impl ExitWatcher {
    pub fn new(oracle: Arc<CheckpointOracle>, poll_interval: Duration) -> Self {
        Self { oracle, poll_interval }
    }

    pub fn spawn(&self, watch: ExitWatch, sink: Arc<dyn ExitSink>) -> ExitWatchHandle {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        log::info!(
            "watching burn {:?} (block {} on chain {}) every {:?}",
            watch.burn_tx_hash,
            watch.block_number,
            watch.child_chain_id,
            self.poll_interval
        );
        let task = tokio::spawn(run(self.oracle.clone(), watch, sink, self.poll_interval, cancel_rx));
        ExitWatchHandle { cancel: Some(cancel_tx), task: Some(task) }
    }
}

/// Owner of a running watch. Dropping it cancels the watch.
pub struct ExitWatchHandle {
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<WatchOutcome>>,
}

impl ExitWatchHandle {
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Wait for the watch to end without cancelling it
    pub async fn wait(mut self) -> WatchOutcome {
        // the sender must outlive the task, its drop reads as a cancel
        let _cancel = self.cancel.take();
        match self.task.take() {
            Some(task) => match task.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => WatchOutcome::Cancelled,
                Err(e) => WatchOutcome::Failed(BridgeError::DeliveryFailure {
                    destination: "exit watcher".to_string(),
                    reason: e.to_string(),
                }),
            },
            None => WatchOutcome::Cancelled,
        }
    }
}

impl Drop for ExitWatchHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run(
    oracle: Arc<CheckpointOracle>,
    watch: ExitWatch,
    sink: Arc<dyn ExitSink>,
    poll_interval: Duration,
    mut cancel: oneshot::Receiver<()>,
) -> WatchOutcome {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ready: Option<ExitNotification> = None;

    loop {
        tokio::select! {
            biased;
            _ = &mut cancel => {
                log::info!("watch for {:?} cancelled", watch.burn_tx_hash);
                return WatchOutcome::Cancelled;
            }
            _ = ticker.tick() => {}
        }

        if ready.is_none() {
            let check = oracle.check_burn_inclusion(
                watch.child_chain_id,
                watch.block_number,
                watch.burn_tx_hash,
                watch.initiator,
            );
            let status = tokio::select! {
                biased;
                _ = &mut cancel => {
                    log::info!("watch for {:?} cancelled during oracle read", watch.burn_tx_hash);
                    return WatchOutcome::Cancelled;
                }
                status = check => status,
            };

            match status {
                Ok(BurnStatus::Included(transaction)) => {
                    ready = Some(ExitNotification {
                        child_chain_id: watch.child_chain_id,
                        burn_tx_hash: watch.burn_tx_hash,
                        block_number: watch.block_number,
                        initiator: watch.initiator,
                        transaction,
                        included_at: Utc::now(),
                    });
                }
                Ok(BurnStatus::NotYetIncluded) => continue,
                Ok(BurnStatus::Unknown(message)) => {
                    log::warn!("unknown verdict for {:?}, still polling: {:?}", watch.burn_tx_hash, message);
                    continue;
                }
                Err(e) if e.is_retryable() => {
                    log::warn!("oracle read for {:?} failed, still polling: {}", watch.burn_tx_hash, e);
                    continue;
                }
                Err(e) => {
                    log::error!("watch for {:?} failed: {}", watch.burn_tx_hash, e);
                    return WatchOutcome::Failed(e);
                }
            }
        }

        if let Some(notification) = &ready {
            let delivery = tokio::select! {
                biased;
                _ = &mut cancel => {
                    log::info!("watch for {:?} cancelled during delivery", watch.burn_tx_hash);
                    return WatchOutcome::Cancelled;
                }
                delivery = sink.deliver(notification) => delivery,
            };
            match delivery {
                Ok(()) => {
                    log::info!("exit tx for {:?} delivered", watch.burn_tx_hash);
                    return WatchOutcome::Delivered(notification.clone());
                }
                Err(e) => log::warn!("{}, retrying next tick", e),
            }
        }
    }
}
