//! Order intake queue.
//!
//! Bounded FIFO between the facade and the coordinator. The bounded
//! channel is the backpressure: while the coordinator's single consumer
//! is placing an order, producers queue behind it.

use crate::coordinator::PlacementOutcome;
use crate::error::{ExecutorError, ExecutorResult};
use kis_core::OrderRequest;
use tokio::sync::{mpsc, oneshot};

/// One queued request, optionally carrying a reply slot for callers
/// that want the placement outcome back.
pub struct IntakeItem {
    pub request: OrderRequest,
    pub reply: Option<oneshot::Sender<PlacementOutcome>>,
}

/// Producer half handed to the facade.
#[derive(Clone)]
pub struct OrderIntake {
    tx: mpsc::Sender<IntakeItem>,
}

impl OrderIntake {
    /// Enqueue without waiting for the outcome.
    pub async fn submit(&self, request: OrderRequest) -> ExecutorResult<()> {
        self.tx
            .send(IntakeItem {
                request,
                reply: None,
            })
            .await
            .map_err(|_| ExecutorError::QueueClosed)
    }

    /// Enqueue and wait for the coordinator's placement outcome.
    pub async fn submit_and_wait(&self, request: OrderRequest) -> ExecutorResult<PlacementOutcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(IntakeItem {
                request,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| ExecutorError::QueueClosed)?;
        reply_rx.await.map_err(|_| ExecutorError::QueueClosed)
    }
}

/// Build the intake pair; the receiver goes to the coordinator's
/// consume loop.
pub fn intake_channel(capacity: usize) -> (OrderIntake, mpsc::Receiver<IntakeItem>) {
    let (tx, rx) = mpsc::channel(capacity);
    (OrderIntake { tx }, rx)
}
