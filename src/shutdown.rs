//! Run-level cancellation.
//!
//! A [`CancelHandle`] flips a shared flag; every [`Cancellation`] clone observes it.
//! Pipeline stages race their in-flight work against [`Cancellation::cancelled`]
//! and record cancelled items as data instead of dropping them.

use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

#[derive(Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

pub fn channel() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, Cancellation { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Cancels the run on the first Ctrl-C.
    pub fn cancel_on_ctrl_c(&self) {
        let handle = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("Interrupt received, finishing in-flight work as cancelled");
                    handle.cancel();
                }
                Err(e) => warn!("Failed to install Ctrl-C handler: {}", e),
            }
        });
    }

    /// Cancels the run once `deadline` has elapsed.
    pub fn cancel_after(&self, deadline: Duration) {
        let handle = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            info!("Run deadline of {:.1}s reached", deadline.as_secs_f64());
            handle.cancel();
        });
    }
}

impl Cancellation {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        channel().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the run is cancelled; pends forever if the handle is gone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
