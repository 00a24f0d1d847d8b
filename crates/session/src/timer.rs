// Cancellable fixed-interval ticker

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Background thread that emits one tick per interval until cancelled.
///
/// Ticks do not queue up: if the consumer is still busy with the previous
/// tick, the next one is dropped.
pub struct PollTimer {
    interval: Duration,
    stop_tx: Option<Sender<()>>,
    ticks: Option<Receiver<()>>,
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

/// Outlives its [`PollTimer`]; reports whether the ticker thread is still up.
#[derive(Debug, Clone)]
pub struct TickerState(Arc<AtomicBool>);

impl TickerState {
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl PollTimer {
    pub fn start(interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (tick_tx, tick_rx) = mpsc::sync_channel::<()>(1);

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::spawn(move || {
            run_ticker(interval, stop_rx, tick_tx);
            flag.store(false, Ordering::SeqCst);
        });
        log::debug!("poll timer started ({:?})", interval);

        Self {
            interval,
            stop_tx: Some(stop_tx),
            ticks: Some(tick_rx),
            handle: Some(handle),
            running,
        }
    }

    pub fn state(&self) -> TickerState {
        TickerState(Arc::clone(&self.running))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Block until the next tick. Returns false once the timer is cancelled.
    pub fn wait_tick(&self) -> bool {
        match &self.ticks {
            Some(rx) => rx.recv().is_ok(),
            None => false,
        }
    }

    /// Stop the ticker thread. Cancelling an inactive timer is a no-op.
    pub fn cancel(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        let _ = handle.join();
        self.ticks = None;
        log::debug!("poll timer cancelled");
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn run_ticker(interval: Duration, stop_rx: Receiver<()>, tick_tx: SyncSender<()>) {
    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => match tick_tx.try_send(()) {
                Ok(()) | Err(TrySendError::Full(())) => {}
                Err(TrySendError::Disconnected(())) => break,
            },
            // Stop requested, or the owner went away
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
