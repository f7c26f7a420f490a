// src/services/callback_executor.rs

use std::fmt;
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Runs completion callbacks on a chosen execution context.
pub trait CallbackExecutor: Send + Sync {
    fn execute(&self, callback: Callback);
}

/// Runs the callback right away on whichever thread finished the work.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl CallbackExecutor for InlineExecutor {
    fn execute(&self, callback: Callback) {
        callback();
    }
}

/// Hands callbacks to the thread that owns the paired `CallbackQueue`,
/// e.g. a UI thread draining it once per frame.
pub struct ChannelExecutor {
    tx: Mutex<Sender<Callback>>,
}

impl ChannelExecutor {
    pub fn new() -> (Self, CallbackQueue) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Mutex::new(tx) }, CallbackQueue { rx })
    }
}

impl CallbackExecutor for ChannelExecutor {
    fn execute(&self, callback: Callback) {
        let sent = match self.tx.lock() {
            Ok(tx) => tx.send(callback).is_ok(),
            Err(_) => false,
        };
        if !sent {
            log::warn!("Callback queue closed; dropping completion callback");
        }
    }
}

impl fmt::Debug for ChannelExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelExecutor").finish_non_exhaustive()
    }
}

/// Consumer side of a `ChannelExecutor`.
pub struct CallbackQueue {
    rx: Receiver<Callback>,
}

impl CallbackQueue {
    /// Runs every callback queued so far without blocking. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(callback) = self.rx.try_recv() {
            callback();
            ran += 1;
        }
        ran
    }

    /// Waits up to `timeout` for one callback, runs it and anything queued
    /// behind it. Returns how many ran.
    pub fn run_pending_timeout(&self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(callback) => {
                callback();
                1 + self.run_pending()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }
}

impl fmt::Debug for CallbackQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackQueue").finish_non_exhaustive()
    }
}
