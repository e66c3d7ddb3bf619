//! Run-to-completion adapter for synchronous callers
//!
//! Drives a future to completion from code that may or may not already be
//! running inside a tokio runtime:
//! - no ambient runtime: a bridge-owned current-thread runtime, created on
//!   first use and recreated after [`BlockingBridge::shutdown`]
//! - multi-thread runtime: `block_in_place` on the ambient handle
//! - current-thread runtime: a scoped helper thread with its own runtime,
//!   since blocking the only worker would deadlock

use crate::error::{BridgeError, Result};
use std::future::Future;
use std::sync::Mutex;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

#[derive(Default)]
pub struct BlockingBridge {
    runtime: Mutex<Option<Runtime>>,
}

impl BlockingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block the current thread until `future` completes
    pub fn run<F>(&self, future: F) -> Result<F::Output>
    where
        F: Future + Send,
        F::Output: Send,
    {
        match Handle::try_current() {
            Ok(handle) => match handle.runtime_flavor() {
                RuntimeFlavor::CurrentThread => Self::run_on_helper_thread(future),
                _ => Ok(tokio::task::block_in_place(|| handle.block_on(future))),
            },
            Err(_) => self.run_owned(future),
        }
    }

    /// Whether the bridge currently holds its own runtime
    pub fn has_runtime(&self) -> bool {
        self.runtime
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Drop the owned runtime; the next `run` builds a fresh one
    pub fn shutdown(&self) {
        if let Ok(mut guard) = self.runtime.lock() {
            if let Some(runtime) = guard.take() {
                runtime.shutdown_background();
            }
        }
    }

    fn run_owned<F: Future>(&self, future: F) -> Result<F::Output> {
        let mut guard = self
            .runtime
            .lock()
            .map_err(|_| BridgeError::Llm("Blocking runtime lock poisoned".to_string()))?;

        let runtime = match guard.take() {
            Some(runtime) => runtime,
            None => build_runtime()?,
        };
        let output = runtime.block_on(future);
        *guard = Some(runtime);

        Ok(output)
    }

    fn run_on_helper_thread<F>(future: F) -> Result<F::Output>
    where
        F: Future + Send,
        F::Output: Send,
    {
        std::thread::scope(|scope| {
            let worker = scope.spawn(|| build_runtime().map(|runtime| runtime.block_on(future)));
            match worker.join() {
                Ok(result) => result,
                Err(_) => Err(BridgeError::Llm(
                    "Blocking bridge worker thread panicked".to_string(),
                )),
            }
        })
    }
}

fn build_runtime() -> Result<Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
