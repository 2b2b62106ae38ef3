//! Bounded adapter calls

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use super::{AdapterError, AdapterResult};

/// Run `call` on a worker thread and wait at most `timeout` for its result.
///
/// On timeout the worker thread is left to finish on its own; its result is
/// dropped. A panicking call is reported as unavailable.
pub fn call_with_timeout<T, F>(timeout: Duration, call: F) -> AdapterResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AdapterResult<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("penplot-adapter".to_string())
        .spawn(move || {
            let _ = tx.send(call());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(AdapterError::Timeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(AdapterError::Unavailable(
            "adapter call panicked".to_string(),
        )),
    }
}
