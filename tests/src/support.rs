//! Shared fixtures: recording and failing handlers plus polling helpers.

use fanout_bus::{handler_fn, Handler, HandlerError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// One observed delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub handler: &'static str,
    pub payload: String,
}

pub type Deliveries = Arc<Mutex<Vec<Delivery>>>;

/// Handler that records every message it accepts under `name`.
pub fn recording(name: &'static str, log: &Deliveries) -> Arc<dyn Handler> {
    let log = Arc::clone(log);
    handler_fn(move |msg| {
        log.lock().push(Delivery {
            handler: name,
            payload: msg.as_str().unwrap_or_default().to_string(),
        });
        Ok(())
    })
}

/// Handler that always fails and counts its invocations.
pub fn failing(calls: &Arc<AtomicUsize>) -> Arc<dyn Handler> {
    let calls = Arc::clone(calls);
    handler_fn(move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(HandlerError::Disconnected)
    })
}

pub fn payloads(log: &Deliveries) -> Vec<String> {
    log.lock().iter().map(|d| d.payload.clone()).collect()
}

pub fn handlers(log: &Deliveries) -> Vec<&'static str> {
    log.lock().iter().map(|d| d.handler).collect()
}

/// Poll `cond` every few milliseconds; panic after `limit`.
pub async fn wait_until_within(limit: Duration, what: &str, mut cond: impl FnMut() -> bool) {
    let reached = timeout(limit, async {
        while !cond() {
            sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for {what}");
}

pub async fn wait_until(what: &str, cond: impl FnMut() -> bool) {
    wait_until_within(Duration::from_secs(5), what, cond).await;
}
