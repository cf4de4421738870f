//! # Dispatch Queue
//!
//! Per-consumer sequential delivery loop with an explicit pause/resume/retry
//! state machine.
//!
//! ## State Machine
//!
//! ```text
//!               pause() / handler failure
//!   ┌─────────┐ ─────────────────────────→ ┌────────┐
//!   │ Running │                            │ Paused │ ──┐ resume(), replay fails
//!   └─────────┘ ←───────────────────────── └────────┘ ←─┘ (stays Paused)
//!          resume(), retry-list replayed OK
//! ```
//!
//! ## Rules
//!
//! - At most one handler invocation is in flight per queue.
//! - A failed message is appended to the retry-list and the queue pauses;
//!   nothing is ever dropped.
//! - Replay runs on the dispatch loop, front to back. The first failure stops
//!   it: the failed entry and everything after it stay in the retry-list, in
//!   order, and the queue stays Paused.
//! - New messages are drained only while Running, which implies an empty
//!   retry-list.
//!
//! ## Shutdown
//!
//! [`DispatchQueue::shutdown`] drops the queue's own handle and waits for the
//! loop. The loop ends once every [`QueueHandle`] is gone: a Running queue
//! first drains its backlog, a Paused queue stops at once and counts what it
//! could not deliver.

use crate::config::BusConfig;
use crate::elastic::{ElasticChannel, ElasticReceiver, ElasticSender};
use crate::error::BusError;
use crate::handler::Handler;
use crate::message::Message;
use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Pause,
    Resume,
}

/// State mirrored out of the dispatch loop for synchronous queries.
#[derive(Debug, Default)]
struct QueueState {
    paused: AtomicBool,
    retained: AtomicUsize,
}

/// Outcome of a queue's lifetime, returned by [`DispatchQueue::shutdown`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueReport {
    /// Messages the handler accepted, replays included.
    pub delivered: u64,
    /// Messages left in the retry-list.
    pub retained: usize,
    /// Messages still in the elastic channel when a paused queue stopped.
    pub unread: usize,
}

impl QueueReport {
    /// Messages that were accepted but never delivered.
    #[must_use]
    pub fn undelivered(&self) -> usize {
        self.retained + self.unread
    }
}

/// Cloneable control surface of a running [`DispatchQueue`].
#[derive(Clone, Debug)]
pub struct QueueHandle {
    label: Arc<str>,
    sender: ElasticSender,
    control: mpsc::UnboundedSender<Control>,
    state: Arc<QueueState>,
}

impl QueueHandle {
    /// Accept a message for delivery.
    ///
    /// Waits only for the elastic channel to take the message, never for the
    /// backlog to drain. Fails with [`BusError::Closed`] once the loop has
    /// stopped.
    pub async fn enqueue(&self, msg: Message) -> Result<(), BusError> {
        self.sender.send(msg).await
    }

    /// Stop draining new messages. No-op if already paused.
    pub fn pause(&self) {
        if self.state.paused.swap(true, Ordering::SeqCst) {
            return;
        }
        // Loop already gone: nothing left to pause.
        let _ = self.control.send(Control::Pause);
    }

    /// Replay the retry-list, then resume draining if the replay succeeded.
    ///
    /// Takes effect asynchronously on the dispatch loop.
    pub fn resume(&self) {
        let _ = self.control.send(Control::Resume);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.paused.load(Ordering::SeqCst)
    }

    /// Current length of the retry-list.
    #[must_use]
    pub fn retained(&self) -> usize {
        self.state.retained.load(Ordering::SeqCst)
    }

    /// Messages accepted but not yet handed to the dispatch loop.
    #[must_use]
    pub fn backlog(&self) -> usize {
        self.sender.backlog()
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// A dispatch loop plus the handle that owns it.
pub struct DispatchQueue {
    handle: QueueHandle,
    task: JoinHandle<QueueReport>,
}

impl DispatchQueue {
    /// Spawn the elastic channel and dispatch loop for `handler`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(label: impl Into<String>, handler: Arc<dyn Handler>, config: &BusConfig) -> Self {
        let label: Arc<str> = Arc::from(label.into());
        let (sender, messages) = ElasticChannel::spawn(config);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let state = Arc::new(QueueState::default());

        let dispatch = DispatchLoop {
            label: Arc::clone(&label),
            handler,
            messages,
            control: control_rx,
            state: Arc::clone(&state),
            retry: VecDeque::new(),
            paused: false,
            delivered: 0,
        };
        let task = tokio::spawn(dispatch.run());

        debug!(queue = %label, "Dispatch queue started");

        Self {
            handle: QueueHandle {
                label,
                sender,
                control: control_tx,
                state,
            },
            task,
        }
    }

    /// A cloneable handle to this queue.
    #[must_use]
    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    /// Drop this queue's handle and wait for the dispatch loop to finish.
    ///
    /// Only completes once every other [`QueueHandle`] clone is dropped too.
    pub async fn shutdown(self) -> QueueReport {
        let label = Arc::clone(&self.handle.label);
        drop(self.handle);

        match self.task.await {
            Ok(report) => report,
            Err(e) => {
                error!(queue = %label, error = %e, "Dispatch loop aborted");
                QueueReport::default()
            }
        }
    }
}

impl Deref for DispatchQueue {
    type Target = QueueHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

struct DispatchLoop {
    label: Arc<str>,
    handler: Arc<dyn Handler>,
    messages: ElasticReceiver,
    control: mpsc::UnboundedReceiver<Control>,
    state: Arc<QueueState>,
    retry: VecDeque<Message>,
    paused: bool,
    delivered: u64,
}

impl DispatchLoop {
    async fn run(mut self) -> QueueReport {
        let mut control_open = true;

        loop {
            if self.paused {
                match self.control.recv().await {
                    Some(Control::Resume) => self.replay().await,
                    Some(Control::Pause) => {}
                    None => break,
                }
                continue;
            }

            tokio::select! {
                biased;

                command = self.control.recv(), if control_open => match command {
                    Some(Control::Pause) => self.enter_pause(),
                    // Running implies an empty retry-list.
                    Some(Control::Resume) => {}
                    None => control_open = false,
                },
                received = self.messages.recv() => match received {
                    Some(msg) => self.dispatch(msg).await,
                    None => break,
                },
            }
        }

        self.finish().await
    }

    async fn dispatch(&mut self, msg: Message) {
        match self.handler.deliver(&msg).await {
            Ok(()) => self.delivered += 1,
            Err(error) => {
                self.retry.push_back(msg);
                self.state.retained.store(self.retry.len(), Ordering::SeqCst);
                warn!(
                    queue = %self.label,
                    retained = self.retry.len(),
                    error = %error,
                    "Delivery failed, queue paused"
                );
                self.enter_pause();
            }
        }
    }

    async fn replay(&mut self) {
        let pending = self.retry.len();

        while let Some(msg) = self.retry.front() {
            if let Err(error) = self.handler.deliver(msg).await {
                warn!(
                    queue = %self.label,
                    retained = self.retry.len(),
                    error = %error,
                    "Replay failed, queue stays paused"
                );
                return;
            }
            self.retry.pop_front();
            self.delivered += 1;
            self.state.retained.store(self.retry.len(), Ordering::SeqCst);
        }

        self.paused = false;
        self.state.paused.store(false, Ordering::SeqCst);

        if pending > 0 {
            info!(queue = %self.label, replayed = pending, "Queue resumed after replay");
        } else {
            debug!(queue = %self.label, "Queue resumed");
        }
    }

    fn enter_pause(&mut self) {
        self.paused = true;
        self.state.paused.store(true, Ordering::SeqCst);
    }

    async fn finish(mut self) -> QueueReport {
        let mut unread = 0;
        if self.paused {
            // Every handle is gone, so the elastic channel is closing too.
            while self.messages.recv().await.is_some() {
                unread += 1;
            }
        }

        let report = QueueReport {
            delivered: self.delivered,
            retained: self.retry.len(),
            unread,
        };

        if report.undelivered() > 0 {
            warn!(
                queue = %self.label,
                retained = report.retained,
                unread = report.unread,
                "Dispatch queue stopped with undelivered messages"
            );
        } else {
            debug!(queue = %self.label, delivered = report.delivered, "Dispatch queue stopped");
        }

        report
    }
}
