//! Asynchronous dispatch session that streams lifecycle events and responds to
//! cancellation.
//!
//! The synchronous [`Dispatcher`] runs on Tokio's blocking pool while this task relays
//! state changes as [`DispatchEvent`]s. Monitored exertions additionally emit periodic
//! progress snapshots of the units still running.

use std::{sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use exert_types::ExecState;
use exert_util::block_on_future;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info};

use super::{DispatchControl, DispatchObserver, Dispatcher};
use crate::exertion::Exertion;

/// An exertion handed to [`drive_exertion`].
#[derive(Debug)]
pub struct DispatchRequest {
    pub exertion: Exertion,
}

impl DispatchRequest {
    pub fn new(exertion: impl Into<Exertion>) -> Self {
        Self {
            exertion: exertion.into(),
        }
    }
}

/// Commands accepted while a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControl {
    Cancel,
}

/// Lifecycle notifications emitted by a session.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    Started {
        exertion: String,
        at: DateTime<Utc>,
    },
    StateChanged {
        exertion: String,
        kind: String,
        state: ExecState,
    },
    CancelRequested,
    Progress {
        running: Vec<String>,
        at: DateTime<Utc>,
    },
    Completed {
        exertion: String,
        state: ExecState,
        failures: usize,
        finished_at: DateTime<Utc>,
    },
}

/// Last known state of every unit in the tree, in first-seen order.
type StateBoard = Arc<Mutex<IndexMap<String, ExecState>>>;

struct EventRelay {
    events: UnboundedSender<DispatchEvent>,
    board: StateBoard,
}

impl DispatchObserver for EventRelay {
    fn state_changed(&self, exertion: &str, kind: &'static str, state: ExecState) {
        self.board.lock().insert(exertion.to_string(), state);
        let _ = self.events.send(DispatchEvent::StateChanged {
            exertion: exertion.to_string(),
            kind: kind.to_string(),
            state,
        });
    }
}

/// Dispatches the request's exertion to completion while emitting lifecycle events.
///
/// Closing the control channel does not cancel the run. The dispatched exertion is
/// returned with its final state, context and trace.
pub async fn drive_exertion(
    dispatcher: Arc<Dispatcher>,
    request: DispatchRequest,
    mut control_rx: UnboundedReceiver<SessionControl>,
    event_tx: UnboundedSender<DispatchEvent>,
) -> Result<Exertion> {
    let DispatchRequest { mut exertion } = request;
    let name = exertion.name().to_string();
    let monitored = exertion.strategy().monitored;
    let interval = Duration::from_millis(dispatcher.config().monitor_interval_ms.max(1));

    let board: StateBoard = Arc::default();
    let control = DispatchControl::new().with_observer(Arc::new(EventRelay {
        events: event_tx.clone(),
        board: board.clone(),
    }));

    let _ = event_tx.send(DispatchEvent::Started {
        exertion: name.clone(),
        at: Utc::now(),
    });

    let worker_control = control.clone();
    let mut worker = tokio::task::spawn_blocking(move || {
        let outcome = dispatcher.dispatch_with(&mut exertion, &worker_control);
        (exertion, outcome)
    });

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    let mut controls_open = true;

    let (exertion, outcome) = loop {
        tokio::select! {
            joined = &mut worker => {
                break joined.map_err(|error| anyhow!("dispatch of '{name}' panicked: {error}"))?;
            }
            command = control_rx.recv(), if controls_open => match command {
                Some(SessionControl::Cancel) => {
                    if !control.is_cancelled() {
                        info!(exertion = %name, "cancel requested");
                        control.cancel();
                        let _ = event_tx.send(DispatchEvent::CancelRequested);
                    }
                }
                None => {
                    debug!(exertion = %name, "control channel closed");
                    controls_open = false;
                }
            },
            _ = ticker.tick(), if monitored => {
                let running = running_units(&board);
                debug!(exertion = %name, running = running.len(), "monitor tick");
                let _ = event_tx.send(DispatchEvent::Progress { running, at: Utc::now() });
            }
        }
    };

    let state = outcome?;
    let _ = event_tx.send(DispatchEvent::Completed {
        exertion: name,
        state,
        failures: exertion.trace().len(),
        finished_at: Utc::now(),
    });
    Ok(exertion)
}

/// Runs a session from synchronous code and returns the exertion with every event emitted.
pub fn dispatch_blocking(dispatcher: Arc<Dispatcher>, request: DispatchRequest) -> Result<(Exertion, Vec<DispatchEvent>)> {
    let (_control_tx, control_rx) = unbounded_channel();
    let (event_tx, mut event_rx) = unbounded_channel();
    let exertion = block_on_future(drive_exertion(dispatcher, request, control_rx, event_tx))?;
    let mut events = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        events.push(event);
    }
    Ok((exertion, events))
}

fn running_units(board: &StateBoard) -> Vec<String> {
    board
        .lock()
        .iter()
        .filter(|(_, state)| **state == ExecState::Running)
        .map(|(name, _)| name.clone())
        .collect()
}
