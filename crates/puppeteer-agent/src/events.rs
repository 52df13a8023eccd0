//! Event stream - live fan-out of run progress with a bounded replay buffer
//!
//! Publishing never blocks: live delivery goes through a broadcast channel
//! and a subscriber that falls behind skips ahead instead of stalling
//! publishers. The replay buffer keeps the most recent events for late
//! subscribers, evicting the oldest first.

use chrono::{DateTime, Utc};
use futures::Stream;
use puppeteer_core::{Answer, EventsConfig, PathId, PathStatus, TaskId};
use puppeteer_graph::ActionNode;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    StepRecorded {
        path_id: PathId,
        node: ActionNode,
    },
    PathTerminated {
        path_id: PathId,
        status: PathStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<Answer>,
    },
    RunCompleted {
        task_id: TaskId,
        final_answer: Answer,
    },
    Error {
        scope: String,
        message: String,
    },
}

impl Event {
    /// Path the event belongs to, if any.
    pub fn path_id(&self) -> Option<&PathId> {
        match self {
            Event::StepRecorded { path_id, .. } | Event::PathTerminated { path_id, .. } => {
                Some(path_id)
            }
            _ => None,
        }
    }
}

/// A published event with its stream position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

struct History {
    buffer: VecDeque<EventRecord>,
    next_seq: u64,
}

struct Inner {
    tx: broadcast::Sender<EventRecord>,
    history: Mutex<History>,
    replay_capacity: usize,
}

/// Cheap to clone; all clones publish to the same subscribers.
#[derive(Clone)]
pub struct EventStream {
    inner: Arc<Inner>,
}

impl Default for EventStream {
    fn default() -> Self {
        Self::from_config(&EventsConfig::default())
    }
}

impl EventStream {
    /// `replay_capacity` 0 disables replay.
    pub fn new(replay_capacity: usize, channel_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                tx,
                history: Mutex::new(History {
                    buffer: VecDeque::with_capacity(replay_capacity.min(1024)),
                    next_seq: 0,
                }),
                replay_capacity,
            }),
        }
    }

    pub fn from_config(config: &EventsConfig) -> Self {
        Self::new(config.replay_capacity, config.channel_capacity)
    }

    /// Publish to every live subscriber and the replay buffer. Returns the
    /// event's sequence number.
    pub fn publish(&self, event: Event) -> u64 {
        let mut history = self.history();
        let record = EventRecord {
            seq: history.next_seq,
            timestamp: Utc::now(),
            event,
        };
        history.next_seq += 1;
        if self.inner.replay_capacity > 0 {
            if history.buffer.len() >= self.inner.replay_capacity {
                history.buffer.pop_front();
            }
            history.buffer.push_back(record.clone());
        }
        // No subscribers is fine.
        let _ = self.inner.tx.send(record.clone());
        record.seq
    }

    /// Events published from now on.
    pub fn subscribe(&self) -> Subscription {
        let _history = self.history();
        Subscription {
            backlog: VecDeque::new(),
            rx: self.inner.tx.subscribe(),
        }
    }

    /// Buffered events first, then live events, without gaps or repeats.
    pub fn subscribe_with_replay(&self) -> Subscription {
        let history = self.history();
        Subscription {
            backlog: history.buffer.clone(),
            rx: self.inner.tx.subscribe(),
        }
    }

    /// Contents of the replay buffer, oldest first.
    pub fn replay(&self) -> Vec<EventRecord> {
        self.history().buffer.iter().cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }

    fn history(&self) -> MutexGuard<'_, History> {
        // A panic while holding the lock cannot leave History half-updated.
        self.inner.history.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A live view of the stream. Dropping it unsubscribes.
pub struct Subscription {
    backlog: VecDeque<EventRecord>,
    rx: broadcast::Receiver<EventRecord>,
}

impl Subscription {
    /// Next event. `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<EventRecord> {
        if let Some(record) = self.backlog.pop_front() {
            return Some(record);
        }
        loop {
            match self.rx.recv().await {
                Ok(record) => return Some(record),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged, skipping ahead");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is ready.
    pub fn try_recv(&mut self) -> Option<EventRecord> {
        if let Some(record) = self.backlog.pop_front() {
            return Some(record);
        }
        loop {
            match self.rx.try_recv() {
                Ok(record) => return Some(record),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged, skipping ahead");
                }
                Err(_) => return None,
            }
        }
    }

    /// Everything currently ready, without waiting.
    pub fn drain(&mut self) -> Vec<EventRecord> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn into_stream(mut self) -> impl Stream<Item = EventRecord> {
        async_stream::stream! {
            while let Some(record) = self.recv().await {
                yield record;
            }
        }
    }

    pub fn unsubscribe(self) {}
}
