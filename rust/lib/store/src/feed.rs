//! In-process change feed.
//!
//! Every successful table write appends a [`ChangeEvent`] with a
//! monotonically increasing sequence number. Subscribers long-poll with
//! the last sequence they saw and refetch whatever changed.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use labtrack_core::now_rfc3339;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub seq: u64,
    pub table: String,
    pub op: ChangeOp,
    pub id: String,
    pub at: String,
}

/// Result of reading the feed after a given sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeBatch {
    pub events: Vec<ChangeEvent>,
    /// Highest sequence number published so far.
    pub latest: u64,
    /// The requested position is no longer (or not yet) in the buffer;
    /// the subscriber must refetch everything and continue from `latest`.
    #[serde(default)]
    pub resync: bool,
}

struct FeedState {
    latest: u64,
    events: VecDeque<ChangeEvent>,
}

pub struct ChangeFeed {
    state: Mutex<FeedState>,
    capacity: usize,
    notify: Notify,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(FeedState {
                latest: 0,
                events: VecDeque::with_capacity(capacity.min(4096)),
            }),
            capacity: capacity.max(1),
            notify: Notify::new(),
        }
    }

    /// Append an event and wake all long-poll waiters. Returns its sequence.
    pub fn publish(&self, table: &str, op: ChangeOp, id: &str) -> u64 {
        let seq = {
            let mut state = match self.state.lock() {
                Ok(s) => s,
                Err(poisoned) => poisoned.into_inner(),
            };
            state.latest += 1;
            let seq = state.latest;
            if state.events.len() == self.capacity {
                state.events.pop_front();
            }
            state.events.push_back(ChangeEvent {
                seq,
                table: table.to_string(),
                op,
                id: id.to_string(),
                at: now_rfc3339(),
            });
            seq
        };
        tracing::trace!(seq, table, ?op, id, "change published");
        self.notify.notify_waiters();
        seq
    }

    pub fn latest(&self) -> u64 {
        match self.state.lock() {
            Ok(s) => s.latest,
            Err(poisoned) => poisoned.into_inner().latest,
        }
    }

    /// Events with `seq > since`, without waiting.
    pub fn since(&self, since: u64) -> ChangeBatch {
        let state = match self.state.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        let latest = state.latest;
        let oldest = state.events.front().map(|e| e.seq).unwrap_or(latest + 1);

        // A position ahead of the feed belongs to an earlier server run;
        // one behind the buffer has lost events.
        if since > latest || (since < latest && since + 1 < oldest) {
            return ChangeBatch {
                events: Vec::new(),
                latest,
                resync: true,
            };
        }

        ChangeBatch {
            events: state.events.iter().filter(|e| e.seq > since).cloned().collect(),
            latest,
            resync: false,
        }
    }

    /// Long-poll: return as soon as there are events after `since`, or when
    /// `timeout` elapses (possibly with an empty batch).
    pub async fn wait_since(&self, since: u64, timeout: Duration) -> ChangeBatch {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Create the Notified future before reading the buffer so a
            // publish between the read and the select is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);

            let batch = self.since(since);
            if !batch.events.is_empty() || batch.resync {
                return batch;
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => return self.since(since),
            }
        }
    }
}
