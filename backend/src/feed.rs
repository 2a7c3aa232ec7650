//! In-process change notifications for the election tables.
//!
//! Every mutation that goes through [`Election`](crate::election::Election)
//! publishes one [`ChangeEvent`] after the store has confirmed it. Listeners
//! hold a [`Subscription`], which unregisters itself when dropped.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Schools,
    Candidates,
    Votes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// The subscriber fell behind and missed events; reload everything it tracks.
    Resync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind) -> Self {
        Self { table, kind }
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
    subscribers: Arc<AtomicUsize>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(FEED_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn publish(&self, event: ChangeEvent) {
        // No receivers is fine: nobody is watching yet.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self, tables: &[Table]) -> Subscription {
        let count = self.subscribers.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Change feed subscriber added for {:?} ({} active)", tables, count);

        Subscription {
            rx: self.tx.subscribe(),
            tables: tables.to_vec(),
            pending: VecDeque::new(),
            subscribers: self.subscribers.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }
}

pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
    tables: Vec<Table>,
    pending: VecDeque<ChangeEvent>,
    subscribers: Arc<AtomicUsize>,
}

impl Subscription {
    /// Next event for one of the subscribed tables, or `None` once the feed is gone.
    /// After a lag every subscribed table gets its own `Resync`.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        loop {
            match self.rx.recv().await {
                Ok(event) if self.tables.contains(&event.table) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    warn!("Change feed subscriber lagged by {} events", missed);
                    self.pending.extend(
                        self.tables
                            .iter()
                            .map(|&table| ChangeEvent::new(table, ChangeKind::Resync)),
                    );
                    return self.pending.pop_front();
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let remaining = self.subscribers.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!("Change feed subscriber for {:?} released ({} active)", self.tables, remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_only_subscribed_tables() {
        let feed = ChangeFeed::default();
        let mut votes = feed.subscribe(&[Table::Votes]);

        feed.publish(ChangeEvent::new(Table::Schools, ChangeKind::Update));
        feed.publish(ChangeEvent::new(Table::Votes, ChangeKind::Insert));

        assert_eq!(
            votes.next().await,
            Some(ChangeEvent::new(Table::Votes, ChangeKind::Insert))
        );
    }

    #[tokio::test]
    async fn dropping_a_subscription_unregisters_it() {
        let feed = ChangeFeed::default();
        assert_eq!(feed.subscriber_count(), 0);

        let first = feed.subscribe(&[Table::Votes]);
        {
            let _second = feed.subscribe(&[Table::Candidates]);
            assert_eq!(feed.subscriber_count(), 2);
        }
        assert_eq!(feed.subscriber_count(), 1);

        drop(first);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_resync() {
        let feed = ChangeFeed::new(2);
        let mut sub = feed.subscribe(&[Table::Candidates, Table::Votes]);

        for _ in 0..5 {
            feed.publish(ChangeEvent::new(Table::Votes, ChangeKind::Insert));
        }

        assert_eq!(
            sub.next().await,
            Some(ChangeEvent::new(Table::Candidates, ChangeKind::Resync))
        );
        assert_eq!(
            sub.next().await,
            Some(ChangeEvent::new(Table::Votes, ChangeKind::Resync))
        );
        assert_eq!(
            sub.next().await,
            Some(ChangeEvent::new(Table::Votes, ChangeKind::Insert))
        );
    }

    #[tokio::test]
    async fn ends_when_feed_is_dropped() {
        let feed = ChangeFeed::default();
        let mut sub = feed.subscribe(&[Table::Votes]);
        drop(feed);
        assert_eq!(sub.next().await, None);
    }
}
