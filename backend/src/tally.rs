use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::{Mutex, watch};

use crate::error::StoreError;
use crate::models::{Candidate, CandidateResult};
use crate::store::ElectionStore;

/// Per-candidate vote counts. Always a full reduction over the vote rows;
/// never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    counts: BTreeMap<i32, u64>,
    total: u64,
}

impl Tally {
    /// Counts `votes` (candidate ids) for the `visible` candidates. Every
    /// visible candidate gets an entry; votes for anyone else are ignored.
    pub fn count(visible: &[i32], votes: &[i32]) -> Self {
        let mut counts: BTreeMap<i32, u64> = visible.iter().map(|&id| (id, 0)).collect();
        let mut total = 0;

        for candidate_id in votes {
            if let Some(count) = counts.get_mut(candidate_id) {
                *count += 1;
                total += 1;
            }
        }

        Self { counts, total }
    }

    pub fn votes_for(&self, candidate_id: i32) -> u64 {
        self.counts.get(&candidate_id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn percentage(&self, candidate_id: i32) -> u32 {
        percentage(self.votes_for(candidate_id), self.total)
    }

    pub fn results(&self, candidates: &[Candidate]) -> Vec<CandidateResult> {
        candidates
            .iter()
            .map(|c| CandidateResult {
                candidate_id: c.id,
                name: c.name.clone(),
                candidate_number: c.candidate_number,
                votes: self.votes_for(c.id),
                percentage: self.percentage(c.id),
            })
            .collect()
    }
}

/// `round(count / total * 100)`, and 0 for an empty election.
pub fn percentage(count: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (count as f64 / total as f64 * 100.0).round() as u32
}

/// Holds the latest [`Tally`] and lets any number of watchers observe it.
pub struct Aggregator {
    tx: watch::Sender<Tally>,
    refresh: Mutex<()>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Tally::default());
        Self {
            tx,
            refresh: Mutex::new(()),
        }
    }

    /// Recomputes the tally from every stored vote. Watchers are only woken
    /// when the result differs from the previous one.
    ///
    /// Refreshes run one at a time from read to publish, so a recount that
    /// started earlier can never replace one that read newer rows.
    pub async fn refresh_tally(&self, store: &dyn ElectionStore) -> Result<Tally, StoreError> {
        let _running = self.refresh.lock().await;
        let visible: Vec<i32> = store.candidates().await?.iter().map(|c| c.id).collect();
        let votes = store.vote_candidate_ids().await?;
        let tally = Tally::count(&visible, &votes);

        self.tx.send_if_modified(|current| {
            if *current == tally {
                false
            } else {
                *current = tally.clone();
                true
            }
        });

        Ok(tally)
    }

    pub fn current(&self) -> Tally {
        self.tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Tally> {
        self.tx.subscribe()
    }
}
