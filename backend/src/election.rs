use std::net::IpAddr;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::feed::{ChangeEvent, ChangeFeed, ChangeKind, Subscription, Table};
use crate::fingerprint::DeviceSignals;
use crate::guard::{self, VoteReceipt, VoteRejection};
use crate::models::{Candidate, CandidateForm, CandidateResult, School, SchoolSettings, VotingWindow};
use crate::network::{AddressSource, PeerAddress};
use crate::session::VoterSession;
use crate::store::ElectionStore;
use crate::tally::{Aggregator, Tally};

/// Shared election context: the store, the loaded school, the live tally
/// and the change feed. Cheap to clone.
#[derive(Clone)]
pub struct Election {
    store: Arc<dyn ElectionStore>,
    address_source: Arc<AddressSource>,
    feed: ChangeFeed,
    aggregator: Arc<Aggregator>,
    school: Arc<RwLock<Option<School>>>,
}

impl Election {
    pub fn new(store: Arc<dyn ElectionStore>, address_source: AddressSource) -> Self {
        Self {
            store,
            address_source: Arc::new(address_source),
            feed: ChangeFeed::default(),
            aggregator: Arc::new(Aggregator::new()),
            school: Arc::new(RwLock::new(None)),
        }
    }

    pub fn store(&self) -> &dyn ElectionStore {
        self.store.as_ref()
    }

    /// Loads the school context and the first tally.
    pub async fn load_context(&self) -> Result<(), StoreError> {
        self.reload_school().await?;
        self.refresh_tally().await?;
        Ok(())
    }

    pub fn school(&self) -> Option<School> {
        self.school
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn reload_school(&self) -> Result<Option<School>, StoreError> {
        let school = self.store.first_school().await?;
        *self.school.write().unwrap_or_else(PoisonError::into_inner) = school.clone();
        Ok(school)
    }

    pub async fn refresh_tally(&self) -> Result<Tally, StoreError> {
        self.aggregator.refresh_tally(self.store.as_ref()).await
    }

    pub fn tally(&self) -> Tally {
        self.aggregator.current()
    }

    pub fn watch_tally(&self) -> watch::Receiver<Tally> {
        self.aggregator.watch()
    }

    pub fn subscribe(&self, tables: &[Table]) -> Subscription {
        self.feed.subscribe(tables)
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub async fn results(&self) -> Result<Vec<CandidateResult>, StoreError> {
        let candidates = self.store.candidates().await?;
        Ok(self.tally().results(&candidates))
    }

    /// Keeps the tally and school context current while the process runs.
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let election = self.clone();
        let mut subscription = self
            .feed
            .subscribe(&[Table::Votes, Table::Candidates, Table::Schools]);

        tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                let result = match (event.table, event.kind) {
                    (_, ChangeKind::Resync) => election.load_context().await,
                    (Table::Schools, _) => election.reload_school().await.map(|_| ()),
                    _ => election.refresh_tally().await.map(|_| ()),
                };
                if let Err(e) = result {
                    error!("Failed to refresh after {:?}: {}", event, e);
                }
            }
            info!("Change feed closed, election listener stopped");
        })
    }

    // -- voters --

    /// Opens and persists a voter session. `has_voted` is taken from the
    /// store; if that lookup fails the session starts as not voted.
    pub async fn start_session(&self, signals: DeviceSignals) -> Result<VoterSession, StoreError> {
        let mut session = VoterSession::new(signals, false);
        session.has_voted = match self.store.fingerprint_has_voted(session.fingerprint()).await {
            Ok(voted) => voted,
            Err(e) => {
                warn!("Error checking vote status: {}", e);
                false
            }
        };
        self.store.create_voter_session(&session.record()).await?;
        info!("Voter session started (already voted: {})", session.has_voted);
        Ok(session)
    }

    pub async fn session(&self, token: &str) -> Result<Option<VoterSession>, StoreError> {
        Ok(self.store.voter_session(token).await?.map(VoterSession::from))
    }

    pub async fn submit_vote(
        &self,
        session: &mut VoterSession,
        candidate_id: i32,
        peer: Option<IpAddr>,
    ) -> Result<VoteReceipt, VoteRejection> {
        let school = self.school();
        let result = match self.address_source.as_ref() {
            AddressSource::Lookup(lookup) => {
                guard::submit_vote(self.store(), lookup, session, school.as_ref(), candidate_id)
                    .await
            }
            AddressSource::Peer => {
                let resolver = PeerAddress(peer);
                guard::submit_vote(self.store(), &resolver, session, school.as_ref(), candidate_id)
                    .await
            }
        };
        if session.has_voted {
            if let Err(e) = self.store.mark_voter_session_voted(&session.token).await {
                error!("Failed to mark session as voted: {}", e);
            }
        }

        if result.is_ok() {
            self.feed
                .publish(ChangeEvent::new(Table::Votes, ChangeKind::Insert));
            if let Err(e) = self.refresh_tally().await {
                error!("Failed to refresh tally after vote: {}", e);
            }
        }

        result
    }

    // -- administration --

    pub async fn update_school(&self, settings: &SchoolSettings) -> Result<School, StoreError> {
        let current = self.current_school().await?;
        let school = self.store.update_school(current.id, settings).await?;
        self.replace_school(school.clone());
        Ok(school)
    }

    pub async fn set_voting_open(&self, open: bool) -> Result<School, StoreError> {
        let current = self.current_school().await?;
        let school = self
            .store
            .set_voting_window(current.id, VotingWindow { is_voting_open: open })
            .await?;
        info!(
            "Voting {} for {}",
            if open { "opened" } else { "closed" },
            school.name
        );
        self.replace_school(school.clone());
        Ok(school)
    }

    pub async fn add_candidate(&self, form: CandidateForm) -> Result<Candidate, StoreError> {
        let school = self.current_school().await?;
        let candidate = self.store.insert_candidate(&form.for_school(school.id)).await?;
        self.feed
            .publish(ChangeEvent::new(Table::Candidates, ChangeKind::Insert));
        self.refresh_tally().await?;
        Ok(candidate)
    }

    pub async fn edit_candidate(
        &self,
        id: i32,
        form: &CandidateForm,
    ) -> Result<Candidate, StoreError> {
        let candidate = self.store.update_candidate(id, form).await?;
        self.feed
            .publish(ChangeEvent::new(Table::Candidates, ChangeKind::Update));
        Ok(candidate)
    }

    pub async fn remove_candidate(&self, id: i32) -> Result<(), StoreError> {
        self.store.delete_candidate(id).await?;
        self.feed
            .publish(ChangeEvent::new(Table::Candidates, ChangeKind::Delete));
        self.feed
            .publish(ChangeEvent::new(Table::Votes, ChangeKind::Delete));
        self.refresh_tally().await?;
        Ok(())
    }

    async fn current_school(&self) -> Result<School, StoreError> {
        match self.school() {
            Some(school) => Ok(school),
            None => self.reload_school().await?.ok_or(StoreError::NotFound),
        }
    }

    fn replace_school(&self, school: School) {
        *self.school.write().unwrap_or_else(PoisonError::into_inner) = Some(school);
        self.feed
            .publish(ChangeEvent::new(Table::Schools, ChangeKind::Update));
    }
}
