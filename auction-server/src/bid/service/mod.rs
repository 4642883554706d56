use {
    super::repository::Repository,
    crate::{
        api::ws::SessionRegistry,
        auction,
        bid::entities::{
            BidState,
            ValidationRules,
        },
        kv::{
            bid_state::BidStateCache,
            event_channel::EventChannel,
            status::StatusCache,
        },
        leader::Election,
    },
    auction_api_types::AuctionId,
    std::sync::Arc,
    tokio_util::task::TaskTracker,
};

pub mod event_listener;
pub mod place_bid;

pub struct ServiceInner {
    repo:            Repository,
    status_cache:    StatusCache,
    bid_state_cache: BidStateCache,
    event_channel:   EventChannel,
    rules:           Arc<ValidationRules>,
    registry:        Arc<SessionRegistry>,
    lifecycle:       auction::service::Service,
    election:        Election,
    task_tracker:    TaskTracker,
}

/// Front line of the bid path. Deliberately thin: it rejects obviously
/// invalid bids cheaply against the shadow cache and delegates acceptance
/// to the atomic script in the coordination store. It never publishes or
/// broadcasts on its own.
#[derive(Clone)]
pub struct Service(Arc<ServiceInner>);

impl std::ops::Deref for Service {
    type Target = ServiceInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Service {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Repository,
        status_cache: StatusCache,
        bid_state_cache: BidStateCache,
        event_channel: EventChannel,
        rules: Arc<ValidationRules>,
        registry: Arc<SessionRegistry>,
        lifecycle: auction::service::Service,
        election: Election,
        task_tracker: TaskTracker,
    ) -> Self {
        Self(Arc::new(ServiceInner {
            repo,
            status_cache,
            bid_state_cache,
            event_channel,
            rules,
            registry,
            lifecycle,
            election,
            task_tracker,
        }))
    }

    /// Load the shadow entry for an auction, warming it from the
    /// coordination store on a miss. `None` means the auction has no bid
    /// state there either.
    pub async fn warm_shadow_cache(&self, auction_id: AuctionId) -> Option<BidState> {
        if let Some(state) = self.repo.get_in_memory_bid_state(auction_id).await {
            return Some(state);
        }
        let state = self.bid_state_cache.current_state(auction_id).await?;
        self.repo
            .set_in_memory_bid_state(auction_id, state.clone())
            .await;
        Some(state)
    }
}

#[cfg(test)]
pub mod tests {
    use {
        super::*,
        crate::{
            api::ws::SessionRegistry,
            auction::{
                self,
                repository::MockDatabase as MockAuctionDatabase,
            },
            bid::repository::MockDatabase as MockBidDatabase,
            kv::Kv,
            leader::Election,
            scheduler::{
                self,
                Scheduler,
            },
        },
        std::time::Duration,
    };

    pub struct TestHarness {
        pub service:  Service,
        pub registry: Arc<SessionRegistry>,
        pub election: Election,
        pub kv:       Kv,
    }

    /// Full bid stack over mocks: lifecycle manager + evaluator sharing one
    /// fresh coordination store and session registry.
    pub fn new_with_mocks(
        auction_db: MockAuctionDatabase,
        job_db: scheduler::repository::MockDatabase,
        bid_db: MockBidDatabase,
    ) -> TestHarness {
        let kv = Kv::new();
        let registry = Arc::new(SessionRegistry::new());
        let election = Election::new(kv.clone(), "test-instance".to_string(), Duration::from_secs(30));
        let scheduler = Scheduler::new(
            scheduler::repository::Repository::new(Arc::new(job_db)),
            election.clone(),
            Duration::from_secs(1),
        );
        let lifecycle = auction::service::Service::new(
            auction::repository::Repository::new(Arc::new(auction_db)),
            StatusCache::new(kv.clone()),
            BidStateCache::new(kv.clone()),
            EventChannel::new(kv.clone()),
            election.clone(),
            Arc::new(ValidationRules::default()),
            scheduler.clone(),
            Duration::from_secs(30),
        );
        scheduler.set_handler(Arc::new(lifecycle.clone()));
        let service = Service::new(
            Repository::new(Arc::new(bid_db)),
            StatusCache::new(kv.clone()),
            BidStateCache::new(kv.clone()),
            EventChannel::new(kv.clone()),
            Arc::new(ValidationRules::default()),
            registry.clone(),
            lifecycle,
            election.clone(),
            TaskTracker::new(),
        );
        TestHarness {
            service,
            registry,
            election,
            kv,
        }
    }
}
