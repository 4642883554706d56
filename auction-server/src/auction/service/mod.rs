use {
    super::repository::Repository,
    crate::{
        bid::entities::ValidationRules,
        kv::{
            bid_state::BidStateCache,
            event_channel::EventChannel,
            status::StatusCache,
        },
        leader::Election,
        scheduler::{
            Scheduler,
            TransitionHandler,
        },
    },
    async_trait::async_trait,
    auction_api_types::AuctionId,
    std::{
        collections::HashMap,
        sync::Arc,
        time::Duration,
    },
    tokio::{
        sync::Mutex,
        task::JoinHandle,
    },
};

pub mod cancel_auction;
pub mod check_and_extend;
pub mod create_auction;
pub mod end_auction;
pub mod get_auction_by_id;
pub mod start_auction;

pub struct ServiceInner {
    repo:             Repository,
    status_cache:     StatusCache,
    bid_state_cache:  BidStateCache,
    event_channel:    EventChannel,
    election:         Election,
    rules:            Arc<ValidationRules>,
    scheduler:        Scheduler,
    /// In-process soft-close timers, one per auction at most. Armed on
    /// extension, cancelled on terminal transitions.
    end_timers:       Mutex<HashMap<AuctionId, JoinHandle<()>>>,
    extension_window: time::Duration,
}

/// The lifecycle manager: owns status transitions and soft-close extension.
/// Transition operations are gated on leadership; non-leader calls are
/// successful no-ops, so any instance may invoke them blindly.
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
        election: Election,
        rules: Arc<ValidationRules>,
        scheduler: Scheduler,
        extension_window: Duration,
    ) -> Self {
        Self(Arc::new(ServiceInner {
            repo,
            status_cache,
            bid_state_cache,
            event_channel,
            election,
            rules,
            scheduler,
            end_timers: Mutex::new(HashMap::new()),
            extension_window: time::Duration::try_from(extension_window)
                .expect("extension window fits a time duration"),
        }))
    }

    pub(crate) async fn set_end_timer(&self, auction_id: AuctionId, after: Duration) {
        let service = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Err(err) = service.end_auction(auction_id).await {
                tracing::error!(auction_id = %auction_id, error = ?err, "End timer failed");
            }
        });
        if let Some(previous) = self.end_timers.lock().await.insert(auction_id, handle) {
            previous.abort();
        }
    }

    pub(crate) async fn cancel_end_timer(&self, auction_id: AuctionId) {
        if let Some(handle) = self.end_timers.lock().await.remove(&auction_id) {
            handle.abort();
        }
    }
}

#[async_trait]
impl TransitionHandler for Service {
    async fn start_auction(&self, auction_id: AuctionId) -> anyhow::Result<()> {
        Service::start_auction(self, auction_id).await
    }

    async fn end_auction(&self, auction_id: AuctionId) -> anyhow::Result<()> {
        Service::end_auction(self, auction_id).await
    }
}

#[cfg(test)]
pub mod tests {
    use {
        super::*,
        crate::{
            auction::repository::{
                self,
                MockDatabase,
            },
            kv::Kv,
            scheduler,
        },
    };

    pub struct TestHarness {
        pub service:  Service,
        pub election: Election,
        pub kv:       Kv,
    }

    /// Lifecycle service over mock databases and a fresh coordination
    /// store. Tests claim leadership through `election` when they need
    /// transitions to take effect.
    pub fn new_with_mocks(
        auction_db: MockDatabase,
        job_db: scheduler::repository::MockDatabase,
    ) -> TestHarness {
        let kv = Kv::new();
        let election = Election::new(kv.clone(), "test-instance".to_string(), Duration::from_secs(30));
        let scheduler = Scheduler::new(
            scheduler::repository::Repository::new(Arc::new(job_db)),
            election.clone(),
            Duration::from_secs(1),
        );
        let service = Service::new(
            repository::Repository::new(Arc::new(auction_db)),
            StatusCache::new(kv.clone()),
            BidStateCache::new(kv.clone()),
            EventChannel::new(kv.clone()),
            election.clone(),
            Arc::new(ValidationRules::default()),
            scheduler.clone(),
            Duration::from_secs(30),
        );
        scheduler.set_handler(Arc::new(service.clone()));
        TestHarness {
            service,
            election,
            kv,
        }
    }
}
