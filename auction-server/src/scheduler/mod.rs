use {
    crate::{
        leader::Election,
        server::SHOULD_EXIT,
    },
    async_trait::async_trait,
    auction_api_types::AuctionId,
    self::entities::{
        JobType,
        ScheduledJob,
    },
    std::sync::{
        atomic::Ordering,
        Arc,
        OnceLock,
    },
    time::OffsetDateTime,
    tokio::time::Duration,
};

pub mod entities;
pub mod repository;

/// The narrow callback surface the scheduler drives. Implemented by the
/// lifecycle manager; keeping the scheduler on this trait instead of the
/// manager itself breaks the construction cycle between the two.
#[async_trait]
pub trait TransitionHandler: Send + Sync + 'static {
    async fn start_auction(&self, auction_id: AuctionId) -> anyhow::Result<()>;
    async fn end_auction(&self, auction_id: AuctionId) -> anyhow::Result<()>;
}

struct SchedulerInner {
    repo:          repository::Repository,
    election:      Election,
    handler:       OnceLock<Arc<dyn TransitionHandler>>,
    poll_interval: Duration,
}

/// Durable, crash-safe delivery of lifecycle transitions.
///
/// A polling loop picks up pending jobs whose `run_at` has passed and
/// dispatches them through [`TransitionHandler`]. Jobs are marked executed
/// only after the transition succeeds; failures stay pending and retry on
/// the next tick. Ticks are skipped entirely on non-leader instances so a
/// no-op transition can never consume a job.
#[derive(Clone)]
pub struct Scheduler(Arc<SchedulerInner>);

impl Scheduler {
    pub fn new(
        repo: repository::Repository,
        election: Election,
        poll_interval: Duration,
    ) -> Self {
        Self(Arc::new(SchedulerInner {
            repo,
            election,
            handler: OnceLock::new(),
            poll_interval,
        }))
    }

    /// Wire the lifecycle manager in after construction.
    pub fn set_handler(&self, handler: Arc<dyn TransitionHandler>) {
        if self.0.handler.set(handler).is_err() {
            tracing::warn!("Scheduler transition handler was already set");
        }
    }

    fn handler(&self) -> &Arc<dyn TransitionHandler> {
        self.0
            .handler
            .get()
            .expect("scheduler transition handler wired at startup")
    }

    pub async fn schedule_auction_start(
        &self,
        auction_id: AuctionId,
        start_time: OffsetDateTime,
    ) -> anyhow::Result<()> {
        let job = ScheduledJob::new(auction_id, JobType::StartAuction, start_time);
        self.0.repo.db.add_job(&job).await
    }

    pub async fn schedule_auction_end(
        &self,
        auction_id: AuctionId,
        end_time: OffsetDateTime,
    ) -> anyhow::Result<()> {
        let job = ScheduledJob::new(auction_id, JobType::EndAuction, end_time);
        self.0.repo.db.add_job(&job).await
    }

    /// Soft close: cancel the previously authoritative end jobs, then insert
    /// the new one. Start jobs are left untouched.
    #[tracing::instrument(skip_all, fields(auction_id = %auction_id))]
    pub async fn reschedule_auction_end(
        &self,
        auction_id: AuctionId,
        new_end_time: OffsetDateTime,
    ) -> anyhow::Result<()> {
        self.0
            .repo
            .db
            .cancel_pending_jobs(auction_id, Some(JobType::EndAuction))
            .await?;
        self.schedule_auction_end(auction_id, new_end_time).await
    }

    pub async fn cancel_jobs_for_auction(&self, auction_id: AuctionId) -> anyhow::Result<u64> {
        self.0.repo.db.cancel_pending_jobs(auction_id, None).await
    }

    pub async fn run_poll_loop(&self) -> anyhow::Result<()> {
        tracing::info!("Starting scheduler...");
        let mut tick = tokio::time::interval(self.0.poll_interval);
        while !SHOULD_EXIT.load(Ordering::Acquire) {
            tick.tick().await;
            // Only the leader consumes jobs: transitions executed elsewhere
            // would no-op yet still mark the job done.
            if self.0.election.is_leader().await {
                self.process_due_jobs().await;
            }
        }
        tracing::info!("Shutting down scheduler...");
        Ok(())
    }

    pub(crate) async fn process_due_jobs(&self) {
        let jobs = match self.0.repo.db.get_due_jobs(OffsetDateTime::now_utc()).await {
            Ok(jobs) => jobs,
            Err(err) => {
                tracing::error!(error = ?err, "Failed to fetch due jobs");
                return;
            }
        };

        for job in jobs {
            tracing::info!(
                job_id = %job.id,
                job_type = %job.job_type,
                auction_id = %job.auction_id,
                "Processing scheduled job",
            );
            let result = match job.job_type {
                JobType::StartAuction => self.handler().start_auction(job.auction_id).await,
                JobType::EndAuction => self.handler().end_auction(job.auction_id).await,
            };
            match result {
                Ok(()) => {
                    if let Err(err) = self.0.repo.db.mark_executed(job.id).await {
                        tracing::error!(job_id = %job.id, error = ?err, "Failed to mark job executed");
                    }
                }
                Err(err) => {
                    // Leave the job pending; the next tick retries it.
                    tracing::error!(job_id = %job.id, error = ?err, "Failed to execute job");
                }
            }
        }
    }
}
