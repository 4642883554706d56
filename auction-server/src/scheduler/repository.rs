#[cfg(test)]
use mockall::automock;
use {
    super::entities::{
        JobId,
        JobType,
        ScheduledJob,
    },
    crate::{
        auction::repository::as_primitive,
        kernel::db::DB,
    },
    anyhow::Context,
    async_trait::async_trait,
    auction_api_types::AuctionId,
    sqlx::FromRow,
    std::sync::Arc,
    time::{
        OffsetDateTime,
        PrimitiveDateTime,
        UtcOffset,
    },
};

#[derive(Clone, FromRow, Debug)]
pub struct JobRow {
    pub id:         JobId,
    pub auction_id: AuctionId,
    pub job_type:   String,
    pub run_at:     PrimitiveDateTime,
    pub status:     String,
    pub created_at: PrimitiveDateTime,
}

impl JobRow {
    pub fn get_job_entity(&self) -> anyhow::Result<ScheduledJob> {
        Ok(ScheduledJob {
            id:         self.id,
            auction_id: self.auction_id,
            job_type:   self.job_type.parse().context("unknown job type")?,
            run_at:     self.run_at.assume_offset(UtcOffset::UTC),
            status:     self.status.parse().context("unknown job status")?,
            created_at: self.created_at.assume_offset(UtcOffset::UTC),
        })
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn add_job(&self, job: &ScheduledJob) -> anyhow::Result<()>;
    /// Pending jobs with `run_at <= before`, oldest first.
    async fn get_due_jobs(&self, before: OffsetDateTime) -> anyhow::Result<Vec<ScheduledJob>>;
    /// CAS `pending -> executed`; false when another instance won the race.
    async fn mark_executed(&self, job_id: JobId) -> anyhow::Result<bool>;
    /// Cancel every pending job for the auction, optionally restricted to
    /// one job type. Returns the number of jobs cancelled.
    async fn cancel_pending_jobs(
        &self,
        auction_id: AuctionId,
        job_type: Option<JobType>,
    ) -> anyhow::Result<u64>;
}

#[async_trait]
impl Database for DB {
    async fn add_job(&self, job: &ScheduledJob) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO scheduled_jobs (id, auction_id, job_type, run_at, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(job.id)
        .bind(job.auction_id)
        .bind(job.job_type.to_string())
        .bind(as_primitive(job.run_at))
        .bind(job.status.to_string())
        .bind(as_primitive(job.created_at))
        .execute(self)
        .await
        .context("DB: failed to insert scheduled job")?;
        Ok(())
    }

    async fn get_due_jobs(&self, before: OffsetDateTime) -> anyhow::Result<Vec<ScheduledJob>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            "SELECT * FROM scheduled_jobs WHERE status = 'pending' AND run_at <= $1 \
             ORDER BY run_at ASC",
        )
        .bind(as_primitive(before))
        .fetch_all(self)
        .await
        .context("DB: failed to fetch due jobs")?;
        rows.iter().map(JobRow::get_job_entity).collect()
    }

    async fn mark_executed(&self, job_id: JobId) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE scheduled_jobs SET status = 'executed' WHERE id = $1 AND status = 'pending'",
        )
        .bind(job_id)
        .execute(self)
        .await
        .context("DB: failed to mark job executed")?;
        Ok(result.rows_affected() > 0)
    }

    async fn cancel_pending_jobs(
        &self,
        auction_id: AuctionId,
        job_type: Option<JobType>,
    ) -> anyhow::Result<u64> {
        let result = match job_type {
            Some(job_type) => {
                sqlx::query(
                    "UPDATE scheduled_jobs SET status = 'cancelled' \
                     WHERE auction_id = $1 AND status = 'pending' AND job_type = $2",
                )
                .bind(auction_id)
                .bind(job_type.to_string())
                .execute(self)
                .await
            }
            None => {
                sqlx::query(
                    "UPDATE scheduled_jobs SET status = 'cancelled' \
                     WHERE auction_id = $1 AND status = 'pending'",
                )
                .bind(auction_id)
                .execute(self)
                .await
            }
        }
        .context("DB: failed to cancel pending jobs")?;
        Ok(result.rows_affected())
    }
}

/// Durable store for scheduled jobs, mirroring the auction repository
/// layering: SQL behind the [`Database`] trait, mockable in tests.
#[derive(Clone)]
pub struct Repository {
    pub db: Arc<dyn Database>,
}

impl Repository {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}
