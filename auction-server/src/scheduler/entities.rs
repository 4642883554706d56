use {
    auction_api_types::AuctionId,
    strum::{
        Display,
        EnumString,
    },
    time::OffsetDateTime,
    uuid::Uuid,
};

pub type JobId = Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum JobType {
    StartAuction,
    EndAuction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Executed,
    Cancelled,
}

/// A durable lifecycle transition scheduled at `run_at`. Several end jobs
/// may exist for one auction over its lifetime (soft close reschedules);
/// only the newest pending one is authoritative, the rest are cancelled.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledJob {
    pub id:         JobId,
    pub auction_id: AuctionId,
    pub job_type:   JobType,
    pub run_at:     OffsetDateTime,
    pub status:     JobStatus,
    pub created_at: OffsetDateTime,
}

impl ScheduledJob {
    pub fn new(auction_id: AuctionId, job_type: JobType, run_at: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            auction_id,
            job_type,
            run_at,
            status: JobStatus::Pending,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}
