#[cfg(test)]
use mockall::automock;
use {
    crate::{
        auction::repository::as_primitive,
        bid::entities::BidEvent,
        kernel::db::DB,
    },
    anyhow::Context,
    async_trait::async_trait,
    time::OffsetDateTime,
};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Database: Send + Sync + 'static {
    /// Append to the bid-event history. The table is append-only; rows are
    /// never updated.
    async fn add_bid_event(&self, event: &BidEvent) -> anyhow::Result<()>;
}

#[async_trait]
impl Database for DB {
    async fn add_bid_event(&self, event: &BidEvent) -> anyhow::Result<()> {
        let timestamp = OffsetDateTime::from_unix_timestamp(event.timestamp)
            .context("event timestamp out of range")?;
        sqlx::query(
            "INSERT INTO bid_events (auction_id, user_id, amount, event_type, timestamp, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(event.auction_id)
        .bind(&event.user_id)
        .bind(event.amount.cents())
        .bind(event.event_type.to_string())
        .bind(as_primitive(timestamp))
        .bind(as_primitive(OffsetDateTime::now_utc()))
        .execute(self)
        .await
        .context("DB: failed to insert bid event")?;
        Ok(())
    }
}
