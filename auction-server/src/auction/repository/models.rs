#[cfg(test)]
use mockall::automock;
use {
    crate::{
        auction::entities,
        kernel::db::DB,
    },
    anyhow::{
        anyhow,
        Context,
    },
    async_trait::async_trait,
    auction_api_types::AuctionId,
    sqlx::FromRow,
    time::{
        OffsetDateTime,
        PrimitiveDateTime,
        UtcOffset,
    },
};

pub(crate) fn as_primitive(t: OffsetDateTime) -> PrimitiveDateTime {
    let utc = t.to_offset(UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

#[derive(Clone, FromRow, Debug)]
pub struct AuctionRow {
    pub id:         AuctionId,
    pub start_time: PrimitiveDateTime,
    pub end_time:   PrimitiveDateTime,
    pub status:     i32,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

impl AuctionRow {
    pub fn get_auction_entity(&self) -> anyhow::Result<entities::Auction> {
        Ok(entities::Auction {
            id:         self.id,
            start_time: self.start_time.assume_offset(UtcOffset::UTC),
            end_time:   self.end_time.assume_offset(UtcOffset::UTC),
            status:     entities::AuctionStatus::from_i32(self.status)
                .ok_or_else(|| anyhow!("unknown auction status {}", self.status))?,
            created_at: self.created_at.assume_offset(UtcOffset::UTC),
            updated_at: self.updated_at.assume_offset(UtcOffset::UTC),
        })
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Database: Send + Sync + 'static {
    /// Insert a new auction record. Returns false when the id already
    /// exists, which makes creation retries no-ops.
    async fn add_auction(&self, auction: &entities::Auction) -> anyhow::Result<bool>;
    async fn get_auction(
        &self,
        auction_id: AuctionId,
    ) -> anyhow::Result<Option<entities::Auction>>;
    /// Compare-and-set of the status column. Returns whether a row changed,
    /// i.e. whether the auction was in one of `from` at update time.
    async fn update_auction_status(
        &self,
        auction_id: AuctionId,
        from: Vec<entities::AuctionStatus>,
        to: entities::AuctionStatus,
        now: OffsetDateTime,
    ) -> anyhow::Result<bool>;
    async fn update_auction_end_time(
        &self,
        auction_id: AuctionId,
        end_time: OffsetDateTime,
        now: OffsetDateTime,
    ) -> anyhow::Result<()>;
}

#[async_trait]
impl Database for DB {
    async fn add_auction(&self, auction: &entities::Auction) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "INSERT INTO auctions (id, start_time, end_time, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (id) DO NOTHING",
        )
        .bind(auction.id)
        .bind(as_primitive(auction.start_time))
        .bind(as_primitive(auction.end_time))
        .bind(auction.status.as_i32())
        .bind(as_primitive(auction.created_at))
        .bind(as_primitive(auction.updated_at))
        .execute(self)
        .await
        .context("DB: failed to insert auction")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_auction(
        &self,
        auction_id: AuctionId,
    ) -> anyhow::Result<Option<entities::Auction>> {
        let row: Option<AuctionRow> = sqlx::query_as("SELECT * FROM auctions WHERE id = $1")
            .bind(auction_id)
            .fetch_optional(self)
            .await
            .context("DB: failed to fetch auction")?;
        row.map(|row| row.get_auction_entity()).transpose()
    }

    async fn update_auction_status(
        &self,
        auction_id: AuctionId,
        from: Vec<entities::AuctionStatus>,
        to: entities::AuctionStatus,
        now: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let from: Vec<i32> = from.iter().map(entities::AuctionStatus::as_i32).collect();
        let result = sqlx::query(
            "UPDATE auctions SET status = $1, updated_at = $2 \
             WHERE id = $3 AND status = ANY($4)",
        )
        .bind(to.as_i32())
        .bind(as_primitive(now))
        .bind(auction_id)
        .bind(&from)
        .execute(self)
        .await
        .context("DB: failed to update auction status")?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_auction_end_time(
        &self,
        auction_id: AuctionId,
        end_time: OffsetDateTime,
        now: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE auctions SET end_time = $1, updated_at = $2 WHERE id = $3")
            .bind(as_primitive(end_time))
            .bind(as_primitive(now))
            .bind(auction_id)
            .execute(self)
            .await
            .context("DB: failed to update auction end time")?;
        Ok(())
    }
}
