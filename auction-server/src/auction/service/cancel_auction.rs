use {
    super::Service,
    crate::auction::entities::AuctionStatus,
    auction_api_types::AuctionId,
    time::OffsetDateTime,
};

impl Service {
    /// Move a non-terminal auction to `Cancelled`: durable CAS, cached
    /// status, pending jobs cancelled in one sweep, timer and bid state
    /// dropped. Terminal auctions are left untouched.
    #[tracing::instrument(skip_all, fields(auction_id = %auction_id))]
    pub async fn cancel_auction(&self, auction_id: AuctionId) -> anyhow::Result<()> {
        if !self.election.is_leader().await {
            return Ok(());
        }

        let changed = self
            .repo
            .update_auction_status(
                auction_id,
                vec![AuctionStatus::Pending, AuctionStatus::Active],
                AuctionStatus::Cancelled,
                OffsetDateTime::now_utc(),
            )
            .await?;
        if !changed {
            return Ok(());
        }
        tracing::info!("Auction cancelled");

        self.status_cache
            .set(auction_id, AuctionStatus::Cancelled)
            .await;
        self.scheduler.cancel_jobs_for_auction(auction_id).await?;
        self.cancel_end_timer(auction_id).await;
        self.bid_state_cache.remove_auction(auction_id).await;
        Ok(())
    }
}
