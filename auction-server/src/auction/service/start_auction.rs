use {
    super::Service,
    crate::auction::entities::AuctionStatus,
    auction_api_types::AuctionId,
    time::OffsetDateTime,
};

impl Service {
    /// Transition `Pending -> Active`. Leader-only; on any other durable
    /// status this is a no-op, which makes re-runs after a failover safe:
    /// a half-applied start (durable row updated, cache write lost) is
    /// completed by syncing the cache to the durable status.
    #[tracing::instrument(skip_all, fields(auction_id = %auction_id))]
    pub async fn start_auction(&self, auction_id: AuctionId) -> anyhow::Result<()> {
        if !self.election.is_leader().await {
            return Ok(());
        }
        tracing::info!("Starting auction");

        let changed = self
            .repo
            .update_auction_status(
                auction_id,
                vec![AuctionStatus::Pending],
                AuctionStatus::Active,
                OffsetDateTime::now_utc(),
            )
            .await?;

        if changed {
            self.status_cache.set(auction_id, AuctionStatus::Active).await;
        } else if let Some(auction) = self.repo.get_auction(auction_id).await? {
            if auction.status == AuctionStatus::Active {
                self.status_cache.set(auction_id, AuctionStatus::Active).await;
            }
        }
        Ok(())
    }
}
