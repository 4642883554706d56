use {
    super::Service,
    crate::{
        auction::entities::AuctionStatus,
        bid::entities::{
            BidEvent,
            BidEventType,
        },
    },
    auction_api_types::AuctionId,
    time::OffsetDateTime,
};

impl Service {
    /// Transition `Active -> Ended`. Leader-only and idempotent: a second
    /// call observes a non-active status and no-ops. The state hash is
    /// removed before the ended event goes out, so a bid racing with the
    /// end is rejected by the script as `auction_not_found` and never
    /// publishes an acceptance.
    #[tracing::instrument(skip_all, fields(auction_id = %auction_id))]
    pub async fn end_auction(&self, auction_id: AuctionId) -> anyhow::Result<()> {
        if !self.election.is_leader().await {
            return Ok(());
        }
        if self.status_cache.get(auction_id).await != AuctionStatus::Active {
            return Ok(());
        }
        tracing::info!("Ending auction");

        let now = OffsetDateTime::now_utc();
        let changed = self
            .repo
            .update_auction_status(
                auction_id,
                vec![AuctionStatus::Active],
                AuctionStatus::Ended,
                now,
            )
            .await?;
        if !changed {
            // Someone else completed the transition; mirror the durable
            // status into the cache and leave their event alone.
            if let Some(auction) = self.repo.get_auction(auction_id).await? {
                self.status_cache.set(auction_id, auction.status).await;
            }
            return Ok(());
        }

        self.status_cache.set(auction_id, AuctionStatus::Ended).await;
        self.cancel_end_timer(auction_id).await;
        self.bid_state_cache.remove_auction(auction_id).await;
        self.event_channel
            .publish(&BidEvent::lifecycle(
                BidEventType::AuctionEnded,
                auction_id,
                now.unix_timestamp(),
            ))
            .await;
        Ok(())
    }
}
