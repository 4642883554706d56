use {
    super::Service,
    crate::bid::entities::{
        BidEvent,
        BidEventType,
    },
    auction_api_types::AuctionId,
    time::OffsetDateTime,
};

impl Service {
    /// Soft close: when the auction would end within the extension window,
    /// push `end_time` out to `now + window`, supersede the end job, arm
    /// the in-process timer and announce the extension. Anything else —
    /// plenty of time left, already past the end, unknown auction — is a
    /// no-op. An extension can only ever move `end_time` forward.
    #[tracing::instrument(skip_all, fields(auction_id = %auction_id))]
    pub async fn check_and_extend_auction(&self, auction_id: AuctionId) -> anyhow::Result<()> {
        if !self.election.is_leader().await {
            return Ok(());
        }
        let Some(auction) = self.repo.get_auction(auction_id).await? else {
            return Ok(());
        };

        let now = OffsetDateTime::now_utc();
        let remaining = auction.end_time - now;
        if remaining <= time::Duration::ZERO || remaining > self.extension_window {
            return Ok(());
        }

        let new_end_time = now + self.extension_window;
        self.repo
            .update_auction_end_time(auction_id, new_end_time, now)
            .await?;
        self.scheduler
            .reschedule_auction_end(auction_id, new_end_time)
            .await?;
        self.set_end_timer(auction_id, self.extension_window.unsigned_abs())
            .await;
        self.event_channel
            .publish(&BidEvent::lifecycle(
                BidEventType::AuctionExtended,
                auction_id,
                now.unix_timestamp(),
            ))
            .await;
        tracing::info!(new_end_time = %new_end_time, "Auction extended");
        Ok(())
    }
}
