use {
    super::Repository,
    auction_api_types::AuctionId,
    time::OffsetDateTime,
};

impl Repository {
    #[tracing::instrument(skip_all, fields(auction_id = %auction_id))]
    pub async fn update_auction_end_time(
        &self,
        auction_id: AuctionId,
        end_time: OffsetDateTime,
        now: OffsetDateTime,
    ) -> anyhow::Result<()> {
        self.db
            .update_auction_end_time(auction_id, end_time, now)
            .await
    }
}
