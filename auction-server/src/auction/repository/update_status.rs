use {
    super::Repository,
    crate::auction::entities::AuctionStatus,
    auction_api_types::AuctionId,
    time::OffsetDateTime,
};

impl Repository {
    /// CAS on the durable status column; the returned bool is whether this
    /// call performed the transition. Concurrent or repeated transitions
    /// observe `false` and must treat it as "already done".
    #[tracing::instrument(skip_all, fields(auction_id = %auction_id, to = %to))]
    pub async fn update_auction_status(
        &self,
        auction_id: AuctionId,
        from: Vec<AuctionStatus>,
        to: AuctionStatus,
        now: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        self.db
            .update_auction_status(auction_id, from, to, now)
            .await
    }
}
