use {
    super::Repository,
    crate::auction::entities,
    auction_api_types::AuctionId,
};

impl Repository {
    #[tracing::instrument(skip_all, fields(auction_id = %auction_id))]
    pub async fn get_auction(
        &self,
        auction_id: AuctionId,
    ) -> anyhow::Result<Option<entities::Auction>> {
        self.db.get_auction(auction_id).await
    }
}
