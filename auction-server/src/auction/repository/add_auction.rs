use {
    super::Repository,
    crate::auction::entities,
};

impl Repository {
    #[tracing::instrument(skip_all, fields(auction_id = %auction.id))]
    pub async fn add_auction(&self, auction: &entities::Auction) -> anyhow::Result<bool> {
        self.db.add_auction(auction).await
    }
}
