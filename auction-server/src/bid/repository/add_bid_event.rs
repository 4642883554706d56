use {
    super::Repository,
    crate::bid::entities::BidEvent,
};

impl Repository {
    #[tracing::instrument(skip_all, fields(auction_id = %event.auction_id, event_type = %event.event_type))]
    pub async fn add_bid_event(&self, event: &BidEvent) -> anyhow::Result<()> {
        self.db.add_bid_event(event).await
    }
}
