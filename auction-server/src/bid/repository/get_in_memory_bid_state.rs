use {
    super::Repository,
    crate::bid::entities::BidState,
    auction_api_types::AuctionId,
};

impl Repository {
    pub async fn get_in_memory_bid_state(&self, auction_id: AuctionId) -> Option<BidState> {
        self.in_memory_store
            .bid_states
            .read()
            .await
            .get(&auction_id)
            .cloned()
    }
}
