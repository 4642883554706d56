use {
    super::Repository,
    crate::bid::entities::BidState,
    auction_api_types::AuctionId,
};

impl Repository {
    pub async fn set_in_memory_bid_state(&self, auction_id: AuctionId, state: BidState) {
        self.in_memory_store
            .bid_states
            .write()
            .await
            .insert(auction_id, state);
    }
}
