use {
    super::Repository,
    auction_api_types::AuctionId,
};

impl Repository {
    pub async fn remove_in_memory_bid_state(&self, auction_id: AuctionId) {
        self.in_memory_store
            .bid_states
            .write()
            .await
            .remove(&auction_id);
    }
}
