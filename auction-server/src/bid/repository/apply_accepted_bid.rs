use {
    super::Repository,
    auction_api_types::{
        Amount,
        AuctionId,
        UnixTimestamp,
        UserId,
    },
};

impl Repository {
    /// Fold an accepted bid into the shadow entry. A missing entry is left
    /// missing: the next reader warms it from the coordination store with
    /// the full state, increment rule included.
    pub async fn apply_accepted_bid(
        &self,
        auction_id: AuctionId,
        amount: Amount,
        winner_id: &UserId,
        timestamp: UnixTimestamp,
    ) {
        let mut states = self.in_memory_store.bid_states.write().await;
        if let Some(state) = states.get_mut(&auction_id) {
            state.current_bid = amount;
            state.winner_id = winner_id.clone();
            state.last_updated = timestamp;
        }
    }
}
