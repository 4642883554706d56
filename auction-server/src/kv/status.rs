use {
    super::Kv,
    crate::auction::entities::AuctionStatus,
    auction_api_types::AuctionId,
};

fn status_key(auction_id: AuctionId) -> String {
    format!("auction:{auction_id}:status")
}

/// Cached projection of the durable auction status, stored as the integer
/// enum at `auction:{id}:status`. A missing key reads as `Pending`, so bids
/// against unknown auctions bounce before reaching the bid script.
#[derive(Clone)]
pub struct StatusCache {
    kv: Kv,
}

impl StatusCache {
    pub fn new(kv: Kv) -> Self {
        Self { kv }
    }

    pub async fn get(&self, auction_id: AuctionId) -> AuctionStatus {
        self.kv
            .get_string(&status_key(auction_id))
            .await
            .and_then(|raw| raw.parse::<i32>().ok())
            .and_then(AuctionStatus::from_i32)
            .unwrap_or(AuctionStatus::Pending)
    }

    pub async fn set(&self, auction_id: AuctionId, status: AuctionStatus) {
        self.kv
            .set_string(&status_key(auction_id), status.as_i32().to_string())
            .await;
    }
}
