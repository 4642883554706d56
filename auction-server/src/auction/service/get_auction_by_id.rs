use {
    super::Service,
    crate::{
        api::RestError,
        auction::entities::Auction,
    },
    auction_api_types::AuctionId,
};

impl Service {
    pub async fn get_auction_by_id(&self, auction_id: AuctionId) -> Result<Auction, RestError> {
        self.repo
            .get_auction(auction_id)
            .await
            .map_err(|err| {
                tracing::error!(auction_id = %auction_id, error = ?err, "Failed to fetch auction");
                RestError::TemporarilyUnavailable
            })?
            .ok_or(RestError::AuctionNotFound)
    }
}
