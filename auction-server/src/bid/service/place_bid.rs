use {
    super::Service,
    crate::{
        auction::entities::AuctionStatus,
        kv::bid_state::{
            BidScriptResult,
            RejectedReason,
        },
    },
    auction_api_types::{
        ws::{
            RejectReason,
            ServerMessage,
        },
        Amount,
        AuctionId,
        UserId,
    },
    time::OffsetDateTime,
};

pub struct PlaceBidInput {
    pub auction_id: AuctionId,
    pub user_id:    UserId,
    pub amount:     Amount,
}

impl Service {
    /// Evaluate one bid. Business rejections are data — they reach the
    /// bidder through a direct session message or the event stream, and
    /// this returns `Ok`. Only infrastructure failures surface as errors.
    #[tracing::instrument(skip_all, fields(
        auction_id = %input.auction_id,
        user_id = %input.user_id,
        amount = %input.amount,
    ))]
    pub async fn place_bid(&self, input: PlaceBidInput) -> anyhow::Result<()> {
        tracing::info!("Placing bid");

        let status = self.status_cache.get(input.auction_id).await;
        if status != AuctionStatus::Active {
            self.registry
                .notify_user(
                    &input.user_id,
                    &ServerMessage::BidRejected {
                        reason:           RejectReason::AuctionNotActive,
                        status:           Some(status.to_string()),
                        current_bid:      None,
                        current_winner:   None,
                        required_minimum: None,
                    },
                )
                .await;
            return Ok(());
        }

        // Cheap local pre-check against the (possibly stale) shadow entry;
        // the script re-validates against the authoritative state.
        if let Some(cached) = self.warm_shadow_cache(input.auction_id).await {
            if input.amount < self.rules.minimum_next(cached.current_bid) {
                self.registry
                    .notify_user(
                        &input.user_id,
                        &ServerMessage::BidRejected {
                            reason:           RejectReason::InsufficientIncrement,
                            status:           None,
                            current_bid:      Some(cached.current_bid),
                            current_winner:   Some(cached.winner_id.clone()),
                            required_minimum: Some(self.rules.minimum_next(cached.current_bid)),
                        },
                    )
                    .await;
                return Ok(());
            }
        }

        let result = self
            .bid_state_cache
            .atomic_bid_update(
                input.auction_id,
                &input.user_id,
                input.amount,
                OffsetDateTime::now_utc().unix_timestamp(),
            )
            .await;

        match result {
            BidScriptResult::Accepted => {
                // Soft-close check is a best-effort follow-up; the accepted
                // bid already stands either way.
                let lifecycle = self.lifecycle.clone();
                let auction_id = input.auction_id;
                self.task_tracker.spawn(async move {
                    if let Err(err) = lifecycle.check_and_extend_auction(auction_id).await {
                        tracing::error!(auction_id = %auction_id, error = ?err, "Soft-close check failed");
                    }
                });
            }
            BidScriptResult::Rejected(RejectedReason::AuctionNotFound) => {
                self.registry
                    .notify_user(
                        &input.user_id,
                        &ServerMessage::BidRejected {
                            reason:           RejectReason::AuctionNotFound,
                            status:           None,
                            current_bid:      None,
                            current_winner:   None,
                            required_minimum: None,
                        },
                    )
                    .await;
            }
            BidScriptResult::Rejected(RejectedReason::InsufficientIncrement) => {
                // The script already published the rejected event; the
                // listener notifies the bidder from there.
            }
        }
        Ok(())
    }
}
