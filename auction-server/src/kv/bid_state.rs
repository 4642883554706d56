use {
    super::{
        event_channel::AUCTION_EVENTS_CHANNEL,
        Kv,
    },
    crate::bid::entities::{
        BidEvent,
        BidEventType,
        BidState,
    },
    auction_api_types::{
        Amount,
        AuctionId,
        UnixTimestamp,
        UserId,
    },
};

fn state_key(auction_id: AuctionId) -> String {
    format!("auction:{auction_id}")
}

/// Default increment applied when the per-auction rule field is missing.
const FALLBACK_INCREMENT: Amount = Amount::from_cents(500);

#[derive(Clone, Debug, PartialEq)]
pub enum BidScriptResult {
    Accepted,
    /// `auction_not_found` (no event published) or `insufficient_increment`
    /// (a rejected event is published).
    Rejected(RejectedReason),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RejectedReason {
    AuctionNotFound,
    InsufficientIncrement,
}

/// Adapter over the per-auction bid state hash at `auction:{id}`.
#[derive(Clone)]
pub struct BidStateCache {
    kv: Kv,
}

impl BidStateCache {
    pub fn new(kv: Kv) -> Self {
        Self { kv }
    }

    pub async fn initialize_auction(
        &self,
        auction_id: AuctionId,
        starting_bid: Amount,
        increment_rule: Amount,
        now: UnixTimestamp,
    ) {
        self.kv
            .hash_set(
                &state_key(auction_id),
                &[
                    ("current_bid", starting_bid.to_string()),
                    ("winner_id", String::new()),
                    ("increment_rule", increment_rule.to_string()),
                    ("last_updated", now.to_string()),
                ],
            )
            .await;
    }

    /// The serialization point for one auction's bids.
    ///
    /// Runs as a single atomic script: loads the current state, decides, and
    /// on a decision also publishes the corresponding event on the shared
    /// channel before any other bid can run. An absent auction publishes
    /// nothing.
    pub async fn atomic_bid_update(
        &self,
        auction_id: AuctionId,
        user_id: &UserId,
        amount: Amount,
        now: UnixTimestamp,
    ) -> BidScriptResult {
        let key = state_key(auction_id);
        self.kv.script(|data, ctx| {
            let Some(current_bid) = data.hash_get(&key, "current_bid") else {
                return BidScriptResult::Rejected(RejectedReason::AuctionNotFound);
            };
            let current: Amount = current_bid.parse().unwrap_or(Amount::ZERO);
            let increment: Amount = data
                .hash_get(&key, "increment_rule")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(FALLBACK_INCREMENT);

            let event_type = if amount >= current + increment {
                data.hash_set(
                    &key,
                    &[
                        ("current_bid", amount.to_string()),
                        ("winner_id", user_id.clone()),
                        ("last_updated", now.to_string()),
                    ],
                );
                BidEventType::BidAccepted
            } else {
                BidEventType::BidRejected
            };

            let event = BidEvent {
                event_type,
                auction_id,
                user_id: user_id.clone(),
                amount,
                timestamp: now,
            };
            ctx.publish(AUCTION_EVENTS_CHANNEL, event.to_payload());

            match event_type {
                BidEventType::BidAccepted => BidScriptResult::Accepted,
                _ => BidScriptResult::Rejected(RejectedReason::InsufficientIncrement),
            }
        })
    }

    /// Warmup read for the evaluator's shadow cache.
    pub async fn current_state(&self, auction_id: AuctionId) -> Option<BidState> {
        let hash = self.kv.hash_get_all(&state_key(auction_id)).await?;
        Some(BidState {
            current_bid:    hash.get("current_bid")?.parse().ok()?,
            winner_id:      hash.get("winner_id").cloned().unwrap_or_default(),
            increment_rule: hash
                .get("increment_rule")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(FALLBACK_INCREMENT),
            last_updated:   hash
                .get("last_updated")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_default(),
        })
    }

    /// Drop the state hash so the script rejects every later bid with
    /// `auction_not_found`, regardless of in-flight racers.
    pub async fn remove_auction(&self, auction_id: AuctionId) {
        self.kv.remove(&state_key(auction_id)).await;
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::kv::event_channel::EventChannel,
        uuid::Uuid,
    };

    fn dollars(units: i64) -> Amount {
        Amount::from_cents(units * 100)
    }

    async fn cache_with_auction(auction_id: AuctionId) -> (Kv, BidStateCache) {
        let kv = Kv::new();
        let cache = BidStateCache::new(kv.clone());
        cache
            .initialize_auction(auction_id, dollars(50), dollars(5), 1_700_000_000)
            .await;
        (kv, cache)
    }

    #[tokio::test]
    async fn accepts_exactly_the_minimum_increment() {
        let auction_id = Uuid::new_v4();
        let (_kv, cache) = cache_with_auction(auction_id).await;
        let result = cache
            .atomic_bid_update(auction_id, &"u1".to_string(), dollars(55), 1)
            .await;
        assert_eq!(result, BidScriptResult::Accepted);
        let state = cache.current_state(auction_id).await.unwrap();
        assert_eq!(state.current_bid, dollars(55));
        assert_eq!(state.winner_id, "u1");
    }

    #[tokio::test]
    async fn rejects_one_cent_below_the_minimum() {
        let auction_id = Uuid::new_v4();
        let (_kv, cache) = cache_with_auction(auction_id).await;
        let result = cache
            .atomic_bid_update(
                auction_id,
                &"u1".to_string(),
                Amount::from_cents(55 * 100 - 1),
                1,
            )
            .await;
        assert_eq!(
            result,
            BidScriptResult::Rejected(RejectedReason::InsufficientIncrement)
        );
        let state = cache.current_state(auction_id).await.unwrap();
        assert_eq!(state.current_bid, dollars(50));
        assert!(!state.has_winner());
    }

    #[tokio::test]
    async fn unknown_auction_rejects_without_publishing() {
        let kv = Kv::new();
        let cache = BidStateCache::new(kv.clone());
        let mut events = EventChannel::new(kv).subscribe();
        let result = cache
            .atomic_bid_update(Uuid::new_v4(), &"u1".to_string(), dollars(10), 1)
            .await;
        assert_eq!(
            result,
            BidScriptResult::Rejected(RejectedReason::AuctionNotFound)
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn publishes_accept_and_reject_events_in_order() {
        let auction_id = Uuid::new_v4();
        let (kv, cache) = cache_with_auction(auction_id).await;
        let mut events = EventChannel::new(kv).subscribe();

        cache
            .atomic_bid_update(auction_id, &"u1".to_string(), dollars(55), 1)
            .await;
        cache
            .atomic_bid_update(auction_id, &"u2".to_string(), dollars(58), 2)
            .await;
        cache
            .atomic_bid_update(auction_id, &"u2".to_string(), dollars(60), 3)
            .await;

        let first = BidEvent::parse_payload(&events.recv().await.unwrap()).unwrap();
        assert_eq!(first.event_type, BidEventType::BidAccepted);
        assert_eq!(first.user_id, "u1");
        let second = BidEvent::parse_payload(&events.recv().await.unwrap()).unwrap();
        assert_eq!(second.event_type, BidEventType::BidRejected);
        assert_eq!(second.amount, dollars(58));
        let third = BidEvent::parse_payload(&events.recv().await.unwrap()).unwrap();
        assert_eq!(third.event_type, BidEventType::BidAccepted);
        assert_eq!(third.user_id, "u2");
    }

    #[tokio::test]
    async fn concurrent_bids_keep_current_bid_strictly_increasing() {
        let auction_id = Uuid::new_v4();
        let (kv, cache) = cache_with_auction(auction_id).await;
        let mut events = EventChannel::new(kv).subscribe();

        let mut tasks = Vec::new();
        for i in 0..50i64 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                cache
                    .atomic_bid_update(
                        auction_id,
                        &format!("u{}", i),
                        dollars(55 + 5 * (i % 10)),
                        i,
                    )
                    .await
            }));
        }
        let mut accepted_count = 0;
        for task in tasks {
            if task.await.unwrap() == BidScriptResult::Accepted {
                accepted_count += 1;
            }
        }
        assert!(accepted_count > 0);

        // Published acceptances must be strictly increasing, each clearing
        // the previous high bid by at least the increment rule.
        let mut current = dollars(50);
        let mut seen = 0;
        while let Ok(payload) = events.try_recv() {
            let event = BidEvent::parse_payload(&payload).unwrap();
            if event.event_type == BidEventType::BidAccepted {
                assert!(event.amount >= current + dollars(5));
                current = event.amount;
                seen += 1;
            }
        }
        assert_eq!(seen, accepted_count);
        let state = cache.current_state(auction_id).await.unwrap();
        assert_eq!(state.current_bid, current);
        assert!(state.has_winner());
    }

    #[tokio::test]
    async fn removed_auction_rejects_all_subsequent_bids() {
        let auction_id = Uuid::new_v4();
        let (_kv, cache) = cache_with_auction(auction_id).await;
        cache.remove_auction(auction_id).await;
        let result = cache
            .atomic_bid_update(auction_id, &"u1".to_string(), dollars(1_000), 1)
            .await;
        assert_eq!(
            result,
            BidScriptResult::Rejected(RejectedReason::AuctionNotFound)
        );
    }
}
