use {
    anyhow::{
        anyhow,
        Context,
    },
    auction_api_types::{
        Amount,
        AuctionId,
        UnixTimestamp,
        UserId,
    },
    strum::{
        Display,
        EnumString,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum BidEventType {
    BidAccepted,
    BidRejected,
    AuctionEnded,
    AuctionExtended,
}

/// An event on the shared `auction_events` channel.
///
/// Bid events are produced by the atomic bid script; ended/extended events by
/// the lifecycle manager. `user_id` is empty and `amount` zero for lifecycle
/// events. Events are never mutated after publication.
#[derive(Clone, Debug, PartialEq)]
pub struct BidEvent {
    pub event_type: BidEventType,
    pub auction_id: AuctionId,
    pub user_id:    UserId,
    pub amount:     Amount,
    pub timestamp:  UnixTimestamp,
}

impl BidEvent {
    pub fn lifecycle(event_type: BidEventType, auction_id: AuctionId, now: UnixTimestamp) -> Self {
        Self {
            event_type,
            auction_id,
            user_id: UserId::new(),
            amount: Amount::ZERO,
            timestamp: now,
        }
    }

    /// The channel wire format:
    /// `{auction_id}:{event_type}:{user_id}:{amount}:{unix_ts}`.
    pub fn to_payload(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.auction_id, self.event_type, self.user_id, self.amount, self.timestamp
        )
    }

    pub fn parse_payload(payload: &str) -> anyhow::Result<Self> {
        let parts: Vec<&str> = payload.split(':').collect();
        let [auction_id, event_type, user_id, amount, timestamp] = parts.as_slice() else {
            return Err(anyhow!("expected five fields, got {}", parts.len()));
        };
        Ok(Self {
            auction_id: auction_id.parse().context("invalid auction id")?,
            event_type: event_type.parse().context("invalid event type")?,
            user_id:    user_id.to_string(),
            amount:     amount.parse().context("invalid amount")?,
            timestamp:  timestamp.parse().context("invalid timestamp")?,
        })
    }
}
