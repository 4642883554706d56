use auction_api_types::{
    Amount,
    UnixTimestamp,
    UserId,
};

/// Per-auction bidding state. The authoritative copy lives in the
/// coordination store and is mutated only by the atomic bid script; the
/// evaluator keeps an advisory shadow copy of it per process.
#[derive(Clone, Debug, PartialEq)]
pub struct BidState {
    pub current_bid:    Amount,
    /// Empty until the first bid is accepted.
    pub winner_id:      UserId,
    pub increment_rule: Amount,
    pub last_updated:   UnixTimestamp,
}

impl BidState {
    pub fn has_winner(&self) -> bool {
        !self.winner_id.is_empty()
    }
}
