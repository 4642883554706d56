use {
    crate::bid::entities::BidState,
    auction_api_types::AuctionId,
    std::{
        collections::HashMap,
        sync::Arc,
    },
    tokio::sync::RwLock,
};

mod add_bid_event;
mod apply_accepted_bid;
mod get_in_memory_bid_state;
mod models;
mod remove_in_memory_bid_state;
mod set_in_memory_bid_state;

pub use models::*;

/// Advisory, per-process projection of the authoritative bid state in the
/// coordination store. Populated lazily on session admission and bid
/// evaluation, overwritten by the event listener, evicted on terminal
/// events. Readers must tolerate staleness.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    pub bid_states: RwLock<HashMap<AuctionId, BidState>>,
}

pub struct Repository {
    pub in_memory_store: InMemoryStore,
    pub db:              Arc<dyn Database>,
}

impl Repository {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            in_memory_store: InMemoryStore::default(),
            db,
        }
    }
}
