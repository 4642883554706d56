use std::sync::Arc;

mod add_auction;
mod get_auction;
mod models;
mod update_end_time;
mod update_status;

pub use models::*;

/// Durable store for auction records. All SQL goes through the [`Database`]
/// trait so lifecycle logic can run against a mock in tests.
#[derive(Clone)]
pub struct Repository {
    pub db: Arc<dyn Database>,
}

impl Repository {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}
