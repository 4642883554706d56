use {
    super::Kv,
    crate::bid::entities::BidEvent,
    tokio::sync::broadcast,
};

/// The single pub/sub topic every instance subscribes to.
pub const AUCTION_EVENTS_CHANNEL: &str = "auction_events";

/// Publisher/subscriber pair over the shared event channel. Payloads are the
/// colon-delimited wire format of [`BidEvent`]; subscribers receive them in
/// publish order.
#[derive(Clone)]
pub struct EventChannel {
    kv: Kv,
}

impl EventChannel {
    pub fn new(kv: Kv) -> Self {
        Self { kv }
    }

    pub async fn publish(&self, event: &BidEvent) {
        self.kv
            .publish(AUCTION_EVENTS_CHANNEL, event.to_payload())
            .await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.kv.subscribe(AUCTION_EVENTS_CHANNEL)
    }
}
