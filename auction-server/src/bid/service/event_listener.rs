use {
    super::Service,
    crate::{
        bid::entities::{
            BidEvent,
            BidEventType,
        },
        server::{
            EXIT_CHECK_INTERVAL,
            SHOULD_EXIT,
        },
    },
    anyhow::anyhow,
    auction_api_types::ws::{
        RejectReason,
        ServerMessage,
    },
    std::sync::atomic::Ordering,
    tokio::sync::broadcast::error::RecvError,
};

impl Service {
    /// Per-instance subscriber on the shared event channel. Applies events
    /// in receive order: shadow cache first, then session fan-out. Parse
    /// failures are logged and dropped; the loop never fails closed.
    pub async fn run_event_listener(&self) -> anyhow::Result<()> {
        tracing::info!("Starting event listener...");
        let mut receiver = self.event_channel.subscribe();
        let mut exit_check_interval = tokio::time::interval(EXIT_CHECK_INTERVAL);

        while !SHOULD_EXIT.load(Ordering::Acquire) {
            tokio::select! {
                message = receiver.recv() => match message {
                    Ok(payload) => match BidEvent::parse_payload(&payload) {
                        Ok(event) => self.handle_event(event).await,
                        Err(err) => {
                            tracing::error!(payload = payload, error = ?err, "Failed to parse event");
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped = skipped, "Event listener lagged behind");
                    }
                    Err(RecvError::Closed) => {
                        return Err(anyhow!("Event channel closed"));
                    }
                },
                _ = exit_check_interval.tick() => {}
            }
        }
        tracing::info!("Shutting down event listener...");
        Ok(())
    }

    pub(crate) async fn handle_event(&self, event: BidEvent) {
        tracing::debug!(
            event_type = %event.event_type,
            auction_id = %event.auction_id,
            "Handling auction event",
        );

        // Single-writer discipline for the append-only history: only the
        // leader instance persists, every instance still fans out.
        if self.election.is_leader().await {
            if let Err(err) = self.repo.add_bid_event(&event).await {
                tracing::error!(error = ?err, "Failed to persist bid event");
            }
        }

        match event.event_type {
            BidEventType::BidAccepted => {
                self.repo
                    .apply_accepted_bid(
                        event.auction_id,
                        event.amount,
                        &event.user_id,
                        event.timestamp,
                    )
                    .await;
                self.registry
                    .broadcast_to_auction(
                        event.auction_id,
                        &ServerMessage::BidUpdate {
                            current_bid:    event.amount,
                            current_winner: event.user_id,
                            timestamp:      event.timestamp,
                        },
                    )
                    .await;
            }
            BidEventType::BidRejected => {
                // The whole channel sees the event; only the bidder's own
                // sessions are told.
                if !event.user_id.is_empty() {
                    self.registry
                        .notify_user(
                            &event.user_id,
                            &ServerMessage::BidRejected {
                                reason:           RejectReason::InsufficientIncrement,
                                status:           None,
                                current_bid:      None,
                                current_winner:   None,
                                required_minimum: None,
                            },
                        )
                        .await;
                }
            }
            BidEventType::AuctionExtended => {
                self.registry
                    .broadcast_to_auction(
                        event.auction_id,
                        &ServerMessage::AuctionExtended {
                            timestamp: event.timestamp,
                        },
                    )
                    .await;
            }
            BidEventType::AuctionEnded => {
                self.repo.remove_in_memory_bid_state(event.auction_id).await;
                self.registry
                    .broadcast_to_auction(
                        event.auction_id,
                        &ServerMessage::AuctionEnded {
                            timestamp: event.timestamp,
                        },
                    )
                    .await;
                self.registry.close_auction(event.auction_id).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            api::ws::SessionEvent,
            auction::repository::MockDatabase as MockAuctionDatabase,
            bid::{
                entities::BidState,
                repository::MockDatabase as MockBidDatabase,
                service::tests::new_with_mocks,
            },
            scheduler,
        },
        auction_api_types::{
            Amount,
            AuctionId,
        },
        uuid::Uuid,
    };

    fn dollars(units: i64) -> Amount {
        Amount::from_cents(units * 100)
    }

    fn accepted(auction_id: AuctionId, user: &str, amount: Amount) -> BidEvent {
        BidEvent {
            event_type: BidEventType::BidAccepted,
            auction_id,
            user_id: user.to_string(),
            amount,
            timestamp: 1_700_000_000,
        }
    }

    fn harness() -> crate::bid::service::tests::TestHarness {
        new_with_mocks(
            MockAuctionDatabase::new(),
            scheduler::repository::MockDatabase::new(),
            MockBidDatabase::new(),
        )
    }

    #[tokio::test]
    async fn accepted_bids_update_the_shadow_cache_and_broadcast() {
        let auction_id = Uuid::new_v4();
        let h = harness();
        h.service
            .repo
            .set_in_memory_bid_state(
                auction_id,
                BidState {
                    current_bid:    dollars(50),
                    winner_id:      String::new(),
                    increment_rule: dollars(5),
                    last_updated:   0,
                },
            )
            .await;
        let mut u1 = h.registry.register_for_test("u1", auction_id).await;
        let mut u2 = h.registry.register_for_test("u2", auction_id).await;

        h.service
            .handle_event(accepted(auction_id, "u1", dollars(55)))
            .await;

        let state = h
            .service
            .repo
            .get_in_memory_bid_state(auction_id)
            .await
            .unwrap();
        assert_eq!(state.current_bid, dollars(55));
        assert_eq!(state.winner_id, "u1");
        assert_eq!(state.increment_rule, dollars(5));

        for session in [&mut u1, &mut u2] {
            match session.recv().await.unwrap() {
                SessionEvent::Message(ServerMessage::BidUpdate {
                    current_bid,
                    current_winner,
                    ..
                }) => {
                    assert_eq!(current_bid, dollars(55));
                    assert_eq!(current_winner, "u1");
                }
                other => panic!("unexpected session event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn rejected_bids_notify_only_the_bidder() {
        let auction_id = Uuid::new_v4();
        let h = harness();
        let mut bidder = h.registry.register_for_test("u1", auction_id).await;
        let mut other = h.registry.register_for_test("u2", auction_id).await;

        h.service
            .handle_event(BidEvent {
                event_type: BidEventType::BidRejected,
                auction_id,
                user_id: "u1".to_string(),
                amount: dollars(58),
                timestamp: 1,
            })
            .await;

        assert!(matches!(
            bidder.recv().await.unwrap(),
            SessionEvent::Message(ServerMessage::BidRejected { .. })
        ));
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn ended_auctions_broadcast_then_close_every_session() {
        let auction_id = Uuid::new_v4();
        let h = harness();
        h.service
            .repo
            .set_in_memory_bid_state(
                auction_id,
                BidState {
                    current_bid:    dollars(60),
                    winner_id:      "u2".to_string(),
                    increment_rule: dollars(5),
                    last_updated:   0,
                },
            )
            .await;
        let mut u1 = h.registry.register_for_test("u1", auction_id).await;
        let mut u2 = h.registry.register_for_test("u2", auction_id).await;

        h.service
            .handle_event(BidEvent::lifecycle(
                BidEventType::AuctionEnded,
                auction_id,
                1_700_000_000,
            ))
            .await;

        assert!(h
            .service
            .repo
            .get_in_memory_bid_state(auction_id)
            .await
            .is_none());
        for session in [&mut u1, &mut u2] {
            assert!(matches!(
                session.recv().await.unwrap(),
                SessionEvent::Message(ServerMessage::AuctionEnded { .. })
            ));
            assert!(matches!(
                session.recv().await.unwrap(),
                SessionEvent::Close
            ));
        }
        assert!(h.registry.is_empty_for_auction(auction_id).await);
    }

    #[tokio::test]
    async fn leader_instances_persist_the_event_history() {
        let auction_id = Uuid::new_v4();
        let mut bid_db = MockBidDatabase::new();
        bid_db
            .expect_add_bid_event()
            .withf(move |event| {
                event.auction_id == auction_id && event.event_type == BidEventType::BidAccepted
            })
            .times(1)
            .returning(|_| Ok(()));
        let h = new_with_mocks(
            MockAuctionDatabase::new(),
            scheduler::repository::MockDatabase::new(),
            bid_db,
        );
        assert!(h.election.try_claim().await);

        h.service
            .handle_event(accepted(auction_id, "u1", dollars(55)))
            .await;
    }

    #[tokio::test]
    async fn followers_do_not_write_history() {
        let mut bid_db = MockBidDatabase::new();
        bid_db.expect_add_bid_event().times(0);
        let h = new_with_mocks(
            MockAuctionDatabase::new(),
            scheduler::repository::MockDatabase::new(),
            bid_db,
        );

        h.service
            .handle_event(accepted(Uuid::new_v4(), "u1", dollars(55)))
            .await;
    }
}
