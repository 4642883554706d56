use {
    super::Service,
    crate::{
        api::RestError,
        auction::entities::{
            Auction,
            AuctionStatus,
        },
    },
    auction_api_types::{
        Amount,
        AuctionId,
    },
    time::OffsetDateTime,
    uuid::Uuid,
};

pub struct CreateAuctionInput {
    /// Caller-supplied id makes retries idempotent; omitted on first
    /// attempts.
    pub id:           Option<AuctionId>,
    pub start_time:   OffsetDateTime,
    pub end_time:     OffsetDateTime,
    pub starting_bid: Amount,
}

impl Service {
    /// Create a pending auction: durable record, bid state in the
    /// coordination store, cached status, and the start/end jobs. Retried
    /// calls with the same id observe the existing record and re-apply the
    /// remaining side effects, each of which is idempotent.
    #[tracing::instrument(skip_all, fields(auction_id))]
    pub async fn create_auction(&self, input: CreateAuctionInput) -> Result<Auction, RestError> {
        if input.end_time < input.start_time {
            return Err(RestError::BadParameters(
                "end_time precedes start_time".to_string(),
            ));
        }
        if !input.starting_bid.is_positive() {
            return Err(RestError::BadParameters(
                "starting_bid must be positive".to_string(),
            ));
        }

        let now = OffsetDateTime::now_utc();
        let auction = Auction {
            id: input.id.unwrap_or_else(Uuid::new_v4),
            start_time: input.start_time,
            end_time: input.end_time,
            status: AuctionStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tracing::Span::current().record("auction_id", auction.id.to_string());

        let inserted = self.repo.add_auction(&auction).await.map_err(|err| {
            tracing::error!(error = ?err, "Failed to insert auction");
            RestError::TemporarilyUnavailable
        })?;

        let auction = if inserted {
            auction
        } else {
            let existing = self
                .repo
                .get_auction(auction.id)
                .await
                .map_err(|err| {
                    tracing::error!(error = ?err, "Failed to fetch existing auction");
                    RestError::TemporarilyUnavailable
                })?
                .ok_or(RestError::Unknown)?;
            if existing.status != AuctionStatus::Pending {
                // Too late to re-run creation side effects.
                return Ok(existing);
            }
            tracing::info!("Auction already exists, re-applying creation side effects");
            // Supersede whatever jobs the earlier attempt managed to insert.
            self.scheduler
                .cancel_jobs_for_auction(existing.id)
                .await
                .map_err(|err| {
                    tracing::error!(error = ?err, "Failed to cancel stale jobs");
                    RestError::TemporarilyUnavailable
                })?;
            existing
        };

        let increment_rule = self.rules.increment_for(input.starting_bid);
        self.bid_state_cache
            .initialize_auction(
                auction.id,
                input.starting_bid,
                increment_rule,
                now.unix_timestamp(),
            )
            .await;
        self.status_cache
            .set(auction.id, AuctionStatus::Pending)
            .await;

        self.scheduler
            .schedule_auction_start(auction.id, auction.start_time)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, "Failed to schedule auction start");
                RestError::TemporarilyUnavailable
            })?;
        self.scheduler
            .schedule_auction_end(auction.id, auction.end_time)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, "Failed to schedule auction end");
                RestError::TemporarilyUnavailable
            })?;

        tracing::info!("Auction created");
        Ok(auction)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            auction::{
                repository::MockDatabase,
                service::tests::new_with_mocks,
            },
            kv::bid_state::BidStateCache,
            scheduler::{
                self,
                entities::JobType,
            },
        },
    };

    fn dollars(units: i64) -> Amount {
        Amount::from_cents(units * 100)
    }

    fn input(starting_bid: Amount) -> CreateAuctionInput {
        let now = OffsetDateTime::now_utc();
        CreateAuctionInput {
            id: None,
            start_time: now + time::Duration::minutes(1),
            end_time: now + time::Duration::minutes(10),
            starting_bid,
        }
    }

    #[tokio::test]
    async fn creation_persists_and_schedules_both_jobs() {
        let mut auction_db = MockDatabase::new();
        auction_db.expect_add_auction().returning(|_| Ok(true));
        let mut job_db = scheduler::repository::MockDatabase::new();
        job_db
            .expect_add_job()
            .withf(|job| job.job_type == JobType::StartAuction)
            .times(1)
            .returning(|_| Ok(()));
        job_db
            .expect_add_job()
            .withf(|job| job.job_type == JobType::EndAuction)
            .times(1)
            .returning(|_| Ok(()));

        let harness = new_with_mocks(auction_db, job_db);
        let auction = harness
            .service
            .create_auction(input(dollars(50)))
            .await
            .unwrap();
        assert_eq!(auction.status, AuctionStatus::Pending);

        let state = BidStateCache::new(harness.kv.clone())
            .current_state(auction.id)
            .await
            .unwrap();
        assert_eq!(state.current_bid, dollars(50));
        assert_eq!(state.increment_rule, dollars(5));
        assert!(!state.has_winner());
    }

    #[tokio::test]
    async fn rejects_inverted_time_range_and_non_positive_bid() {
        let harness = new_with_mocks(
            MockDatabase::new(),
            scheduler::repository::MockDatabase::new(),
        );
        let now = OffsetDateTime::now_utc();
        let inverted = CreateAuctionInput {
            id: None,
            start_time: now + time::Duration::minutes(10),
            end_time: now,
            starting_bid: dollars(50),
        };
        assert!(matches!(
            harness.service.create_auction(inverted).await,
            Err(RestError::BadParameters(_))
        ));
        assert!(matches!(
            harness.service.create_auction(input(Amount::ZERO)).await,
            Err(RestError::BadParameters(_))
        ));
    }

    #[tokio::test]
    async fn retry_with_same_id_supersedes_stale_jobs() {
        let auction_id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let existing = Auction {
            id: auction_id,
            start_time: now + time::Duration::minutes(1),
            end_time: now + time::Duration::minutes(10),
            status: AuctionStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let mut auction_db = MockDatabase::new();
        auction_db.expect_add_auction().returning(|_| Ok(false));
        let fetched = existing.clone();
        auction_db
            .expect_get_auction()
            .return_once(move |_| Ok(Some(fetched)));
        let mut job_db = scheduler::repository::MockDatabase::new();
        job_db
            .expect_cancel_pending_jobs()
            .times(1)
            .returning(|_, _| Ok(2));
        job_db.expect_add_job().times(2).returning(|_| Ok(()));

        let harness = new_with_mocks(auction_db, job_db);
        let result = harness
            .service
            .create_auction(CreateAuctionInput {
                id:           Some(auction_id),
                start_time:   existing.start_time,
                end_time:     existing.end_time,
                starting_bid: dollars(50),
            })
            .await
            .unwrap();
        assert_eq!(result.id, auction_id);
    }

    #[tokio::test]
    async fn retry_against_started_auction_is_a_pure_no_op() {
        let auction_id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let existing = Auction {
            id: auction_id,
            start_time: now,
            end_time: now + time::Duration::minutes(10),
            status: AuctionStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let mut auction_db = MockDatabase::new();
        auction_db.expect_add_auction().returning(|_| Ok(false));
        let fetched = existing.clone();
        auction_db
            .expect_get_auction()
            .return_once(move |_| Ok(Some(fetched)));
        let mut job_db = scheduler::repository::MockDatabase::new();
        job_db.expect_cancel_pending_jobs().times(0);
        job_db.expect_add_job().times(0);

        let harness = new_with_mocks(auction_db, job_db);
        let result = harness
            .service
            .create_auction(CreateAuctionInput {
                id:           Some(auction_id),
                start_time:   existing.start_time,
                end_time:     existing.end_time,
                starting_bid: dollars(50),
            })
            .await
            .unwrap();
        assert_eq!(result.status, AuctionStatus::Active);
    }
}
