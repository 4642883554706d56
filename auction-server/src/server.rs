use {
    crate::{
        api::{
            self,
            ws::SessionRegistry,
        },
        auction,
        bid,
        config::RunOptions,
        kv::{
            bid_state::BidStateCache,
            event_channel::EventChannel,
            rules_store::RuleStore,
            status::StatusCache,
        },
        leader::Election,
        metrics_api,
        scheduler::{
            self,
            Scheduler,
        },
    },
    anyhow::{
        anyhow,
        Context,
    },
    futures::Future,
    sqlx::{
        migrate,
        postgres::PgPoolOptions,
    },
    std::sync::{
        atomic::{
            AtomicBool,
            Ordering,
        },
        Arc,
    },
    tokio::{
        signal::unix::{
            signal,
            SignalKind,
        },
        time::{
            sleep,
            timeout,
            Duration,
        },
    },
    tokio_util::task::TaskTracker,
    uuid::Uuid,
};

// A static exit flag to indicate to running threads that we're shutting
// down. This is used to gracefully shut down the application.
pub(crate) static SHOULD_EXIT: AtomicBool = AtomicBool::new(false);
pub const EXIT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

async fn fault_tolerant_handler<F, Fut>(name: String, f: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    Fut::Output: Send + 'static,
{
    loop {
        let res = tokio::spawn(f()).await;
        match res {
            Ok(result) => match result {
                Ok(_) => break, // This will happen on graceful shutdown
                Err(err) => {
                    tracing::error!("{} returned error: {:?}", name, err);
                    sleep(Duration::from_millis(500)).await;
                }
            },
            Err(err) => {
                tracing::error!("{} is panicked or canceled: {:?}", name, err);
                SHOULD_EXIT.store(true, Ordering::Release);
                break;
            }
        }
    }
}

pub async fn start_server(run_options: RunOptions) -> anyhow::Result<()> {
    tokio::spawn(async move {
        tracing::info!("Registered shutdown signal handler...");
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        tracing::info!("Shut down signal received, waiting for tasks...");
        SHOULD_EXIT.store(true, Ordering::Release);
    });

    let pool = PgPoolOptions::new()
        .max_connections(run_options.server.database_max_connections)
        .connect(&run_options.server.database_url)
        .await
        .context("Server should start with a valid database connection")?;
    migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|err| anyhow!("Failed to run migrations: {:?}", err))?;

    let kv = crate::kv::Kv::new();
    timeout(
        Duration::from_secs(run_options.auction.kv_health_timeout_secs),
        kv.ping(),
    )
    .await
    .map_err(|_| anyhow!("Coordination store health probe timed out"))??;

    let rules = Arc::new(RuleStore::new(kv.clone()).load_or_seed().await?);

    let instance_id = run_options
        .auction
        .instance_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    tracing::info!(instance_id = %instance_id, "Using instance id");

    let election = Election::new(
        kv.clone(),
        instance_id,
        Duration::from_secs(run_options.auction.leader_ttl_secs),
    );
    let task_tracker = TaskTracker::new();
    let registry = Arc::new(SessionRegistry::new());

    let scheduler = Scheduler::new(
        scheduler::repository::Repository::new(Arc::new(pool.clone())),
        election.clone(),
        Duration::from_secs(run_options.auction.scheduler_poll_interval_secs),
    );
    let lifecycle = auction::service::Service::new(
        auction::repository::Repository::new(Arc::new(pool.clone())),
        StatusCache::new(kv.clone()),
        BidStateCache::new(kv.clone()),
        EventChannel::new(kv.clone()),
        election.clone(),
        rules.clone(),
        scheduler.clone(),
        Duration::from_secs(run_options.auction.extension_window_secs),
    );
    scheduler.set_handler(Arc::new(lifecycle.clone()));

    let bids = bid::service::Service::new(
        bid::repository::Repository::new(Arc::new(pool.clone())),
        StatusCache::new(kv.clone()),
        BidStateCache::new(kv.clone()),
        EventChannel::new(kv.clone()),
        rules,
        registry.clone(),
        lifecycle.clone(),
        election.clone(),
        task_tracker.clone(),
    );

    let metrics_recorder = metrics_api::setup_metrics_recorder()?;
    let api_state = Arc::new(api::ApiState {
        lifecycle,
        bids: bids.clone(),
        registry,
    });

    tokio::join!(
        fault_tolerant_handler("scheduler poll loop".to_string(), || {
            let scheduler = scheduler.clone();
            async move { scheduler.run_poll_loop().await }
        }),
        fault_tolerant_handler("leader election loop".to_string(), || {
            let election = election.clone();
            async move { election.run_election_loop().await }
        }),
        fault_tolerant_handler("event listener".to_string(), || {
            let bids = bids.clone();
            async move { bids.run_event_listener().await }
        }),
        fault_tolerant_handler("start api".to_string(), || api::start_api(
            run_options.clone(),
            api_state.clone()
        )),
        fault_tolerant_handler("start metrics".to_string(), || {
            metrics_api::start_metrics(run_options.clone(), metrics_recorder.clone())
        }),
    );

    // To make sure all the spawned tasks will finish their job before shut
    // down. Closing the tracker doesn't mean it won't accept new tasks!
    task_tracker.close();
    if timeout(
        Duration::from_secs(run_options.auction.shutdown_timeout_secs),
        task_tracker.wait(),
    )
    .await
    .is_err()
    {
        tracing::warn!("Shutdown budget exhausted before all tasks finished");
    }

    Ok(())
}
