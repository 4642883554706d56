use {
    crate::{
        kv::Kv,
        server::SHOULD_EXIT,
    },
    std::sync::{
        atomic::Ordering,
        Arc,
    },
    tokio::time::Duration,
};

pub const LEADER_KEY: &str = "auction_leader";

struct ElectionInner {
    kv:          Kv,
    instance_id: String,
    ttl:         Duration,
}

/// Single-writer election over one TTL'd key in the coordination store.
///
/// Claim is set-if-absent; the holder refreshes with compare-and-refresh
/// every TTL/3 and stops the moment the value no longer matches, so an
/// expired holder cannot resurrect the key once someone else owns it.
/// Leader death is detected by TTL expiry; until then transitions simply
/// stay queued as pending jobs.
#[derive(Clone)]
pub struct Election(Arc<ElectionInner>);

impl Election {
    pub fn new(kv: Kv, instance_id: String, ttl: Duration) -> Self {
        Self(Arc::new(ElectionInner {
            kv,
            instance_id,
            ttl,
        }))
    }

    pub fn instance_id(&self) -> &str {
        &self.0.instance_id
    }

    pub async fn try_claim(&self) -> bool {
        self.0
            .kv
            .set_if_absent_with_ttl(LEADER_KEY, self.0.instance_id.clone(), self.0.ttl)
            .await
    }

    pub async fn is_leader(&self) -> bool {
        self.0.kv.get_string(LEADER_KEY).await.as_deref() == Some(self.0.instance_id.as_str())
    }

    async fn refresh(&self) -> bool {
        self.0
            .kv
            .compare_and_refresh(LEADER_KEY, &self.0.instance_id, self.0.ttl)
            .await
    }

    /// Give up the key, but only if we still hold it.
    pub async fn release(&self) {
        if self.0.kv.compare_and_delete(LEADER_KEY, &self.0.instance_id).await {
            tracing::info!(instance_id = %self.0.instance_id, "Released leadership");
        }
    }

    /// Claim-or-heartbeat loop. Non-holders poll for the claim; the holder
    /// refreshes the TTL. Runs until shutdown, then releases.
    pub async fn run_election_loop(&self) -> anyhow::Result<()> {
        tracing::info!(instance_id = %self.0.instance_id, "Starting leader election...");
        let mut tick = tokio::time::interval(self.0.ttl / 3);
        let mut holder = false;
        while !SHOULD_EXIT.load(Ordering::Acquire) {
            tick.tick().await;
            if holder {
                if !self.refresh().await {
                    tracing::warn!(instance_id = %self.0.instance_id, "Lost leadership");
                    holder = false;
                }
            } else if self.try_claim().await {
                tracing::info!(instance_id = %self.0.instance_id, "Became leader");
                holder = true;
            }
        }
        self.release().await;
        Ok(())
    }
}
