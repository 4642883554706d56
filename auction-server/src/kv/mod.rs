use {
    std::{
        collections::HashMap,
        sync::{
            Arc,
            Mutex,
        },
        time::Duration,
    },
    tokio::{
        sync::broadcast,
        time::Instant,
    },
};

pub mod bid_state;
pub mod event_channel;
pub mod rules_store;
pub mod status;

const CHANNEL_CAPACITY: usize = 1024;

/// The coordination store: string and hash keys, keys with TTL, pub/sub
/// channels, and atomic scripts.
///
/// Scripts run as a single indivisible step under the store lock; a publish
/// issued from inside a script happens within that step, so subscribers
/// observe events in script execution order. TTLs expire lazily against the
/// tokio clock, which lets tests drive expiry with paused time.
#[derive(Clone)]
pub struct Kv {
    shared: Arc<KvShared>,
}

struct KvShared {
    data:     Mutex<KvData>,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

#[derive(Default)]
pub(crate) struct KvData {
    strings: HashMap<String, StringEntry>,
    hashes:  HashMap<String, HashMap<String, String>>,
}

struct StringEntry {
    value:      String,
    expires_at: Option<Instant>,
}

impl StringEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

impl KvData {
    pub(crate) fn get_string(&mut self, key: &str) -> Option<String> {
        if self.strings.get(key).is_some_and(StringEntry::is_expired) {
            self.strings.remove(key);
        }
        self.strings.get(key).map(|entry| entry.value.clone())
    }

    pub(crate) fn set_string(&mut self, key: &str, value: String) {
        self.strings.insert(
            key.to_string(),
            StringEntry {
                value,
                expires_at: None,
            },
        );
    }

    pub(crate) fn hash_get_all(&self, key: &str) -> Option<HashMap<String, String>> {
        self.hashes.get(key).cloned()
    }

    pub(crate) fn hash_get(&self, key: &str, field: &str) -> Option<String> {
        self.hashes.get(key).and_then(|h| h.get(field).cloned())
    }

    pub(crate) fn hash_set(&mut self, key: &str, fields: &[(&str, String)]) {
        let hash = self.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.to_string(), value.clone());
        }
    }

    pub(crate) fn remove(&mut self, key: &str) {
        self.strings.remove(key);
        self.hashes.remove(key);
    }
}

/// Handle passed to scripts for publishing from inside the critical section.
pub(crate) struct ScriptCtx<'a> {
    kv: &'a Kv,
}

impl ScriptCtx<'_> {
    pub(crate) fn publish(&self, channel: &str, payload: String) {
        self.kv.publish_locked(channel, payload);
    }
}

impl Default for Kv {
    fn default() -> Self {
        Self::new()
    }
}

impl Kv {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(KvShared {
                data:     Mutex::new(KvData::default()),
                channels: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Liveness probe; callers apply their own deadline.
    pub async fn ping(&self) -> anyhow::Result<()> {
        drop(self.shared.data.lock().expect("kv lock poisoned"));
        Ok(())
    }

    /// Run an atomic script against the store. The closure must not block.
    pub(crate) fn script<R>(&self, f: impl FnOnce(&mut KvData, &ScriptCtx) -> R) -> R {
        let mut data = self.shared.data.lock().expect("kv lock poisoned");
        f(&mut data, &ScriptCtx { kv: self })
    }

    pub async fn get_string(&self, key: &str) -> Option<String> {
        self.script(|data, _| data.get_string(key))
    }

    pub async fn set_string(&self, key: &str, value: String) {
        self.script(|data, _| data.set_string(key, value));
    }

    pub async fn hash_get_all(&self, key: &str) -> Option<HashMap<String, String>> {
        self.script(|data, _| data.hash_get_all(key))
    }

    pub async fn hash_set(&self, key: &str, fields: &[(&str, String)]) {
        self.script(|data, _| data.hash_set(key, fields));
    }

    pub async fn remove(&self, key: &str) {
        self.script(|data, _| data.remove(key));
    }

    /// Claim `key` if it is currently absent (or expired), giving it a TTL.
    /// Returns whether the claim succeeded.
    pub async fn set_if_absent_with_ttl(&self, key: &str, value: String, ttl: Duration) -> bool {
        self.script(|data, _| {
            if data.get_string(key).is_some() {
                return false;
            }
            data.strings.insert(
                key.to_string(),
                StringEntry {
                    value,
                    expires_at: Some(Instant::now() + ttl),
                },
            );
            true
        })
    }

    /// Extend the TTL of `key` only if it still holds `expected`.
    pub async fn compare_and_refresh(&self, key: &str, expected: &str, ttl: Duration) -> bool {
        self.script(|data, _| {
            if data.get_string(key).as_deref() != Some(expected) {
                return false;
            }
            if let Some(entry) = data.strings.get_mut(key) {
                entry.expires_at = Some(Instant::now() + ttl);
            }
            true
        })
    }

    /// Delete `key` only if it still holds `expected`.
    pub async fn compare_and_delete(&self, key: &str, expected: &str) -> bool {
        self.script(|data, _| {
            if data.get_string(key).as_deref() != Some(expected) {
                return false;
            }
            data.strings.remove(key);
            true
        })
    }

    pub async fn publish(&self, channel: &str, payload: String) {
        self.publish_locked(channel, payload);
    }

    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        self.sender(channel).subscribe()
    }

    fn publish_locked(&self, channel: &str, payload: String) {
        // A send error only means there is no subscriber right now.
        let _ = self.sender(channel).send(payload);
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.shared
            .channels
            .lock()
            .expect("kv channel lock poisoned")
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_if_absent_claims_once() {
        let kv = Kv::new();
        assert!(
            kv.set_if_absent_with_ttl("lock", "a".to_string(), Duration::from_secs(30))
                .await
        );
        assert!(
            !kv.set_if_absent_with_ttl("lock", "b".to_string(), Duration::from_secs(30))
                .await
        );
        assert_eq!(kv.get_string("lock").await.as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expires_lazily() {
        let kv = Kv::new();
        assert!(
            kv.set_if_absent_with_ttl("lock", "a".to_string(), Duration::from_secs(30))
                .await
        );
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(kv.get_string("lock").await, None);
        assert!(
            kv.set_if_absent_with_ttl("lock", "b".to_string(), Duration::from_secs(30))
                .await
        );
    }

    #[tokio::test(start_paused = true)]
    async fn compare_and_refresh_extends_only_for_holder() {
        let kv = Kv::new();
        kv.set_if_absent_with_ttl("lock", "a".to_string(), Duration::from_secs(30))
            .await;
        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(!kv.compare_and_refresh("lock", "b", Duration::from_secs(30)).await);
        assert!(kv.compare_and_refresh("lock", "a", Duration::from_secs(30)).await);
        tokio::time::advance(Duration::from_secs(20)).await;
        // 40s after claim but only 20s after refresh: still held.
        assert_eq!(kv.get_string("lock").await.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn compare_and_delete_requires_matching_value() {
        let kv = Kv::new();
        kv.set_if_absent_with_ttl("lock", "a".to_string(), Duration::from_secs(30))
            .await;
        assert!(!kv.compare_and_delete("lock", "b").await);
        assert!(kv.compare_and_delete("lock", "a").await);
        assert_eq!(kv.get_string("lock").await, None);
    }

    #[tokio::test]
    async fn publish_preserves_script_order() {
        let kv = Kv::new();
        let mut receiver = kv.subscribe("events");
        for i in 0..10 {
            kv.script(|_, ctx| ctx.publish("events", format!("event-{}", i)));
        }
        for i in 0..10 {
            assert_eq!(receiver.recv().await.unwrap(), format!("event-{}", i));
        }
    }

    #[tokio::test]
    async fn hashes_store_fields() {
        let kv = Kv::new();
        kv.hash_set("h", &[("a", "1".to_string()), ("b", "2".to_string())])
            .await;
        kv.hash_set("h", &[("a", "3".to_string())]).await;
        let all = kv.hash_get_all("h").await.unwrap();
        assert_eq!(all.get("a").map(String::as_str), Some("3"));
        assert_eq!(all.get("b").map(String::as_str), Some("2"));
        kv.remove("h").await;
        assert!(kv.hash_get_all("h").await.is_none());
    }
}
