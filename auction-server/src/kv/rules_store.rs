use {
    super::Kv,
    crate::bid::entities::ValidationRules,
};

pub const RULES_KEY: &str = "bid_validation_rules";

/// Loader for the process-wide validation rules document. Seeds the default
/// bracket table when the key is absent so every instance converges on the
/// same rules.
#[derive(Clone)]
pub struct RuleStore {
    kv: Kv,
}

impl RuleStore {
    pub fn new(kv: Kv) -> Self {
        Self { kv }
    }

    pub async fn load_or_seed(&self) -> anyhow::Result<ValidationRules> {
        match self.kv.get_string(RULES_KEY).await {
            Some(json) => ValidationRules::from_json(&json),
            None => {
                let rules = ValidationRules::default();
                self.kv.set_string(RULES_KEY, rules.to_json()).await;
                Ok(rules)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeds_defaults_when_absent() {
        let kv = Kv::new();
        let store = RuleStore::new(kv.clone());
        let rules = store.load_or_seed().await.unwrap();
        assert_eq!(rules, ValidationRules::default());
        assert!(kv.get_string(RULES_KEY).await.is_some());
    }

    #[tokio::test]
    async fn loads_an_existing_document() {
        let kv = Kv::new();
        kv.set_string(RULES_KEY, r#"{"rules":{"0-10":1,"10+":2}}"#.to_string())
            .await;
        let rules = RuleStore::new(kv).load_or_seed().await.unwrap();
        assert_ne!(rules, ValidationRules::default());
    }

    #[tokio::test]
    async fn surfaces_corrupt_documents_as_errors() {
        let kv = Kv::new();
        kv.set_string(RULES_KEY, "not json".to_string()).await;
        assert!(RuleStore::new(kv).load_or_seed().await.is_err());
    }
}
