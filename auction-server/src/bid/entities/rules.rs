use {
    anyhow::Context,
    auction_api_types::Amount,
    serde::{
        Deserialize,
        Serialize,
    },
    std::collections::BTreeMap,
};

/// The minimum-increment table keyed by amount bracket.
///
/// Brackets are half-open (`"0-100"` covers `[0, 100)`) with the last
/// bracket unbounded above (`"500+"`). Loaded once per process and treated
/// as immutable afterwards; the per-auction increment is materialised from
/// this table at auction creation, so edits never affect in-flight auctions.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationRules {
    brackets: Vec<Bracket>,
}

#[derive(Clone, Debug, PartialEq)]
struct Bracket {
    lower:     Amount,
    upper:     Option<Amount>,
    increment: Amount,
}

#[derive(Serialize, Deserialize)]
struct RulesWire {
    rules: BTreeMap<String, f64>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self::from_json(r#"{"rules":{"0-100":5,"100-500":10,"500+":25}}"#)
            .expect("default rules are well formed")
    }
}

impl ValidationRules {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let wire: RulesWire = serde_json::from_str(json).context("invalid rules document")?;
        let mut brackets = Vec::with_capacity(wire.rules.len());
        for (key, increment) in &wire.rules {
            let (lower, upper) = match key.strip_suffix('+') {
                Some(lower) => (parse_bound(lower)?, None),
                None => {
                    let (lower, upper) = key
                        .split_once('-')
                        .with_context(|| format!("invalid bracket {key:?}"))?;
                    (parse_bound(lower)?, Some(parse_bound(upper)?))
                }
            };
            brackets.push(Bracket {
                lower,
                upper,
                increment: Amount::from_cents((increment * 100.0).round() as i64),
            });
        }
        brackets.sort_by_key(|bracket| bracket.lower);
        anyhow::ensure!(!brackets.is_empty(), "rules document has no brackets");
        Ok(Self { brackets })
    }

    pub fn to_json(&self) -> String {
        let rules = self
            .brackets
            .iter()
            .map(|bracket| {
                let key = match bracket.upper {
                    Some(upper) => format!("{}-{}", bracket.lower.cents() / 100, upper.cents() / 100),
                    None => format!("{}+", bracket.lower.cents() / 100),
                };
                (key, bracket.increment.cents() as f64 / 100.0)
            })
            .collect();
        serde_json::to_string(&RulesWire { rules }).expect("rules serialize")
    }

    pub fn increment_for(&self, amount: Amount) -> Amount {
        self.brackets
            .iter()
            .find(|bracket| {
                amount >= bracket.lower && bracket.upper.is_none_or(|upper| amount < upper)
            })
            .unwrap_or(&self.brackets[0])
            .increment
    }

    pub fn minimum_next(&self, amount: Amount) -> Amount {
        amount + self.increment_for(amount)
    }
}

fn parse_bound(s: &str) -> anyhow::Result<Amount> {
    s.parse::<i64>()
        .map(|units| Amount::from_cents(units * 100))
        .with_context(|| format!("invalid bracket bound {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dollars(units: i64) -> Amount {
        Amount::from_cents(units * 100)
    }

    #[test]
    fn default_brackets_match_seeded_table() {
        let rules = ValidationRules::default();
        assert_eq!(rules.increment_for(dollars(0)), dollars(5));
        assert_eq!(rules.increment_for(dollars(99)), dollars(5));
        assert_eq!(rules.increment_for(dollars(100)), dollars(10));
        assert_eq!(rules.increment_for(dollars(499)), dollars(10));
        assert_eq!(rules.increment_for(dollars(500)), dollars(25));
        assert_eq!(rules.increment_for(dollars(10_000)), dollars(25));
    }

    #[test]
    fn minimum_next_uses_the_current_bracket() {
        let rules = ValidationRules::default();
        assert_eq!(rules.minimum_next(dollars(99)), dollars(104));
        assert_eq!(rules.minimum_next(dollars(100)), dollars(110));
        assert_eq!(rules.minimum_next(dollars(500)), dollars(525));
    }

    #[test]
    fn json_round_trips() {
        let rules = ValidationRules::default();
        assert_eq!(ValidationRules::from_json(&rules.to_json()).unwrap(), rules);
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(ValidationRules::from_json("{}").is_err());
        assert!(ValidationRules::from_json(r#"{"rules":{}}"#).is_err());
        assert!(ValidationRules::from_json(r#"{"rules":{"0..100":5}}"#).is_err());
        assert!(ValidationRules::from_json(r#"{"rules":{"a-b":5}}"#).is_err());
    }
}
