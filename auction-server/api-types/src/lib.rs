use {
    serde::{
        de,
        Deserialize,
        Deserializer,
        Serialize,
        Serializer,
    },
    std::{
        fmt,
        ops::Add,
        str::FromStr,
    },
    uuid::Uuid,
};

pub mod ws;

pub type AuctionId = Uuid;
pub type UserId = String;
pub type UnixTimestamp = i64;

/// A monetary amount with two fractional digits, stored as a scaled integer
/// to keep the increment check free of rounding drift. The wire format is a
/// decimal string, e.g. "55.00".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AmountParseError {
    #[error("empty amount")]
    Empty,
    #[error("invalid amount: {0}")]
    Invalid(String),
    #[error("amount out of range: {0}")]
    OutOfRange(String),
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_cents(cents: i64) -> Self {
        Amount(cents)
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, other: Amount) -> Amount {
        Amount(self.0 + other.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountParseError::Empty);
        }
        let (sign, digits) = match s.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, s),
        };
        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(AmountParseError::Invalid(s.to_string()));
        }
        if fraction.len() > 2
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(AmountParseError::Invalid(s.to_string()));
        }
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| AmountParseError::OutOfRange(s.to_string()))?
        };
        let cents_fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().expect("checked ascii digits") * 10,
            _ => fraction.parse::<i64>().expect("checked ascii digits"),
        };
        whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(cents_fraction))
            .map(|c| Amount(sign * c))
            .ok_or_else(|| AmountParseError::OutOfRange(s.to_string()))
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Amount, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!("55".parse::<Amount>().unwrap(), Amount::from_cents(5500));
        assert_eq!("55.5".parse::<Amount>().unwrap(), Amount::from_cents(5550));
        assert_eq!("55.50".parse::<Amount>().unwrap(), Amount::from_cents(5550));
        assert_eq!("0.05".parse::<Amount>().unwrap(), Amount::from_cents(5));
        assert_eq!(".5".parse::<Amount>().unwrap(), Amount::from_cents(50));
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert!("".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
        assert!("1.234".parse::<Amount>().is_err());
        assert!("1,50".parse::<Amount>().is_err());
        assert!(".".parse::<Amount>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for cents in [0, 5, 50, 5500, 5555, 123456789] {
            let amount = Amount::from_cents(cents);
            assert_eq!(
                amount.to_string().parse::<Amount>().unwrap(),
                amount,
                "round trip failed for {} cents",
                cents
            );
        }
        assert_eq!(Amount::from_cents(5500).to_string(), "55.00");
        assert_eq!(Amount::from_cents(-5).to_string(), "-0.05");
    }

    #[test]
    fn serde_uses_decimal_strings() {
        let amount = Amount::from_cents(10450);
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"104.50\"");
        let parsed: Amount = serde_json::from_str("\"104.50\"").unwrap();
        assert_eq!(parsed, amount);
    }
}
