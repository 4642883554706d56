use {
    auction_api_types::AuctionId,
    strum::{
        Display,
        EnumString,
    },
    time::OffsetDateTime,
};

/// Auction status. Transitions are strictly `Pending -> Active -> Ended`,
/// or either non-terminal state `-> Cancelled`; terminal states never
/// revert. The integer values are the durable and cached representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AuctionStatus {
    Pending,
    Active,
    Ended,
    Cancelled,
}

impl AuctionStatus {
    pub fn as_i32(&self) -> i32 {
        match self {
            AuctionStatus::Pending => 0,
            AuctionStatus::Active => 1,
            AuctionStatus::Ended => 2,
            AuctionStatus::Cancelled => 3,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(AuctionStatus::Pending),
            1 => Some(AuctionStatus::Active),
            2 => Some(AuctionStatus::Ended),
            3 => Some(AuctionStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AuctionStatus::Ended | AuctionStatus::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Auction {
    pub id:         AuctionId,
    pub start_time: OffsetDateTime,
    pub end_time:   OffsetDateTime,
    pub status:     AuctionStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_integers_round_trip() {
        for status in [
            AuctionStatus::Pending,
            AuctionStatus::Active,
            AuctionStatus::Ended,
            AuctionStatus::Cancelled,
        ] {
            assert_eq!(AuctionStatus::from_i32(status.as_i32()), Some(status));
        }
        assert_eq!(AuctionStatus::from_i32(7), None);
    }

    #[test]
    fn status_names_match_wire_format() {
        assert_eq!(AuctionStatus::Pending.to_string(), "pending");
        assert_eq!("cancelled".parse(), Ok(AuctionStatus::Cancelled));
    }
}
