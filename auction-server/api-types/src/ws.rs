use {
    crate::{
        Amount,
        UnixTimestamp,
        UserId,
    },
    serde::{
        Deserialize,
        Serialize,
    },
};

/// Messages a client may send on an auction session.
///
/// Anything that fails to parse into one of these is answered with
/// [`ServerMessage::Error`]; unknown but well-formed types are ignored.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Place a bid. The amount is a decimal string with at most two
    /// fractional digits, e.g. `"55.00"`.
    PlaceBid { amount: String },
    Ping,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    AuctionNotActive,
    AuctionNotFound,
    InsufficientIncrement,
}

/// Messages the server pushes to an auction session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    BidUpdate {
        current_bid:    Amount,
        current_winner: UserId,
        timestamp:      UnixTimestamp,
    },
    BidRejected {
        reason:           RejectReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        status:           Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_bid:      Option<Amount>,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_winner:   Option<UserId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        required_minimum: Option<Amount>,
    },
    AuctionExtended {
        timestamp: UnixTimestamp,
    },
    AuctionEnded {
        timestamp: UnixTimestamp,
    },
    Pong,
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_bid_wire_format() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"place_bid","amount":"55.00"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::PlaceBid {
                amount: "55.00".to_string(),
            }
        );
    }

    #[test]
    fn rejected_message_omits_empty_fields() {
        let json = serde_json::to_string(&ServerMessage::BidRejected {
            reason:           RejectReason::AuctionNotActive,
            status:           Some("pending".to_string()),
            current_bid:      None,
            current_winner:   None,
            required_minimum: None,
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"type":"bid_rejected","reason":"auction_not_active","status":"pending"}"#
        );
    }

    #[test]
    fn bid_update_round_trips() {
        let msg = ServerMessage::BidUpdate {
            current_bid:    Amount::from_cents(6000),
            current_winner: "u2".to_string(),
            timestamp:      1_700_000_000,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(serde_json::from_str::<ServerMessage>(&json).unwrap(), msg);
    }
}
