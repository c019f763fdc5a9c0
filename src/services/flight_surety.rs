//! FlightSuretyApp contract binding and `OracleRequest` log decoding

use ethers::abi::RawLog;
use ethers::contract::{abigen, EthEvent, EthLogDecode};
use ethers::types::{Log, U256};

use crate::error::RemoteError;
use crate::models::{OracleIndex, StatusRequestEvent};

abigen!(
    FlightSuretyApp,
    r#"[
        function REGISTRATION_FEE() external view returns (uint256)
        function isOperational() external view returns (bool)
        function registerOracle() external payable
        function getMyIndexes() external view returns (uint8[3])
        function submitOracleResponse(uint8 index, address airline, string flight, uint256 timestamp, uint8 statusCode) external
        event OracleRequest(uint8 index, address airline, string flight, uint256 timestamp)
    ]"#
);

/// `topics[0]` of every `OracleRequest` log.
pub fn oracle_request_topic() -> ethers::types::H256 {
    OracleRequestFilter::signature()
}

/// Decode an `OracleRequest` log into a request event.
///
/// Logs from other events, truncated payloads and timestamps beyond `u64`
/// are reported as decode errors.
pub fn decode_status_request(log: &Log) -> Result<StatusRequestEvent, RemoteError> {
    if log.topics.first() != Some(&oracle_request_topic()) {
        return Err(RemoteError::Decode("log is not an OracleRequest event".to_string()));
    }

    let raw = RawLog {
        topics: log.topics.clone(),
        data: log.data.to_vec(),
    };
    let request = <OracleRequestFilter as EthLogDecode>::decode_log(&raw)
        .map_err(|err| RemoteError::Decode(format!("OracleRequest: {err}")))?;

    let timestamp = u256_to_u64(request.timestamp)
        .ok_or_else(|| RemoteError::Decode(format!("timestamp {} out of range", request.timestamp)))?;

    Ok(StatusRequestEvent {
        index: OracleIndex::new(request.index),
        airline: request.airline.into(),
        flight: request.flight,
        timestamp,
        block_number: log.block_number.map(|block| block.as_u64()),
        transaction_hash: log.transaction_hash.map(|hash| format!("{hash:#x}")),
        log_index: log.log_index.and_then(u256_to_u64),
    })
}

pub fn u256_to_u64(value: U256) -> Option<u64> {
    (value <= U256::from(u64::MAX)).then(|| value.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::{encode, Token};
    use ethers::types::{Bytes, H160, H256, U64};

    const AIRLINE: &str = "f17f52151ebef6c7334fad080c5704d77216b732";

    fn request_log(tokens: &[Token]) -> Log {
        Log {
            topics: vec![oracle_request_topic()],
            data: Bytes::from(encode(tokens)),
            block_number: Some(U64::from(12)),
            transaction_hash: Some(H256::repeat_byte(0xab)),
            log_index: Some(U256::from(3)),
            ..Default::default()
        }
    }

    fn airline() -> H160 {
        AIRLINE.parse().unwrap()
    }

    #[test]
    fn test_topic_matches_event_signature() {
        assert_eq!(
            oracle_request_topic(),
            H256::from(ethers::utils::keccak256(
                "OracleRequest(uint8,address,string,uint256)"
            ))
        );
    }

    #[test]
    fn test_decode_status_request() {
        let log = request_log(&[
            Token::Uint(U256::from(7)),
            Token::Address(airline()),
            Token::String("ND1309".to_string()),
            Token::Uint(U256::from(1_600_000_000u64)),
        ]);

        let event = decode_status_request(&log).unwrap();
        assert_eq!(event.index, OracleIndex::new(7));
        assert_eq!(event.airline.to_string(), format!("0x{AIRLINE}"));
        assert_eq!(event.flight, "ND1309");
        assert_eq!(event.timestamp, 1_600_000_000);
        assert_eq!(event.block_number, Some(12));
        assert_eq!(event.transaction_hash, Some(format!("0x{}", "ab".repeat(32))));
        assert_eq!(event.log_index, Some(3));
    }

    #[test]
    fn test_decode_rejects_malformed_logs() {
        let mut truncated = request_log(&[Token::Uint(U256::from(7))]);
        assert!(matches!(decode_status_request(&truncated), Err(RemoteError::Decode(_))));

        truncated.topics = vec![H256::zero()];
        assert!(matches!(decode_status_request(&truncated), Err(RemoteError::Decode(_))));

        let overflowing = request_log(&[
            Token::Uint(U256::from(7)),
            Token::Address(airline()),
            Token::String("ND1309".to_string()),
            Token::Uint(U256::MAX),
        ]);
        assert!(matches!(decode_status_request(&overflowing), Err(RemoteError::Decode(_))));
    }

    #[test]
    fn test_submit_response_calldata_selector() {
        let call = SubmitOracleResponseCall {
            index: 4,
            airline: airline(),
            flight: "ND1309".to_string(),
            timestamp: U256::from(1_600_000_000u64),
            status_code: 20,
        };
        let calldata = ethers::abi::AbiEncode::encode(call);
        assert_eq!(
            calldata[..4],
            ethers::utils::id("submitOracleResponse(uint8,address,string,uint256,uint8)")
        );
    }
}
