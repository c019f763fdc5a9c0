//! Scripted in-memory remote authority shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use ethers::abi::{encode, Token};
use ethers::types::{Bytes, Log, H160, H256, U256, U64};

use flightsurety_oracles::error::RemoteError;
use flightsurety_oracles::models::{
    Address, IndexAssignment, OracleIdentity, OracleIndex, StatusRequestEvent, StatusResponse,
    Wei,
};
use flightsurety_oracles::services::flight_surety::oracle_request_topic;
use flightsurety_oracles::services::remote_authority::RemoteAuthority;

pub const FEE: Wei = Wei(1_000_000_000_000_000_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fail {
    Revert,
    Timeout,
}

impl Fail {
    fn into_error(self) -> RemoteError {
        match self {
            Fail::Revert => RemoteError::Reverted("VM Exception while processing transaction: revert".to_string()),
            Fail::Timeout => RemoteError::Timeout(Duration::from_millis(5)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Fee,
    Register(OracleIdentity),
    Confirm(OracleIdentity),
    Indexes(OracleIdentity),
    Logs(u64, u64),
    Submit(OracleIdentity),
}

pub struct FakeState {
    pub accounts: Vec<OracleIdentity>,
    pub operational: bool,
    pub fee: Result<Wei, Fail>,
    /// Transient fee failures served before `fee` is returned.
    pub fee_timeouts: u32,
    pub assignments: HashMap<OracleIdentity, [u8; 3]>,
    pub register_failures: HashMap<OracleIdentity, Fail>,
    /// Outcome of the receipt wait. The registration itself is already on chain.
    pub receipt_failures: HashMap<OracleIdentity, Fail>,
    pub registered: HashSet<OracleIdentity>,
    pub sent: HashMap<String, OracleIdentity>,
    pub latest_block: u64,
    pub latest_block_failures: u32,
    pub logs: Vec<(u64, Log)>,
    pub submit_failures: HashSet<OracleIdentity>,
    pub submissions: Vec<StatusResponse>,
    pub calls: Vec<Call>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            operational: true,
            fee: Ok(FEE),
            fee_timeouts: 0,
            assignments: HashMap::new(),
            register_failures: HashMap::new(),
            receipt_failures: HashMap::new(),
            registered: HashSet::new(),
            sent: HashMap::new(),
            latest_block: 0,
            latest_block_failures: 0,
            logs: Vec::new(),
            submit_failures: HashSet::new(),
            submissions: Vec::new(),
            calls: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct FakeAuthority {
    state: Mutex<FakeState>,
}

impl FakeAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Oracles `1..=n`, oracle `k` holding the given indexes.
    pub fn with_oracles(assignments: &[(u8, [u8; 3])]) -> Self {
        let fake = Self::new();
        {
            let mut state = fake.state();
            for (n, indexes) in assignments {
                state.accounts.push(oracle(*n));
                state.assignments.insert(oracle(*n), *indexes);
            }
        }
        fake
    }

    pub fn submitted_by(&self) -> Vec<OracleIdentity> {
        let mut oracles: Vec<_> = self.state().submissions.iter().map(|s| s.oracle).collect();
        oracles.sort();
        oracles
    }

    pub fn push_log(&self, block: u64, log: Log) {
        let mut state = self.state();
        state.latest_block = state.latest_block.max(block);
        state.logs.push((block, log));
    }
}

#[async_trait]
impl RemoteAuthority for FakeAuthority {
    async fn accounts(&self) -> Result<Vec<OracleIdentity>, RemoteError> {
        Ok(self.state().accounts.clone())
    }

    async fn is_operational(&self) -> Result<bool, RemoteError> {
        Ok(self.state().operational)
    }

    async fn registration_fee(&self) -> Result<Wei, RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::Fee);
        if state.fee_timeouts > 0 {
            state.fee_timeouts -= 1;
            return Err(Fail::Timeout.into_error());
        }
        state.fee.map_err(Fail::into_error)
    }

    async fn register_oracle(&self, oracle: &OracleIdentity, fee: Wei) -> Result<String, RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::Register(*oracle));
        if let Some(fail) = state.register_failures.get(oracle) {
            return Err(fail.into_error());
        }
        if fee < FEE {
            return Err(Fail::Revert.into_error());
        }
        if !state.registered.insert(*oracle) {
            return Err(RemoteError::Reverted("Oracle already registered".to_string()));
        }
        let tx_hash = format!("0xreg{}", oracle);
        state.sent.insert(tx_hash.clone(), *oracle);
        Ok(tx_hash)
    }

    async fn confirm_transaction(&self, tx_hash: &str) -> Result<(), RemoteError> {
        let mut state = self.state();
        let oracle = state
            .sent
            .get(tx_hash)
            .copied()
            .ok_or_else(|| RemoteError::Decode(format!("unknown transaction {tx_hash}")))?;
        state.calls.push(Call::Confirm(oracle));
        match state.receipt_failures.get(&oracle).copied() {
            Some(Fail::Revert) => {
                state.registered.remove(&oracle);
                Err(Fail::Revert.into_error())
            }
            Some(Fail::Timeout) => Err(Fail::Timeout.into_error()),
            None => Ok(()),
        }
    }

    async fn assigned_indexes(&self, oracle: &OracleIdentity) -> Result<IndexAssignment, RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::Indexes(*oracle));
        if !state.registered.contains(oracle) {
            return Err(RemoteError::Reverted("Not registered as an oracle".to_string()));
        }
        let raw = state
            .assignments
            .get(oracle)
            .copied()
            .ok_or_else(|| RemoteError::Reverted("no indexes".to_string()))?;
        Ok(IndexAssignment::try_from(raw)?)
    }

    async fn latest_block(&self) -> Result<u64, RemoteError> {
        let mut state = self.state();
        if state.latest_block_failures > 0 {
            state.latest_block_failures -= 1;
            return Err(Fail::Timeout.into_error());
        }
        Ok(state.latest_block)
    }

    async fn status_request_logs(&self, from_block: u64, to_block: u64) -> Result<Vec<Log>, RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::Logs(from_block, to_block));
        Ok(state
            .logs
            .iter()
            .filter(|(block, _)| (from_block..=to_block).contains(block))
            .map(|(_, log)| log.clone())
            .collect())
    }

    async fn submit_response(&self, response: &StatusResponse) -> Result<String, RemoteError> {
        let mut state = self.state();
        state.calls.push(Call::Submit(response.oracle));
        if state.submit_failures.contains(&response.oracle) {
            return Err(Fail::Timeout.into_error());
        }
        state.submissions.push(response.clone());
        Ok(format!("0xresp{}", state.submissions.len()))
    }
}

pub fn oracle(n: u8) -> OracleIdentity {
    let mut bytes = [0u8; 20];
    bytes[0] = 0xaa;
    bytes[19] = n;
    OracleIdentity::new(Address::from_bytes(bytes))
}

pub fn airline() -> Address {
    "0xf17f52151ebef6c7334fad080c5704d77216b732".parse().unwrap()
}

pub fn request_event(index: u8) -> StatusRequestEvent {
    StatusRequestEvent {
        index: OracleIndex::new(index),
        airline: airline(),
        flight: "ND1309".to_string(),
        timestamp: 1_600_000_000,
        block_number: Some(1),
        transaction_hash: Some("0xreq".to_string()),
        log_index: Some(0),
    }
}

pub fn request_log(block: u64, index: u8, flight: &str) -> Log {
    let data = encode(&[
        Token::Uint(U256::from(index)),
        Token::Address(H160::from(airline())),
        Token::String(flight.to_string()),
        Token::Uint(U256::from(1_600_000_000u64)),
    ]);
    Log {
        topics: vec![oracle_request_topic()],
        data: Bytes::from(data),
        block_number: Some(U64::from(block)),
        transaction_hash: Some(H256::from_low_u64_be(block)),
        log_index: Some(U256::zero()),
        ..Default::default()
    }
}

pub fn malformed_log(block: u64) -> Log {
    Log {
        topics: vec![oracle_request_topic()],
        data: Bytes::from(vec![0x12, 0x34]),
        block_number: Some(U64::from(block)),
        transaction_hash: Some(H256::from_low_u64_be(block)),
        log_index: Some(U256::zero()),
        ..Default::default()
    }
}
