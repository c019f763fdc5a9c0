//! The remote authority: the FlightSuretyApp contract reached through a node's JSON-RPC API
//!
//! The node is expected to hold the oracle accounts unlocked, as the local
//! development chain does, so transactions are sent with `eth_sendTransaction`
//! from the oracle's own address.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::contract::{ContractCall, ContractError};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Filter, Log, H160, H256, U256, U64};
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::config::{ContractsConfig, OracleConfig};
use crate::error::RemoteError;
use crate::models::{IndexAssignment, OracleIdentity, StatusResponse, Wei};
use crate::services::flight_surety::{oracle_request_topic, FlightSuretyApp};

const RECEIPT_POLL_INTERVAL_MS: u64 = 250;

type Client = Provider<Http>;

/// Everything this service needs from the contracts.
///
/// Each method is one suspension point; callers treat any error as a failure of
/// that single call.
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Accounts the node can sign for.
    async fn accounts(&self) -> Result<Vec<OracleIdentity>, RemoteError>;

    async fn is_operational(&self) -> Result<bool, RemoteError>;

    async fn registration_fee(&self) -> Result<Wei, RemoteError>;

    /// Send the registration for `oracle`, paying `fee`. Resolves with the
    /// transaction hash once the node accepted it.
    async fn register_oracle(&self, oracle: &OracleIdentity, fee: Wei) -> Result<String, RemoteError>;

    /// Wait until `tx_hash` is mined. A failed receipt is a revert.
    async fn confirm_transaction(&self, tx_hash: &str) -> Result<(), RemoteError>;

    /// Indexes assigned to an already registered oracle.
    async fn assigned_indexes(&self, oracle: &OracleIdentity) -> Result<IndexAssignment, RemoteError>;

    async fn latest_block(&self) -> Result<u64, RemoteError>;

    /// `OracleRequest` logs in the inclusive block range. Logs removed by a
    /// reorg are left out.
    async fn status_request_logs(&self, from_block: u64, to_block: u64) -> Result<Vec<Log>, RemoteError>;

    /// Submit one oracle's response. Resolves once the node accepted the transaction.
    async fn submit_response(&self, response: &StatusResponse) -> Result<String, RemoteError>;
}

pub struct JsonRpcAuthority {
    provider: Arc<Client>,
    app: FlightSuretyApp<Client>,
    app_address: H160,
    call_timeout: Duration,
    receipt_poll_interval: Duration,
    registration_gas: u64,
    response_gas: u64,
}

impl JsonRpcAuthority {
    pub fn new(contracts: &ContractsConfig, oracle: &OracleConfig) -> Result<Self, RemoteError> {
        let http_client = reqwest::Client::builder()
            .timeout(oracle.call_timeout)
            .build()?;
        let provider = Arc::new(Provider::new(Http::new_with_client(
            contracts.rpc_url.clone(),
            http_client,
        )));
        let app_address = H160::from(contracts.app_address);

        Ok(Self {
            app: FlightSuretyApp::new(app_address, provider.clone()),
            provider,
            app_address,
            call_timeout: oracle.call_timeout,
            receipt_poll_interval: Duration::from_millis(RECEIPT_POLL_INTERVAL_MS),
            registration_gas: oracle.registration_gas,
            response_gas: oracle.response_gas,
        })
    }

    pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, RemoteError>>,
    ) -> Result<T, RemoteError> {
        timeout(self.call_timeout, call)
            .await
            .map_err(|_| RemoteError::Timeout(self.call_timeout))?
    }

    async fn send(
        &self,
        call: ContractCall<Client, ()>,
        from: &OracleIdentity,
        value: Wei,
        gas: u64,
    ) -> Result<String, RemoteError> {
        let call = call
            .from(H160::from(from.address()))
            .value(U256::from(value))
            .gas(gas)
            .legacy();

        self.bounded(async move {
            call.send()
                .await
                .map(|pending| format!("{:#x}", pending.tx_hash()))
                .map_err(contract_error)
        })
        .await
    }

    async fn poll_receipt(&self, tx_hash: H256) -> Result<(), RemoteError> {
        loop {
            if let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? {
                if receipt.status == Some(U64::zero()) {
                    return Err(RemoteError::Reverted(format!("transaction {tx_hash:#x} failed")));
                }
                return Ok(());
            }
            sleep(self.receipt_poll_interval).await;
        }
    }
}

fn contract_error(err: ContractError<Client>) -> RemoteError {
    match err {
        ContractError::MiddlewareError { e } | ContractError::ProviderError { e } => e.into(),
        ContractError::Revert(data) => RemoteError::Reverted(format!("reverted with data {data}")),
        other => RemoteError::Decode(other.to_string()),
    }
}

#[async_trait]
impl RemoteAuthority for JsonRpcAuthority {
    async fn accounts(&self) -> Result<Vec<OracleIdentity>, RemoteError> {
        let accounts = self
            .bounded(async { self.provider.get_accounts().await.map_err(RemoteError::from) })
            .await?;
        Ok(accounts
            .into_iter()
            .map(|account| OracleIdentity::new(account.into()))
            .collect())
    }

    async fn is_operational(&self) -> Result<bool, RemoteError> {
        self.bounded(async { self.app.is_operational().call().await.map_err(contract_error) })
            .await
    }

    async fn registration_fee(&self) -> Result<Wei, RemoteError> {
        let fee = self
            .bounded(async { self.app.registration_fee().call().await.map_err(contract_error) })
            .await?;
        Ok(Wei::try_from(fee)?)
    }

    async fn register_oracle(&self, oracle: &OracleIdentity, fee: Wei) -> Result<String, RemoteError> {
        let tx_hash = self
            .send(self.app.register_oracle(), oracle, fee, self.registration_gas)
            .await?;
        debug!(oracle = %oracle, tx_hash = %tx_hash, "registration sent");
        Ok(tx_hash)
    }

    async fn confirm_transaction(&self, tx_hash: &str) -> Result<(), RemoteError> {
        let hash: H256 = tx_hash
            .parse()
            .map_err(|_| RemoteError::Decode(format!("invalid transaction hash {tx_hash:?}")))?;
        self.bounded(self.poll_receipt(hash)).await
    }

    async fn assigned_indexes(&self, oracle: &OracleIdentity) -> Result<IndexAssignment, RemoteError> {
        let raw = self
            .bounded(async {
                self.app
                    .get_my_indexes()
                    .from(H160::from(oracle.address()))
                    .call()
                    .await
                    .map_err(contract_error)
            })
            .await?;
        Ok(IndexAssignment::try_from(raw)?)
    }

    async fn latest_block(&self) -> Result<u64, RemoteError> {
        let block = self
            .bounded(async { self.provider.get_block_number().await.map_err(RemoteError::from) })
            .await?;
        Ok(block.as_u64())
    }

    async fn status_request_logs(&self, from_block: u64, to_block: u64) -> Result<Vec<Log>, RemoteError> {
        let filter = Filter::new()
            .address(self.app_address)
            .topic0(oracle_request_topic())
            .from_block(from_block)
            .to_block(to_block);

        let logs = self
            .bounded(async { self.provider.get_logs(&filter).await.map_err(RemoteError::from) })
            .await?;

        Ok(logs
            .into_iter()
            .filter(|log| {
                let removed = log.removed == Some(true);
                if removed {
                    debug!(tx_hash = ?log.transaction_hash, "skipping removed log");
                }
                !removed
            })
            .collect())
    }

    async fn submit_response(&self, response: &StatusResponse) -> Result<String, RemoteError> {
        let call = self.app.submit_oracle_response(
            response.index.value(),
            response.airline.into(),
            response.flight.clone(),
            U256::from(response.timestamp),
            response.status.code(),
        );
        self.send(call, &response.oracle, Wei(0), self.response_gas)
            .await
    }
}
