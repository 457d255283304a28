use crate::{
    cursor::BlockWindow,
    governor::{IGovernor, ProposalCreated, ProposalState},
};
use alloy::{
    primitives::{Address, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{Filter, Log},
    sol_types::SolEvent,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument};
use utils::errors::{
    FETCH_BLOCK_FAILED, FETCH_BLOCK_NUMBER_FAILED, FETCH_LOGS_FAILED, RPC_PROVIDER_FAILED,
};

/// The chain access the scanner and API need.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_block_number(&self) -> Result<u64>;

    /// `ProposalCreated` logs emitted by `governor` inside `window`.
    async fn get_proposal_logs(&self, governor: Address, window: BlockWindow) -> Result<Vec<Log>>;

    async fn proposal_state(&self, governor: Address, proposal_id: U256) -> Result<ProposalState>;

    /// Unix timestamp, in seconds, of block `block_number`.
    async fn block_timestamp(&self, block_number: u64) -> Result<u64>;
}

#[derive(Clone)]
pub struct AlloyChainClient {
    provider: DynProvider,
}

impl AlloyChainClient {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url = rpc_url.parse().context(RPC_PROVIDER_FAILED)?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { provider })
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn get_block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .context(FETCH_BLOCK_NUMBER_FAILED)
    }

    #[instrument(skip(self), fields(from = window.from, to = window.to))]
    async fn get_proposal_logs(&self, governor: Address, window: BlockWindow) -> Result<Vec<Log>> {
        let filter = Filter::new()
            .address(governor)
            .event_signature(ProposalCreated::SIGNATURE_HASH)
            .from_block(window.from)
            .to_block(window.to);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .context(FETCH_LOGS_FAILED)?;

        debug!(governor = %governor, logs = logs.len(), "Fetched proposal logs");
        Ok(logs)
    }

    async fn proposal_state(&self, governor: Address, proposal_id: U256) -> Result<ProposalState> {
        let governor_contract = IGovernor::new(governor, self.provider.clone());
        let state = governor_contract
            .state(proposal_id)
            .call()
            .await
            .context("Failed to fetch proposal state")?;

        Ok(ProposalState::from(state))
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<u64> {
        let block = self
            .provider
            .get_block_by_number(block_number.into())
            .await
            .context(FETCH_BLOCK_FAILED)?
            .with_context(|| format!("Block {block_number} not found"))?;

        Ok(block.header.timestamp)
    }
}
