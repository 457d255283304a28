// Fixtures shared by unit and integration tests.
use crate::{
    chain_client::ChainClient,
    cursor::BlockWindow,
    governor::{ProposalCreated, ProposalState},
};
use alloy::{
    primitives::{Address, B256, Bytes, U256, address},
    rpc::types::Log,
    sol_types::SolEvent,
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

pub const PROPOSER: Address = address!("0x1B686eE8E31c5959D9F5BBd8122a58682788eeaD");
pub const TARGET: Address = address!("0x912CE59144191C1204E64559FE8253a0e49E6548");

// Mainnet merge block timestamp, with 12 second slots after it.
const GENESIS_TIMESTAMP: u64 = 1_663_224_179;
const BLOCK_TIME_SECS: u64 = 12;

pub fn proposal_event(id: u64, vote_start: u64, vote_end: u64, description: &str) -> ProposalCreated {
    ProposalCreated {
        proposalId: U256::from(id),
        proposer: PROPOSER,
        targets: vec![TARGET],
        values: vec![U256::from(10u64).pow(U256::from(18u64))],
        signatures: vec!["transfer(address,uint256)".to_string()],
        calldatas: vec![Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef])],
        voteStart: U256::from(vote_start),
        voteEnd: U256::from(vote_end),
        description: description.to_string(),
    }
}

pub fn proposal_log(governor: Address, block_number: u64, event: ProposalCreated) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address: governor,
            data: event.encode_log_data(),
        },
        block_number: Some(block_number),
        transaction_hash: Some(B256::left_padding_from(&block_number.to_be_bytes())),
        ..Default::default()
    }
}

/// In-memory chain that serves pre-seeded logs and records every window
/// requested from it.
#[derive(Default)]
pub struct FakeChainClient {
    head: AtomicU64,
    logs: Mutex<Vec<Log>>,
    requested: Mutex<Vec<BlockWindow>>,
    failing_block: Mutex<Option<u64>>,
    states: Mutex<HashMap<U256, u8>>,
    timestamps_unavailable: AtomicBool,
}

impl FakeChainClient {
    pub fn with_head(head: u64) -> Self {
        let client = Self::default();
        client.set_head(head);
        client
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn push_log(&self, log: Log) {
        self.logs.lock().unwrap().push(log);
    }

    /// Any window containing `block` fails until cleared with `None`.
    pub fn fail_at(&self, block: Option<u64>) {
        *self.failing_block.lock().unwrap() = block;
    }

    pub fn set_state(&self, proposal_id: u64, state: u8) {
        self.states
            .lock()
            .unwrap()
            .insert(U256::from(proposal_id), state);
    }

    pub fn fail_timestamps(&self, fail: bool) {
        self.timestamps_unavailable.store(fail, Ordering::SeqCst);
    }

    pub fn timestamp_of(&self, block_number: u64) -> u64 {
        GENESIS_TIMESTAMP + block_number * BLOCK_TIME_SECS
    }

    pub fn requested_windows(&self) -> Vec<BlockWindow> {
        self.requested.lock().unwrap().clone()
    }

    pub fn clear_requests(&self) {
        self.requested.lock().unwrap().clear();
    }
}

#[async_trait]
impl ChainClient for FakeChainClient {
    async fn get_block_number(&self) -> Result<u64> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn get_proposal_logs(&self, governor: Address, window: BlockWindow) -> Result<Vec<Log>> {
        self.requested.lock().unwrap().push(window);

        if let Some(block) = *self.failing_block.lock().unwrap() {
            if (window.from..=window.to).contains(&block) {
                return Err(anyhow!("rpc unavailable for block {block}"));
            }
        }

        let logs = self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| log.inner.address == governor)
            .filter(|log| {
                log.block_number
                    .is_some_and(|block| (window.from..=window.to).contains(&block))
            })
            .cloned()
            .collect();
        Ok(logs)
    }

    async fn proposal_state(&self, _governor: Address, proposal_id: U256) -> Result<ProposalState> {
        self.states
            .lock()
            .unwrap()
            .get(&proposal_id)
            .copied()
            .map(ProposalState::from)
            .ok_or_else(|| anyhow!("execution reverted: unknown proposal id"))
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<u64> {
        if self.timestamps_unavailable.load(Ordering::SeqCst) {
            return Err(anyhow!("header not found"));
        }
        Ok(self.timestamp_of(block_number))
    }
}
