use crate::{
    chain_client::ChainClient,
    cursor::{BlockWindow, ScanCursor},
    proposal::ProposalRecord,
    store::{ScanState, ScanStateStore, StoreError},
};
use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{num::NonZeroU64, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to fetch chain head: {0}")]
    ChainHead(#[source] anyhow::Error),
    #[error("failed to fetch logs for blocks {}..={}: {source}", .window.from, .window.to)]
    FetchWindow {
        window: BlockWindow,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannerSettings {
    pub window_size: NonZeroU64,
    pub min_block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub governor: Address,
    pub chain_head: u64,
    pub windows_fetched: usize,
    pub proposals_seen: usize,
    pub proposals_inserted: usize,
    pub logs_skipped: usize,
    pub proposals_total: usize,
    pub cursor: ScanCursor,
}

impl ScanReport {
    fn new(governor: Address, chain_head: u64, cursor: ScanCursor) -> Self {
        Self {
            governor,
            chain_head,
            windows_fetched: 0,
            proposals_seen: 0,
            proposals_inserted: 0,
            logs_skipped: 0,
            proposals_total: 0,
            cursor,
        }
    }
}

/// Walks a governor's `ProposalCreated` history backward to the minimum block
/// and forward to the chain head, persisting progress after every window.
pub struct LogScanner {
    client: Arc<dyn ChainClient>,
    store: ScanStateStore,
    settings: ScannerSettings,
    scan_lock: Mutex<()>,
}

impl LogScanner {
    pub fn new(client: Arc<dyn ChainClient>, store: ScanStateStore, settings: ScannerSettings) -> Self {
        Self {
            client,
            store,
            settings,
            scan_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> ScannerSettings {
        self.settings
    }

    /// Runs both passes to completion. On a failed window the error is
    /// returned and every earlier window stays persisted, so the next call
    /// resumes at the failed window.
    #[instrument(name = "scan", skip(self), fields(governor = %governor))]
    pub async fn scan(&self, governor: Address) -> Result<ScanReport, ScanError> {
        let _guard = self.scan_lock.lock().await;

        let chain_head = self
            .client
            .get_block_number()
            .await
            .map_err(ScanError::ChainHead)?;

        let mut state = match self.store.load(&governor).await? {
            Some(state) => state,
            None => {
                info!(chain_head, "No scan state found, starting at chain head");
                let state = ScanState::new(ScanCursor::starting_at(chain_head));
                self.store.save(&governor, &state).await?;
                state
            }
        };

        let mut report = ScanReport::new(governor, chain_head, state.cursor);

        self.scan_backward(governor, chain_head, &mut state, &mut report)
            .await?;
        self.scan_forward(governor, chain_head, &mut state, &mut report)
            .await?;

        report.proposals_total = state.proposals.len();
        report.cursor = state.cursor;

        info!(
            chain_head,
            windows = report.windows_fetched,
            inserted = report.proposals_inserted,
            total = report.proposals_total,
            low_watermark = ?report.cursor.low_watermark,
            high_watermark = ?report.cursor.high_watermark,
            "Scan finished"
        );

        Ok(report)
    }

    async fn scan_backward(
        &self,
        governor: Address,
        chain_head: u64,
        state: &mut ScanState,
        report: &mut ScanReport,
    ) -> Result<(), ScanError> {
        let ScannerSettings {
            window_size,
            min_block,
        } = self.settings;

        while let Some(window) = state
            .cursor
            .next_backward_window(chain_head, min_block, window_size)
        {
            self.process_window(governor, window, state, report).await?;
            state.cursor.record_backward(window);
            self.persist(governor, state).await?;
        }

        Ok(())
    }

    async fn scan_forward(
        &self,
        governor: Address,
        chain_head: u64,
        state: &mut ScanState,
        report: &mut ScanReport,
    ) -> Result<(), ScanError> {
        while let Some(window) = state
            .cursor
            .next_forward_window(chain_head, self.settings.window_size)
        {
            self.process_window(governor, window, state, report).await?;
            state.cursor.record_forward(window);
            self.persist(governor, state).await?;
        }

        Ok(())
    }

    async fn process_window(
        &self,
        governor: Address,
        window: BlockWindow,
        state: &mut ScanState,
        report: &mut ScanReport,
    ) -> Result<(), ScanError> {
        let logs = self
            .client
            .get_proposal_logs(governor, window)
            .await
            .map_err(|source| ScanError::FetchWindow { window, source })?;

        let mut records = Vec::with_capacity(logs.len());
        for log in &logs {
            match ProposalRecord::try_from(log) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        block_number = ?log.block_number,
                        transaction_hash = ?log.transaction_hash,
                        error = %e,
                        "Skip: failed to decode ProposalCreated log"
                    );
                    report.logs_skipped += 1;
                }
            }
        }

        self.stamp_proposed_at(&mut records).await;

        report.windows_fetched += 1;
        report.proposals_seen += records.len();
        report.proposals_inserted += state.merge_proposals(records);

        debug!(
            from = window.from,
            to = window.to,
            logs = logs.len(),
            "Processed window"
        );

        Ok(())
    }

    /// Timestamp lookup failures leave `proposed_at` unset.
    async fn stamp_proposed_at(&self, records: &mut [ProposalRecord]) {
        for record in records.iter_mut() {
            let Some(block_number) = record.block_number else {
                continue;
            };
            match self.client.block_timestamp(block_number).await {
                Ok(timestamp) => {
                    record.proposed_at = i64::try_from(timestamp)
                        .ok()
                        .and_then(|secs| DateTime::from_timestamp(secs, 0));
                }
                Err(e) => warn!(
                    block_number,
                    proposal_id = %record.proposal_id,
                    error = %e,
                    "Failed to fetch block timestamp"
                ),
            }
        }
    }

    async fn persist(&self, governor: Address, state: &mut ScanState) -> Result<(), ScanError> {
        state.updated_at = Utc::now();
        self.store.save(&governor, state).await?;
        Ok(())
    }
}
