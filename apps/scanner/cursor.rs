//! Scan progress over a governor's event log.
//!
//! The cursor tracks two watermarks around the block at which scanning first
//! started: the backward pass lowers `low_watermark` toward the configured
//! minimum block, the forward pass raises `high_watermark` toward the chain
//! head. Both bounds are inclusive, and everything in `[low, high]` has been
//! fetched.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;

/// Inclusive block range fetched in one `eth_getLogs` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWindow {
    pub from: u64,
    pub to: u64,
}

impl BlockWindow {
    pub fn block_count(&self) -> u64 {
        self.to - self.from + 1
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanCursor {
    /// Lowest scanned block. `None` until the first backward window lands.
    pub low_watermark: Option<u64>,
    /// Highest scanned block. Set to the chain head when scanning starts.
    pub high_watermark: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    pub scanned_blocks: u64,
    pub blocks_left: u64,
}

impl ScanCursor {
    pub fn starting_at(chain_head: u64) -> Self {
        Self {
            low_watermark: None,
            high_watermark: Some(chain_head),
        }
    }

    pub fn next_backward_window(
        &self,
        chain_head: u64,
        min_block: u64,
        window_size: NonZeroU64,
    ) -> Option<BlockWindow> {
        // Before the first backward window lands the pass owns everything up
        // to `high_watermark`, whatever head the node reports now.
        let upper = match (self.low_watermark, self.high_watermark) {
            (Some(low), Some(high)) => low.checked_sub(1)?.min(high),
            (Some(low), None) => low.checked_sub(1)?,
            (None, Some(high)) => high,
            (None, None) => chain_head,
        };

        if upper < min_block {
            return None;
        }

        Some(BlockWindow {
            from: upper.saturating_sub(window_size.get() - 1),
            to: upper,
        })
    }

    pub fn next_forward_window(
        &self,
        chain_head: u64,
        window_size: NonZeroU64,
    ) -> Option<BlockWindow> {
        let high = self.high_watermark?;
        if high >= chain_head {
            return None;
        }

        Some(BlockWindow {
            from: high + 1,
            to: high.saturating_add(window_size.get()).min(chain_head),
        })
    }

    pub fn record_backward(&mut self, window: BlockWindow) {
        self.low_watermark = Some(window.from);
    }

    pub fn record_forward(&mut self, window: BlockWindow) {
        self.high_watermark = Some(window.to);
    }

    pub fn is_backward_complete(&self, min_block: u64) -> bool {
        match self.low_watermark {
            Some(low) => low <= min_block,
            None => self.high_watermark.is_some_and(|high| high < min_block),
        }
    }

    pub fn progress(&self, chain_head: u64, min_block: u64) -> ScanProgress {
        let scanned_blocks = match (self.low_watermark, self.high_watermark) {
            (Some(low), Some(high)) if high >= low => high - low + 1,
            _ => 0,
        };

        let backward_left = if self.is_backward_complete(min_block) {
            0
        } else {
            let upper = self
                .low_watermark
                .or_else(|| self.high_watermark.map(|high| high + 1))
                .unwrap_or(chain_head + 1);
            upper.saturating_sub(min_block)
        };

        let forward_left = self
            .high_watermark
            .map_or(0, |high| chain_head.saturating_sub(high));

        ScanProgress {
            scanned_blocks,
            blocks_left: backward_left + forward_left,
        }
    }
}

/// Every window the backward pass would fetch from `cursor`, newest first.
pub fn backward_windows(
    cursor: &ScanCursor,
    chain_head: u64,
    min_block: u64,
    window_size: NonZeroU64,
) -> Vec<BlockWindow> {
    let mut cursor = *cursor;
    let mut windows = Vec::new();
    while let Some(window) = cursor.next_backward_window(chain_head, min_block, window_size) {
        cursor.record_backward(window);
        windows.push(window);
    }
    windows
}

/// Every window the forward pass would fetch from `cursor`, oldest first.
pub fn forward_windows(
    cursor: &ScanCursor,
    chain_head: u64,
    window_size: NonZeroU64,
) -> Vec<BlockWindow> {
    let mut cursor = *cursor;
    let mut windows = Vec::new();
    while let Some(window) = cursor.next_forward_window(chain_head, window_size) {
        cursor.record_forward(window);
        windows.push(window);
    }
    windows
}
