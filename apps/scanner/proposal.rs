use crate::governor::ProposalCreated;
use alloy::{hex, primitives::U256, rpc::types::Log};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_TITLE_CHARS: usize = 120;

/// One `ProposalCreated` event, flattened into display-ready strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRecord {
    pub proposal_id: String,
    pub proposer: String,
    pub targets: Vec<String>,
    pub values: Vec<String>,
    pub signatures: Vec<String>,
    pub calldatas: Vec<String>,
    pub vote_start: String,
    pub vote_end: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    /// Timestamp of the block that emitted the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_at: Option<DateTime<Utc>>,
}

impl From<ProposalCreated> for ProposalRecord {
    fn from(event: ProposalCreated) -> Self {
        Self {
            proposal_id: event.proposalId.to_string(),
            proposer: event.proposer.to_checksum(None),
            targets: event
                .targets
                .iter()
                .map(|target| target.to_checksum(None))
                .collect(),
            values: event.values.iter().map(U256::to_string).collect(),
            signatures: event.signatures,
            calldatas: event.calldatas.iter().map(hex::encode_prefixed).collect(),
            vote_start: event.voteStart.to_string(),
            vote_end: event.voteEnd.to_string(),
            description: event.description,
            block_number: None,
            transaction_hash: None,
            proposed_at: None,
        }
    }
}

impl TryFrom<&Log> for ProposalRecord {
    type Error = alloy::sol_types::Error;

    fn try_from(log: &Log) -> Result<Self, Self::Error> {
        let decoded = log.log_decode::<ProposalCreated>()?;
        let mut record = ProposalRecord::from(decoded.inner.data);
        record.block_number = log.block_number;
        record.transaction_hash = log.transaction_hash.map(|hash| hash.to_string());
        Ok(record)
    }
}

impl ProposalRecord {
    /// Vote start as a number; malformed persisted values sort as zero.
    pub fn vote_start_block(&self) -> U256 {
        self.vote_start.parse().unwrap_or_default()
    }

    pub fn title(&self) -> String {
        extract_title(&self.description)
    }

    pub fn summary(&self, max_chars: usize) -> String {
        self.description.chars().take(max_chars).collect()
    }
}

fn extract_title(description: &str) -> String {
    let title = description
        .lines()
        .map(|line| line.trim_start_matches('#').trim())
        .find(|line| !line.is_empty())
        .unwrap_or("Unknown");

    title.chars().take(MAX_TITLE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{proposal_event, proposal_log};
    use alloy::primitives::{Address, address};

    const GOVERNOR: Address = address!("0x5e4be8Bc9637f0EAA1A755019e06A68ce081D58F");

    #[test]
    fn test_positional_mapping_stringifies_numbers() {
        let event = proposal_event(42, 100, 200, "# Fund the grants program\n\nDetails");
        let record = ProposalRecord::from(event.clone());

        assert_eq!(record.proposal_id, "42");
        assert_eq!(record.proposer, event.proposer.to_checksum(None));
        assert_eq!(record.targets, vec![event.targets[0].to_checksum(None)]);
        assert_eq!(record.values, vec!["1000000000000000000".to_string()]);
        assert_eq!(record.signatures, vec!["transfer(address,uint256)".to_string()]);
        assert_eq!(record.calldatas, vec!["0xdeadbeef".to_string()]);
        assert_eq!(record.vote_start, "100");
        assert_eq!(record.vote_end, "200");
        assert_eq!(record.description, "# Fund the grants program\n\nDetails");
    }

    #[test]
    fn test_decode_from_log_keeps_location() {
        let log = proposal_log(GOVERNOR, 21_050_000, proposal_event(7, 10, 20, "Upgrade"));
        let record = ProposalRecord::try_from(&log).unwrap();

        assert_eq!(record.proposal_id, "7");
        assert_eq!(record.block_number, Some(21_050_000));
        assert!(record.transaction_hash.is_some());
    }

    #[test]
    fn test_decode_rejects_foreign_event() {
        let mut log = proposal_log(GOVERNOR, 1, proposal_event(1, 1, 2, "x"));
        let mut topics = log.inner.data.topics().to_vec();
        topics[0] = alloy::primitives::B256::repeat_byte(0xab);
        log.inner.data =
            alloy::primitives::LogData::new_unchecked(topics, log.inner.data.data.clone());

        assert!(ProposalRecord::try_from(&log).is_err());
    }

    #[test]
    fn test_title_skips_heading_markers_and_blank_lines() {
        assert_eq!(extract_title("\n\n# Title here\nbody"), "Title here");
        assert_eq!(extract_title("##\n## Real title"), "Real title");
        assert_eq!(extract_title(""), "Unknown");
        assert_eq!(extract_title(&"a".repeat(300)).len(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_vote_start_block_parses_large_numbers() {
        let mut record = ProposalRecord::from(proposal_event(1, 0, 0, "x"));
        record.vote_start = "115792089237316195423570985008687907853269984665640564039457584007913129639935".into();
        assert_eq!(record.vote_start_block(), U256::MAX);

        record.vote_start = "not a number".into();
        assert_eq!(record.vote_start_block(), U256::ZERO);
    }

    #[test]
    fn test_persisted_json_uses_camel_case() {
        let record = ProposalRecord::from(proposal_event(3, 5, 6, "d"));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["proposalId"], "3");
        assert_eq!(json["voteStart"], "5");
        assert!(json.get("blockNumber").is_none());
    }
}
