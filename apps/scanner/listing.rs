use crate::{cursor::ScanProgress, governor::ProposalState, proposal::ProposalRecord};
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::str::FromStr;
use thiserror::Error;
use utils::errors::INVALID_GOVERNOR_ADDRESS;

lazy_static! {
    static ref ETH_ADDRESS_REGEX: Regex = Regex::new(r"^0x[a-fA-F0-9]{40}$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is required")]
    Empty,
    #[error("{}", INVALID_GOVERNOR_ADDRESS)]
    Invalid,
}

pub fn validate_governor_address(input: &str) -> Result<Address, AddressError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AddressError::Empty);
    }
    if !ETH_ADDRESS_REGEX.is_match(input) {
        return Err(AddressError::Invalid);
    }
    Address::from_str(input).map_err(|_| AddressError::Invalid)
}

/// `0x1234…abcd`
pub fn shorten_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

/// Newest vote start first. Equal vote starts fall back to descending
/// proposal id so the order is stable between requests.
pub fn sort_by_vote_start_desc(records: &mut [ProposalRecord]) {
    records.sort_by(|a, b| {
        b.vote_start_block()
            .cmp(&a.vote_start_block())
            .then_with(|| proposal_id_value(b).cmp(&proposal_id_value(a)))
    });
}

fn proposal_id_value(record: &ProposalRecord) -> U256 {
    record.proposal_id.parse().unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRow {
    pub proposal_id: String,
    pub title: String,
    pub proposer: String,
    pub proposer_short: String,
    pub vote_start: String,
    pub vote_end: String,
    pub summary: String,
    pub proposed_at: Option<DateTime<Utc>>,
    /// `Unknown` until a live state read fills it in.
    pub state: ProposalState,
}

const SUMMARY_CHARS: usize = 100;

impl From<&ProposalRecord> for ProposalRow {
    fn from(record: &ProposalRecord) -> Self {
        Self {
            proposal_id: record.proposal_id.clone(),
            title: record.title(),
            proposer: record.proposer.clone(),
            proposer_short: shorten_address(&record.proposer),
            vote_start: record.vote_start.clone(),
            vote_end: record.vote_end.clone(),
            summary: record.summary(SUMMARY_CHARS),
            proposed_at: record.proposed_at,
            state: ProposalState::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalPage {
    pub governor: Address,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
    pub rows: Vec<ProposalRow>,
    pub progress: Option<ScanProgress>,
}

/// Sorts `records` and cuts out zero-based `page`. A page past the end is
/// empty rather than an error.
pub fn paginate(
    governor: Address,
    records: impl IntoIterator<Item = ProposalRecord>,
    page: usize,
    page_size: usize,
    progress: Option<ScanProgress>,
) -> ProposalPage {
    let page_size = page_size.max(1);
    let mut records: Vec<ProposalRecord> = records.into_iter().collect();
    sort_by_vote_start_desc(&mut records);

    let total = records.len();
    let total_pages = total.div_ceil(page_size);
    let rows = records
        .iter()
        .skip(page.saturating_mul(page_size))
        .take(page_size)
        .map(ProposalRow::from)
        .collect();

    ProposalPage {
        governor,
        page,
        page_size,
        total,
        total_pages,
        rows,
        progress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::proposal_event;
    use alloy::primitives::address;

    const GOVERNOR: Address = address!("0x5e4be8Bc9637f0EAA1A755019e06A68ce081D58F");

    fn record(id: u64, vote_start: u64) -> ProposalRecord {
        ProposalRecord::from(proposal_event(id, vote_start, vote_start + 100, "# Title\nbody"))
    }

    #[test]
    fn test_higher_vote_start_sorts_first() {
        let mut records = vec![record(1, 100), record(2, 200)];
        sort_by_vote_start_desc(&mut records);

        assert_eq!(records[0].vote_start, "200");
        assert_eq!(records[1].vote_start, "100");
    }

    #[test]
    fn test_sort_is_numeric_not_lexicographic() {
        let mut records = vec![record(1, 9), record(2, 10), record(3, 1_000)];
        sort_by_vote_start_desc(&mut records);

        let starts: Vec<&str> = records.iter().map(|r| r.vote_start.as_str()).collect();
        assert_eq!(starts, vec!["1000", "10", "9"]);
    }

    #[test]
    fn test_ties_break_on_proposal_id() {
        let mut records = vec![record(3, 50), record(11, 50), record(7, 50)];
        sort_by_vote_start_desc(&mut records);

        let ids: Vec<&str> = records.iter().map(|r| r.proposal_id.as_str()).collect();
        assert_eq!(ids, vec!["11", "7", "3"]);
    }

    #[test]
    fn test_paginate() {
        let records: Vec<_> = (1..=12).map(|i| record(i, i * 10)).collect();

        let first = paginate(GOVERNOR, records.clone(), 0, 5, None);
        assert_eq!(first.total, 12);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.rows.len(), 5);
        assert_eq!(first.rows[0].proposal_id, "12");
        assert_eq!(first.rows[0].title, "Title");
        assert_eq!(first.rows[0].state, ProposalState::Unknown);
        assert!(first.rows[0].proposed_at.is_none());

        let last = paginate(GOVERNOR, records.clone(), 2, 5, None);
        assert_eq!(last.rows.len(), 2);
        assert_eq!(last.rows[1].proposal_id, "1");

        let beyond = paginate(GOVERNOR, records, 9, 5, None);
        assert!(beyond.rows.is_empty());
    }

    #[test]
    fn test_validate_governor_address() {
        assert_eq!(validate_governor_address(""), Err(AddressError::Empty));
        assert_eq!(validate_governor_address("   "), Err(AddressError::Empty));
        assert_eq!(validate_governor_address("0x123"), Err(AddressError::Invalid));
        assert_eq!(
            validate_governor_address("5e4be8Bc9637f0EAA1A755019e06A68ce081D58F"),
            Err(AddressError::Invalid)
        );
        assert_eq!(
            validate_governor_address("0x5e4be8bc9637f0eaa1a755019e06a68ce081d58f"),
            Ok(GOVERNOR)
        );
        assert_eq!(
            AddressError::Invalid.to_string(),
            "Please enter a valid Ethereum address"
        );
    }

    #[test]
    fn test_shorten_address() {
        assert_eq!(
            shorten_address("0x5e4be8Bc9637f0EAA1A755019e06A68ce081D58F"),
            "0x5e4b…D58F"
        );
        assert_eq!(shorten_address("0x1234"), "0x1234");
    }
}
