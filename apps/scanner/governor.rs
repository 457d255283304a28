use alloy::sol;
use serde::{Deserialize, Serialize};

sol! {
    #[allow(missing_docs)]
    #[sol(rpc, all_derives)]
    interface IGovernor {
        event ProposalCreated(
            uint256 proposalId,
            address proposer,
            address[] targets,
            uint256[] values,
            string[] signatures,
            bytes[] calldatas,
            uint256 voteStart,
            uint256 voteEnd,
            string description
        );

        function state(uint256 proposalId) external view returns (uint8);
    }
}

pub use IGovernor::ProposalCreated;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalState {
    Pending,
    Active,
    Canceled,
    Defeated,
    Succeeded,
    Queued,
    Expired,
    Executed,
    Unknown,
}

impl From<u8> for ProposalState {
    fn from(value: u8) -> Self {
        match value {
            0 => ProposalState::Pending,
            1 => ProposalState::Active,
            2 => ProposalState::Canceled,
            3 => ProposalState::Defeated,
            4 => ProposalState::Succeeded,
            5 => ProposalState::Queued,
            6 => ProposalState::Expired,
            7 => ProposalState::Executed,
            _ => ProposalState::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolEvent;

    #[test]
    fn test_proposal_created_signature() {
        assert_eq!(
            ProposalCreated::SIGNATURE,
            "ProposalCreated(uint256,address,address[],uint256[],string[],bytes[],uint256,uint256,string)"
        );
    }

    #[test]
    fn test_state_mapping() {
        assert_eq!(ProposalState::from(0), ProposalState::Pending);
        assert_eq!(ProposalState::from(1), ProposalState::Active);
        assert_eq!(ProposalState::from(7), ProposalState::Executed);
        assert_eq!(ProposalState::from(8), ProposalState::Unknown);
        assert_eq!(ProposalState::from(255), ProposalState::Unknown);
    }
}
