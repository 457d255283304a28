use crate::{
    chain_client::ChainClient,
    governor::ProposalState,
    listing::{ProposalPage, paginate, validate_governor_address},
    proposal::ProposalRecord,
    scanner::ScannerSettings,
    store::ScanStateStore,
};
use alloy::primitives::{Address, U256};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};
use utils::errors::STATE_LOAD_FAILED;

#[derive(Clone)]
pub struct ApiState {
    pub store: ScanStateStore,
    pub client: Arc<dyn ChainClient>,
    pub settings: ScannerSettings,
    pub default_page_size: usize,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalDetail {
    #[serde(flatten)]
    pub record: ProposalRecord,
    pub title: String,
    pub state: ProposalState,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(|| async { "OK" }))
        .route("/governors/{address}/proposals", get(list_proposals))
        .route(
            "/governors/{address}/proposals/{proposal_id}",
            get(get_proposal),
        )
        .with_state(state)
}

fn parse_governor(address: &str) -> Result<Address, ApiError> {
    validate_governor_address(address).map_err(|e| ApiError::BadRequest(e.to_string()))
}

async fn load_proposals(
    state: &ApiState,
    governor: &Address,
) -> Result<Option<crate::store::ScanState>, ApiError> {
    state.store.load(governor).await.map_err(|e| {
        error!(governor = %governor, error = %e, "{}", STATE_LOAD_FAILED);
        ApiError::Internal(STATE_LOAD_FAILED.to_string())
    })
}

pub async fn list_proposals(
    State(state): State<ApiState>,
    Path(address): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ProposalPage>, ApiError> {
    let governor = parse_governor(&address)?;
    let page = query.page.unwrap_or(0);
    let page_size = query.page_size.unwrap_or(state.default_page_size);

    let Some(scan_state) = load_proposals(&state, &governor).await? else {
        return Ok(Json(paginate(governor, Vec::new(), page, page_size, None)));
    };

    let chain_head = match state.client.get_block_number().await {
        Ok(head) => Some(head),
        Err(e) => {
            warn!(error = %e, "Failed to fetch chain head for progress");
            scan_state.cursor.high_watermark
        }
    };
    let progress =
        chain_head.map(|head| scan_state.cursor.progress(head, state.settings.min_block));

    let mut proposal_page = paginate(
        governor,
        scan_state.proposals.into_values(),
        page,
        page_size,
        progress,
    );
    for row in &mut proposal_page.rows {
        row.state = live_state(&state, governor, &row.proposal_id).await;
    }

    Ok(Json(proposal_page))
}

/// Reads the governor's `state()`, degrading to `Unknown` on any failure.
async fn live_state(state: &ApiState, governor: Address, proposal_id: &str) -> ProposalState {
    let Ok(id) = proposal_id.parse::<U256>() else {
        return ProposalState::Unknown;
    };

    state
        .client
        .proposal_state(governor, id)
        .await
        .unwrap_or_else(|e| {
            warn!(proposal_id = %proposal_id, error = %e, "Failed to fetch proposal state");
            ProposalState::Unknown
        })
}

pub async fn get_proposal(
    State(state): State<ApiState>,
    Path((address, proposal_id)): Path<(String, String)>,
) -> Result<Json<ProposalDetail>, ApiError> {
    let governor = parse_governor(&address)?;

    let record = load_proposals(&state, &governor)
        .await?
        .and_then(|mut scan_state| scan_state.proposals.remove(&proposal_id))
        .ok_or_else(|| ApiError::NotFound(format!("proposal {proposal_id} not found")))?;

    let proposal_state = live_state(&state, governor, &proposal_id).await;

    Ok(Json(ProposalDetail {
        title: record.title(),
        record,
        state: proposal_state,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cursor::ScanCursor,
        store::{MemoryStore, ScanState},
        test_utils::{FakeChainClient, proposal_event},
    };
    use alloy::primitives::address;
    use std::num::NonZeroU64;

    const GOVERNOR: Address = address!("0x5e4be8Bc9637f0EAA1A755019e06A68ce081D58F");

    async fn api_state(client: Arc<FakeChainClient>) -> ApiState {
        let store = ScanStateStore::new(Arc::new(MemoryStore::new()));
        let mut scan_state = ScanState::new(ScanCursor {
            low_watermark: Some(90_001),
            high_watermark: Some(100_000),
        });
        scan_state.merge_proposals((1..=7).map(|i| {
            let mut record = ProposalRecord::from(proposal_event(i, i * 100, i * 100 + 50, "# Hi"));
            record.proposed_at = chrono::DateTime::from_timestamp(1_700_000_000, 0);
            record
        }));
        store.save(&GOVERNOR, &scan_state).await.unwrap();

        ApiState {
            store,
            client,
            settings: ScannerSettings {
                window_size: NonZeroU64::new(5000).unwrap(),
                min_block: 80_001,
            },
            default_page_size: 5,
        }
    }

    #[tokio::test]
    async fn test_list_proposals_sorted_page_with_progress() {
        let client = Arc::new(FakeChainClient::with_head(101_000));
        client.set_state(7, 7);
        let state = api_state(client).await;

        let Json(page) = list_proposals(
            State(state),
            Path(GOVERNOR.to_string()),
            Query(PageQuery::default()),
        )
        .await
        .unwrap();

        assert_eq!(page.total, 7);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.rows.len(), 5);
        assert_eq!(page.rows[0].vote_start, "700");
        assert_eq!(page.rows[0].state, ProposalState::Executed);
        assert_eq!(page.rows[1].state, ProposalState::Unknown);
        assert_eq!(
            page.rows[0].proposed_at.map(|at| at.timestamp()),
            Some(1_700_000_000)
        );
        let progress = page.progress.unwrap();
        assert_eq!(progress.scanned_blocks, 10_000);
        assert_eq!(progress.blocks_left, 10_000 + 1_000);
    }

    #[tokio::test]
    async fn test_list_proposals_unknown_governor_is_empty() {
        let client = Arc::new(FakeChainClient::with_head(1));
        let state = api_state(client).await;

        let Json(page) = list_proposals(
            State(state),
            Path("0x408ED6354d4973f66138C91495F2f2FCbd8724C3".to_string()),
            Query(PageQuery {
                page: Some(1),
                page_size: Some(3),
            }),
        )
        .await
        .unwrap();

        assert_eq!(page.total, 0);
        assert!(page.progress.is_none());
    }

    #[tokio::test]
    async fn test_invalid_address_is_bad_request() {
        let client = Arc::new(FakeChainClient::with_head(1));
        let state = api_state(client).await;

        let err = list_proposals(
            State(state),
            Path("0x123".to_string()),
            Query(PageQuery::default()),
        )
        .await
        .unwrap_err();

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_proposal_with_live_state() {
        let client = Arc::new(FakeChainClient::with_head(1));
        client.set_state(3, 1);
        let state = api_state(client).await;

        let Json(detail) = get_proposal(
            State(state.clone()),
            Path((GOVERNOR.to_string(), "3".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(detail.record.proposal_id, "3");
        assert_eq!(detail.title, "Hi");
        assert_eq!(detail.state, ProposalState::Active);

        // State read failures degrade to Unknown.
        let Json(detail) = get_proposal(
            State(state.clone()),
            Path((GOVERNOR.to_string(), "4".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(detail.state, ProposalState::Unknown);

        let err = get_proposal(State(state), Path((GOVERNOR.to_string(), "99".to_string())))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
