use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::SharedState;

/// Response body for `GET /chain/head`.
#[derive(Debug, Serialize)]
pub struct ChainHeadResponse {
    pub height: u64,
    pub hash_hex: String,
    pub committee_size: usize,
    pub committee_votes_threshold: usize,
}

/// `GET /chain/head`
///
/// Returns the current canonical head height and hash, along with the
/// active committee size and vote threshold.
pub async fn chain_head(
    State(state): State<SharedState>,
) -> Result<(StatusCode, Json<ChainHeadResponse>), (StatusCode, String)> {
    let chain = state.chain.lock().await;
    Ok((
        StatusCode::OK,
        Json(ChainHeadResponse {
            height: chain.head_height(),
            hash_hex: hex::encode(chain.head_hash().0.as_bytes()),
            committee_size: chain.committee_size(false),
            committee_votes_threshold: chain.committee_votes_threshold(false),
        }),
    ))
}
