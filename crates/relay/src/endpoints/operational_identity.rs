//! # GET /api/operational-identity
//!
//! フロントエンドがfee payerに設定する運用ウォレット公開鍵を返す。

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use cosign_types::OperationalIdentityResponse;

use crate::config::RelayState;

/// GET /api/operational-identity — 運用ウォレット公開鍵。
pub async fn handle_operational_identity(
    State(state): State<Arc<RelayState>>,
) -> Json<OperationalIdentityResponse> {
    Json(OperationalIdentityResponse {
        pubkey: state.identity.pubkey().to_string(),
    })
}
