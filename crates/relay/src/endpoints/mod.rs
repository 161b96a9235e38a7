//! # リレーエンドポイント
//!
//! ## API エンドポイント
//! - `POST /api/sign-transaction` — 共同署名 + ブロードキャスト
//! - `GET /api/operational-identity` — 運用ウォレット公開鍵

pub mod operational_identity;
pub mod sign_transaction;

use std::sync::Arc;

use axum::routing::{get, post};

use crate::config::RelayState;

pub use operational_identity::handle_operational_identity;
pub use sign_transaction::{handle_method_not_allowed, handle_sign_transaction};

/// ルーターを構築する。
pub fn router(state: Arc<RelayState>) -> axum::Router {
    axum::Router::new()
        .route(
            "/api/sign-transaction",
            post(handle_sign_transaction).fallback(handle_method_not_allowed),
        )
        .route(
            "/api/operational-identity",
            get(handle_operational_identity),
        )
        .with_state(state)
}
