//! # Cosign Relay
//!
//! フロントエンドが構築しAuthorityが部分署名したSolanaトランザクションに
//! 運用ウォレット（fee payer）の署名を追加し、ブロードキャストして確定を待つ。
//!
//! ## 処理段
//! 1. デコードとfee payer照合（運用ウォレット以外がfee payerなら即拒否）
//! 2. 共同署名（fee payerスロットのみ。他の署名には触れない）
//! 3. ブロードキャストと確定待ち（期限付き）
//!
//! ## API エンドポイント
//! - `POST /api/sign-transaction` — 共同署名 + ブロードキャスト
//! - `GET /api/operational-identity` — 運用ウォレット公開鍵

mod broadcast;
mod config;
mod cosign;
mod endpoints;
mod error;
mod identity;
mod rpc;
#[cfg(test)]
mod test_helpers;
mod transaction;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::{RelayConfig, RelayState};
use crate::rpc::http::{HttpLedgerRpc, SendOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 環境変数の読み込み（鍵が無ければ起動しない）
    let config = RelayConfig::from_env()?;
    tracing::info!(
        operational_pubkey = %config.identity.pubkey(),
        rpc_url = %config.rpc_url,
        signer_policy = ?config.signer_policy,
        "運用ウォレットを読み込みました"
    );

    let http_client = reqwest::Client::builder()
        .timeout(config.rpc_request_timeout)
        .build()?;
    let rpc = HttpLedgerRpc::new(
        http_client,
        config.rpc_url.clone(),
        SendOptions {
            skip_preflight: config.skip_preflight,
            preflight_commitment: config.confirmation.commitment,
        },
    );

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(RelayState::new(
        config.identity,
        Arc::new(rpc),
        config.confirmation,
        config.signer_policy,
    ));
    {
        let settings = state.broadcaster.settings();
        tracing::info!(
            commitment = settings.commitment.as_str(),
            timeout = ?settings.timeout,
            poll_interval = ?settings.poll_interval,
            "確定待ち設定"
        );
    }

    let identity = state.identity.clone();
    let app = endpoints::router(state);

    tracing::info!("リレーを {} で起動します", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(
        signatures_issued = identity.signatures_issued(),
        "リレーを停止しました"
    );

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "シグナルハンドラの登録に失敗しました");
        std::future::pending::<()>().await;
    }
}
