//! # Solana RPC 抽象化
//!
//! ブロードキャスト段が使うRPCノードへの操作をトレイトで抽象化する。
//! 本番はJSON-RPC over HTTP（[`http::HttpLedgerRpc`]）、テストはインメモリのモック。

pub mod http;
#[cfg(test)]
pub mod mock;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_sdk::signature::Signature;

/// コミットメントレベル。順序は確定の強さ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl FromStr for Commitment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(format!("不明なコミットメントレベル: {other}")),
        }
    }
}

/// `getSignatureStatuses`の1要素。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    /// `None`はルート済み（finalized）を意味する
    #[serde(default)]
    pub confirmations: Option<u64>,
    /// オンチェーン実行エラー。成功時は`null`。
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    /// 指定コミットメントに到達したか。
    pub fn reached(&self, target: Commitment) -> bool {
        match self.confirmation_status {
            Some(level) => level >= target,
            // confirmationStatusを返さない古いノード
            None => self.confirmations.is_none(),
        }
    }
}

/// RPC呼び出しのエラー。
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    /// ノードがJSON-RPCエラーで応答した（preflight失敗、残高不足、重複等）
    #[error("{message} (code {code})")]
    Rejected {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },
    /// 接続失敗、不正なレスポンス等。送信が受理されたかは分からない。
    #[error("{0}")]
    Transport(String),
}

/// 台帳ネットワークのRPCノード。
#[async_trait::async_trait]
pub trait LedgerRpc: Send + Sync {
    /// 署名済みトランザクションの生バイト列を送信し、割り当てられた署名を返す。
    async fn send_transaction(&self, raw: &[u8]) -> Result<Signature, RpcError>;

    /// 署名の確定状況を取得する。ノードが未認識なら`None`。
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError>;
}
