//! # リレーエラー型
//!
//! 全エンドポイントで共通のエラー型。
//! 各段（デコード・署名・ブロードキャスト）のエラーはここに集約され、
//! カテゴリとHTTPステータスに対応付けられる。

use axum::http::StatusCode;
use axum::Json;
use cosign_types::ErrorResponse;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

/// リレーエラー型。
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// リクエストにtransactionBase64が含まれない
    #[error("Missing transactionBase64")]
    MissingTransaction,
    /// トランザクションとしてデコードできない
    #[error("トランザクションをデコードできません: {0}")]
    MalformedTransaction(String),
    /// fee payerが運用ウォレットではない
    #[error("Transaction fee payer must be the Operational Wallet")]
    UnauthorizedFeePayer,
    /// 他の必須署名者の署名が揃っていない（RequireCompleteポリシー時のみ）
    #[error("必須署名者の署名が不足しています: {}", format_pubkeys(.0))]
    IncompleteSignatures(Vec<Pubkey>),
    /// 運用ウォレットでの署名に失敗。詳細はログのみに出す。
    #[error("トランザクションの署名に失敗しました")]
    SigningFailure,
    /// RPCノードが送信時点でトランザクションを拒否した
    #[error("トランザクションがネットワークに拒否されました: {reason}")]
    Rejected {
        reason: String,
        details: Option<serde_json::Value>,
    },
    /// 取り込まれたがオンチェーンで実行に失敗した
    #[error("Transaction failed on-chain")]
    OnChainFailure {
        signature: Signature,
        error: serde_json::Value,
    },
    /// RPC通信障害。ネットワークに受理されたかどうかは不明。
    #[error("RPC通信に失敗しました: {reason}")]
    Transport {
        signature: Option<Signature>,
        reason: String,
    },
    /// POST以外のメソッド
    #[error("Method not allowed")]
    MethodNotAllowed,
    /// 内部エラー（ブロードキャストタスクの異常終了等）
    #[error("内部エラー: {0}")]
    Internal(String),
}

fn format_pubkeys(keys: &[Pubkey]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl RelayError {
    /// エラー分類（レスポンスの`category`）。
    pub fn category(&self) -> &'static str {
        match self {
            RelayError::MissingTransaction => "missing_transaction",
            RelayError::MalformedTransaction(_) => "malformed_transaction",
            RelayError::UnauthorizedFeePayer => "unauthorized_fee_payer",
            RelayError::IncompleteSignatures(_) => "incomplete_signatures",
            RelayError::SigningFailure => "signing_failure",
            RelayError::Rejected { .. } => "rejected_before_submission",
            RelayError::OnChainFailure { .. } => "on_chain_failure",
            RelayError::Transport { .. } => "transport_failure",
            RelayError::MethodNotAllowed => "method_not_allowed",
            RelayError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MissingTransaction
            | RelayError::MalformedTransaction(_)
            | RelayError::UnauthorizedFeePayer
            | RelayError::IncompleteSignatures(_)
            | RelayError::Rejected { .. }
            | RelayError::OnChainFailure { .. } => StatusCode::BAD_REQUEST,
            RelayError::SigningFailure | RelayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RelayError::Transport { .. } => StatusCode::BAD_GATEWAY,
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// 呼び出し側が状態照会に使えるトランザクション署名。
    pub fn signature(&self) -> Option<Signature> {
        match self {
            RelayError::OnChainFailure { signature, .. } => Some(*signature),
            RelayError::Transport { signature, .. } => *signature,
            _ => None,
        }
    }

    /// レスポンス本体を構築する。
    pub fn to_error_response(&self) -> ErrorResponse {
        let details = match self {
            RelayError::OnChainFailure { error, .. } => Some(error.clone()),
            RelayError::Rejected { details, .. } => details.clone(),
            _ => None,
        };
        ErrorResponse {
            error: self.to_string(),
            category: self.category().to_string(),
            signature: self.signature().map(|s| s.to_string()),
            details,
        }
    }
}

impl axum::response::IntoResponse for RelayError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_error_response())).into_response()
    }
}
