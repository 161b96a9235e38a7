//! # ブロードキャストと確定待ち
//!
//! 署名済みトランザクションをRPCノードに送信し、指定コミットメントに到達するまで
//! 状態をポーリングする。待機には期限があり、期限切れは`Pending`として返す。
//!
//! 送信後の結果はネットワーク上で取り消せないため、ここでは自動再送しない。

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::signature::Signature;

use crate::rpc::{Commitment, LedgerRpc, RpcError};

/// 確定待ちの設定。
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationSettings {
    /// 到達を待つコミットメント
    pub commitment: Commitment,
    /// 待機期限
    pub timeout: Duration,
    /// ポーリング間隔
    pub poll_interval: Duration,
}

impl Default for ConfirmationSettings {
    fn default() -> Self {
        Self {
            commitment: Commitment::Confirmed,
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// 送信の結果。
#[derive(Debug, Clone)]
pub enum SubmissionOutcome {
    /// 指定コミットメントに到達し、エラーなし
    Confirmed { signature: Signature },
    /// 送信は受理されたが期限内に確定しなかった
    Pending { signature: Signature },
    /// 取り込まれたがオンチェーン実行に失敗
    OnChainFailure {
        signature: Signature,
        error: serde_json::Value,
    },
    /// 送信時点でノードに拒否された
    Rejected {
        reason: String,
        details: Option<serde_json::Value>,
    },
    /// 通信障害。署名は割り当てが確認できた場合のみ入る。
    TransportFailure {
        signature: Option<Signature>,
        reason: String,
    },
}

impl SubmissionOutcome {
    #[cfg(test)]
    pub fn signature(&self) -> Option<Signature> {
        match self {
            SubmissionOutcome::Confirmed { signature }
            | SubmissionOutcome::Pending { signature }
            | SubmissionOutcome::OnChainFailure { signature, .. } => Some(*signature),
            SubmissionOutcome::Rejected { .. } => None,
            SubmissionOutcome::TransportFailure { signature, .. } => *signature,
        }
    }

    /// 結果をログに残す。呼び出し元が切断していても必ず記録する。
    pub fn log(&self) {
        match self {
            SubmissionOutcome::Confirmed { signature } => {
                tracing::info!(%signature, "トランザクションが確定しました");
            }
            SubmissionOutcome::Pending { signature } => {
                tracing::warn!(%signature, "確定待ちが期限切れになりました");
            }
            SubmissionOutcome::OnChainFailure { signature, error } => {
                tracing::error!(%signature, on_chain_error = %error, "トランザクションがオンチェーンで失敗しました");
            }
            SubmissionOutcome::Rejected { reason, .. } => {
                tracing::warn!(%reason, "トランザクションが送信時に拒否されました");
            }
            SubmissionOutcome::TransportFailure { signature, reason } => {
                tracing::error!(
                    signature = ?signature.as_ref().map(|s| s.to_string()),
                    %reason,
                    "RPC通信に失敗しました"
                );
            }
        }
    }
}

/// ブロードキャスト担当。RPCハンドルを共有するので複製は安価。
#[derive(Clone)]
pub struct Broadcaster {
    rpc: Arc<dyn LedgerRpc>,
    settings: ConfirmationSettings,
}

impl Broadcaster {
    pub fn new(rpc: Arc<dyn LedgerRpc>, settings: ConfirmationSettings) -> Self {
        Self { rpc, settings }
    }

    pub fn settings(&self) -> &ConfirmationSettings {
        &self.settings
    }

    /// 送信して確定を待つ。
    ///
    /// `expected`はfee payerスロットの署名。ノードが返した署名と一致しなければ
    /// 不正なレスポンスとして通信障害扱いにする。
    pub async fn submit_and_confirm(&self, raw: Vec<u8>, expected: Signature) -> SubmissionOutcome {
        let signature = match self.rpc.send_transaction(&raw).await {
            Ok(signature) => signature,
            Err(RpcError::Rejected { message, data, .. }) => {
                return SubmissionOutcome::Rejected {
                    reason: message,
                    details: data,
                };
            }
            Err(RpcError::Transport(reason)) => {
                return SubmissionOutcome::TransportFailure {
                    signature: None,
                    reason,
                };
            }
        };

        if signature != expected {
            return SubmissionOutcome::TransportFailure {
                signature: Some(expected),
                reason: format!("RPCが想定外の署名を返しました: {signature}"),
            };
        }

        tracing::info!(%signature, "トランザクションを送信しました");
        self.await_confirmation(signature).await
    }

    /// 期限付きで確定を待つ。
    pub async fn await_confirmation(&self, signature: Signature) -> SubmissionOutcome {
        match tokio::time::timeout(self.settings.timeout, self.poll_until_terminal(signature)).await
        {
            Ok(outcome) => outcome,
            Err(_) => SubmissionOutcome::Pending { signature },
        }
    }

    async fn poll_until_terminal(&self, signature: Signature) -> SubmissionOutcome {
        let target = self.settings.commitment;
        loop {
            match self.rpc.signature_status(&signature).await {
                Ok(Some(status)) if status.reached(target) => {
                    return match status.err {
                        None => SubmissionOutcome::Confirmed { signature },
                        Some(error) => SubmissionOutcome::OnChainFailure { signature, error },
                    };
                }
                Ok(Some(status)) => {
                    tracing::debug!(
                        %signature,
                        slot = status.slot,
                        level = ?status.confirmation_status,
                        "確定待ち"
                    );
                }
                Ok(None) => {
                    tracing::debug!(%signature, "ノードが署名をまだ認識していません");
                }
                Err(e) => {
                    return SubmissionOutcome::TransportFailure {
                        signature: Some(signature),
                        reason: e.to_string(),
                    };
                }
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}
