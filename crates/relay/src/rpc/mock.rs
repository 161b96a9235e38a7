//! # モックRPC
//!
//! ネットワークに接続せず、送信結果と確定状況をあらかじめ決めた通りに返す。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

use super::{Commitment, LedgerRpc, RpcError, SignatureStatus};

/// `send_transaction`の振る舞い。
#[derive(Debug, Clone)]
pub enum SendBehavior {
    /// 受理してfee payerスロットの署名を返す（実ノードと同じ）
    Accept,
    /// 指定の署名を返す
    AcceptAs(Signature),
    Reject {
        message: String,
        data: Option<serde_json::Value>,
    },
    ConnectionRefused,
}

/// `signature_status`の振る舞い。
#[derive(Debug, Clone)]
pub enum StatusBehavior {
    /// `pending_polls`回は未認識を返し、その後confirmedで成功
    Confirm { pending_polls: usize },
    /// confirmedに到達したがオンチェーンエラー
    Fail(serde_json::Value),
    /// processedのまま進まない
    StuckProcessed,
    ConnectionRefused,
}

pub struct MockLedgerRpc {
    send: SendBehavior,
    status: StatusBehavior,
    submitted: Mutex<Vec<Vec<u8>>>,
    polls: AtomicUsize,
}

impl MockLedgerRpc {
    pub fn new(send: SendBehavior, status: StatusBehavior) -> Self {
        Self {
            send,
            status,
            submitted: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
        }
    }

    /// 送信と確定がともに成功するモック。
    pub fn confirming() -> Self {
        Self::new(SendBehavior::Accept, StatusBehavior::Confirm { pending_polls: 1 })
    }

    /// 受信した生トランザクション。
    pub fn submitted(&self) -> Vec<Vec<u8>> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    fn status_at(slot: u64, level: Commitment, err: Option<serde_json::Value>) -> SignatureStatus {
        SignatureStatus {
            slot,
            confirmations: Some(1),
            err,
            confirmation_status: Some(level),
        }
    }
}

#[async_trait::async_trait]
impl LedgerRpc for MockLedgerRpc {
    async fn send_transaction(&self, raw: &[u8]) -> Result<Signature, RpcError> {
        match &self.send {
            SendBehavior::Accept => {
                self.submitted.lock().unwrap().push(raw.to_vec());
                let tx: Transaction = bincode::deserialize(raw)
                    .map_err(|e| RpcError::Transport(format!("mock: {e}")))?;
                Ok(tx.signatures[0])
            }
            SendBehavior::AcceptAs(signature) => {
                self.submitted.lock().unwrap().push(raw.to_vec());
                Ok(*signature)
            }
            SendBehavior::Reject { message, data } => Err(RpcError::Rejected {
                code: -32002,
                message: message.clone(),
                data: data.clone(),
            }),
            SendBehavior::ConnectionRefused => {
                Err(RpcError::Transport("RPC送信失敗: connection refused".to_string()))
            }
        }
    }

    async fn signature_status(
        &self,
        _signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst);
        match &self.status {
            StatusBehavior::Confirm { pending_polls } => {
                if poll < *pending_polls {
                    Ok(None)
                } else {
                    Ok(Some(Self::status_at(100, Commitment::Confirmed, None)))
                }
            }
            StatusBehavior::Fail(err) => Ok(Some(Self::status_at(
                100,
                Commitment::Confirmed,
                Some(err.clone()),
            ))),
            StatusBehavior::StuckProcessed => {
                Ok(Some(Self::status_at(100, Commitment::Processed, None)))
            }
            StatusBehavior::ConnectionRefused => {
                Err(RpcError::Transport("connection refused".to_string()))
            }
        }
    }
}
