//! # JSON-RPC over HTTP 実装
//!
//! `sendTransaction` / `getSignatureStatuses` を直接JSON-RPCで呼び出す。
//! HTTPクライアントはプロセス全体で1つを共有する（接続プール）。

use std::str::FromStr;

use base64::Engine;
use serde::Deserialize;
use solana_sdk::signature::Signature;

use super::{Commitment, LedgerRpc, RpcError, SignatureStatus};
use crate::transaction::b64;

/// `sendTransaction`のオプション。
#[derive(Debug, Clone, Copy)]
pub struct SendOptions {
    /// preflightシミュレーションを省略するか
    pub skip_preflight: bool,
    /// preflightで使用するコミットメント
    pub preflight_commitment: Commitment,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            preflight_commitment: Commitment::Confirmed,
        }
    }
}

/// ノードが遅延・同期中で応答できないときのエラーコード。
const NODE_UNHEALTHY: i64 = -32005;

/// HTTP JSON-RPCクライアント。
pub struct HttpLedgerRpc {
    http_client: reqwest::Client,
    url: String,
    send_options: SendOptions,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RpcContextValue<T> {
    value: T,
}

impl HttpLedgerRpc {
    pub fn new(http_client: reqwest::Client, url: impl Into<String>, send_options: SendOptions) -> Self {
        Self {
            http_client,
            url: url.into(),
            send_options,
        }
    }

    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        let rpc_request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let rpc_response = self
            .http_client
            .post(&self.url)
            .json(&rpc_request)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("RPC送信失敗: {e}")))?;

        let status = rpc_response.status();
        if !status.is_success() {
            // レート制限やゲートウェイ障害。本文にJSON-RPCエラーがあっても送信拒否ではない
            let body = rpc_response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<JsonRpcResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .map(|e| format!("{} (code {})", e.message, e.code))
                .unwrap_or(body);
            return Err(RpcError::Transport(format!("RPCがHTTP {status}を返しました: {detail}")));
        }

        let rpc_body: JsonRpcResponse = rpc_response.json().await.map_err(|e| {
            RpcError::Transport(format!("RPCレスポンスのパースに失敗 (HTTP {status}): {e}"))
        })?;

        if let Some(error) = rpc_body.error {
            if error.code == NODE_UNHEALTHY {
                return Err(RpcError::Transport(format!(
                    "RPCノードが利用できません: {} (code {})",
                    error.message, error.code
                )));
            }
            return Err(RpcError::Rejected {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        rpc_body
            .result
            .ok_or_else(|| RpcError::Transport("RPCレスポンスにresultがありません".to_string()))
    }
}

#[async_trait::async_trait]
impl LedgerRpc for HttpLedgerRpc {
    async fn send_transaction(&self, raw: &[u8]) -> Result<Signature, RpcError> {
        let params = serde_json::json!([
            b64().encode(raw),
            {
                "encoding": "base64",
                "skipPreflight": self.send_options.skip_preflight,
                "preflightCommitment": self.send_options.preflight_commitment.as_str(),
            }
        ]);

        let result = self.call("sendTransaction", params).await?;
        let signature = result
            .as_str()
            .ok_or_else(|| RpcError::Transport(format!("resultが文字列ではありません: {result}")))?;

        Signature::from_str(signature)
            .map_err(|e| RpcError::Transport(format!("署名のパースに失敗: {e}")))
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        let params = serde_json::json!([
            [signature.to_string()],
            { "searchTransactionHistory": false }
        ]);

        let result = match self.call("getSignatureStatuses", params).await {
            Ok(result) => result,
            Err(RpcError::Rejected { code, message, .. }) => {
                return Err(RpcError::Transport(format!(
                    "getSignatureStatusesがエラーを返しました: {message} (code {code})"
                )));
            }
            Err(e) => return Err(e),
        };

        let statuses: RpcContextValue<Vec<Option<SignatureStatus>>> =
            serde_json::from_value(result).map_err(|e| {
                RpcError::Transport(format!("getSignatureStatusesのパースに失敗: {e}"))
            })?;

        Ok(statuses.value.into_iter().next().flatten())
    }
}
