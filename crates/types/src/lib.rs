//! # Cosign Relay 共有型定義
//!
//! フロントエンドとリレー間でやり取りするリクエスト/レスポンスの構造体。
//!
//! ## エンコーディング規則
//! - Base58: Solanaアドレス、公開鍵、トランザクション署名
//! - Base64: シリアライズ済みトランザクション

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// POST /api/sign-transaction
// ---------------------------------------------------------------------------

/// 署名代行リクエスト。
///
/// フロントエンドが構築し、Authorityが先に部分署名したトランザクションを運ぶ。
/// フィールド欠落は400として扱うため、デシリアライズ段階では`Option`で受ける。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignTransactionRequest {
    /// Base64エンコードされたレガシー形式トランザクション
    #[serde(rename = "transactionBase64", default)]
    pub transaction_base64: Option<String>,
}

/// 署名代行の成功レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignTransactionResponse {
    /// Base58エンコードされたトランザクション署名（ネットワーク上の識別子）
    pub signature: String,
    /// 確定状況
    pub status: SubmissionStatus,
}

/// 成功レスポンスで返す確定状況。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// 指定コミットメントに到達し、オンチェーンエラーなし
    Confirmed,
    /// 送信は受理されたが期限内に確定しなかった。呼び出し側が後で状態を照会する。
    Pending,
}

// ---------------------------------------------------------------------------
// エラーレスポンス
// ---------------------------------------------------------------------------

/// 失敗時のレスポンス本体。
///
/// `error` はフロントエンドがそのまま表示する人間向けメッセージ。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 人間向けメッセージ
    pub error: String,
    /// エラー分類（snake_case）
    pub category: String,
    /// 割り当て済みのトランザクション署名（存在する場合のみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// オンチェーンエラーやRPCエラーの詳細（加工せずに転送）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// GET /api/operational-identity
// ---------------------------------------------------------------------------

/// 運用ウォレットの公開情報。
/// フロントエンドはこの公開鍵をfee payerに設定してトランザクションを構築する。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationalIdentityResponse {
    /// Base58エンコードされた運用ウォレット公開鍵
    pub pubkey: String,
}
