//! # 共同署名
//!
//! 認可済みトランザクションのfee payerスロットに運用ウォレットの署名を入れる。
//! 他のスロット（Authority等）の署名には触れない。メッセージ本体は変更しない。

use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

use crate::identity::OperationalIdentity;
use crate::transaction::{AuthorizedTransaction, FEE_PAYER_INDEX};

/// 署名段のエラー。リクエストにとって致命的で、ローカルでは再試行しない。
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("メッセージ本体が空です")]
    EmptyMessage,
    #[error("fee payerの署名スロットがありません")]
    MissingSlot,
    #[error("署名済みトランザクションのシリアライズに失敗: {0}")]
    Serialize(String),
}

/// 運用ウォレットの署名が入ったトランザクション。
/// 他の必須署名が欠けている可能性はある。
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    transaction: Transaction,
}

impl SignedTransaction {
    /// fee payerスロットの署名。ネットワーク上のトランザクション識別子になる。
    pub fn signature(&self) -> Signature {
        self.transaction.signatures[FEE_PAYER_INDEX]
    }

    #[cfg(test)]
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn serialize(&self) -> Result<Vec<u8>, SigningError> {
        bincode::serialize(&self.transaction).map_err(|e| SigningError::Serialize(e.to_string()))
    }
}

/// fee payerスロットに署名する。
///
/// スロットに既に運用ウォレットの有効な署名がある場合は署名し直さない。
pub fn co_sign(
    tx: AuthorizedTransaction,
    identity: &OperationalIdentity,
) -> Result<SignedTransaction, SigningError> {
    let (mut transaction, message_bytes) = tx.into_parts();
    if message_bytes.is_empty() {
        return Err(SigningError::EmptyMessage);
    }

    let pubkey = identity.pubkey();
    let slot = transaction
        .signatures
        .get_mut(FEE_PAYER_INDEX)
        .ok_or(SigningError::MissingSlot)?;

    if slot.verify(pubkey.as_ref(), &message_bytes) {
        tracing::debug!("fee payerスロットは署名済みのため再署名しません");
    } else {
        *slot = identity.sign(&message_bytes);
    }

    Ok(SignedTransaction { transaction })
}
