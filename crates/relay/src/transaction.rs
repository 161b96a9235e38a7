//! # トランザクションのデコードと検証
//!
//! Base64で受け取ったレガシー形式のSolanaトランザクションをデコードし、
//! fee payerが運用ウォレットであることを確認する。
//!
//! 命令の意味やアカウント残高はここでは検証しない。それらはブロードキャスト時に
//! ネットワーク（preflightシミュレーション）が判定する。

use base64::Engine;
use bincode::Options;
use solana_sdk::packet::PACKET_DATA_SIZE;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

/// fee payerはアカウントテーブルの先頭。
pub const FEE_PAYER_INDEX: usize = 0;

/// Base64エンジン（Standard）
pub(crate) fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// デコードエラー。いずれもリクエストの`MalformedTransaction`になる。
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Base64デコードに失敗: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("トランザクションが空です")]
    Empty,
    #[error("トランザクションがパケットサイズ上限を超えています: {0} bytes")]
    TooLarge(usize),
    #[error("トランザクションのデシリアライズに失敗: {0}")]
    Deserialize(String),
    #[error("トランザクション構造が不正: {0}")]
    Structure(String),
}

/// fee payerが運用ウォレットと一致しない。
#[derive(Debug, thiserror::Error)]
#[error("fee payer {fee_payer} は運用ウォレット {expected} ではありません")]
pub struct UnauthorizedFeePayer {
    pub fee_payer: Pubkey,
    pub expected: Pubkey,
}

/// デコード済み・未認可のトランザクション。
#[derive(Debug, Clone)]
pub struct InboundTransaction {
    transaction: Transaction,
    /// 署名対象のメッセージ本体。デコード時に一度だけ確定させる。
    message_bytes: Vec<u8>,
}

impl InboundTransaction {
    pub fn decode_base64(encoded: &str) -> Result<Self, DecodeError> {
        let bytes = b64().decode(encoded.trim())?;
        Self::decode(&bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        if bytes.len() > PACKET_DATA_SIZE {
            return Err(DecodeError::TooLarge(bytes.len()));
        }

        let transaction: Transaction = bincode::options()
            .with_limit(PACKET_DATA_SIZE as u64)
            .with_fixint_encoding()
            .reject_trailing_bytes()
            .deserialize(bytes)
            .map_err(|e| DecodeError::Deserialize(e.to_string()))?;

        check_structure(&transaction)?;

        let message_bytes = transaction.message.serialize();
        Ok(Self {
            transaction,
            message_bytes,
        })
    }

    pub fn fee_payer(&self) -> &Pubkey {
        &self.transaction.message.account_keys[FEE_PAYER_INDEX]
    }

    pub fn account_keys(&self) -> &[Pubkey] {
        &self.transaction.message.account_keys
    }

    /// 署名スロット。未署名（全ゼロ）のスロットは`None`。
    pub fn signature_slots(&self) -> Vec<Option<&Signature>> {
        let empty = Signature::default();
        self.transaction
            .signatures
            .iter()
            .map(|sig| if *sig == empty { None } else { Some(sig) })
            .collect()
    }

    pub fn message_bytes(&self) -> &[u8] {
        &self.message_bytes
    }

    /// fee payerが運用ウォレットであることを確認する。
    /// これが唯一の受付条件であり、署名より前に必ず通す。
    pub fn authorize(self, operational: &Pubkey) -> Result<AuthorizedTransaction, UnauthorizedFeePayer> {
        let fee_payer = *self.fee_payer();
        if fee_payer != *operational {
            return Err(UnauthorizedFeePayer {
                fee_payer,
                expected: *operational,
            });
        }
        Ok(AuthorizedTransaction { inner: self })
    }
}

/// fee payerの照合を通過したトランザクション。署名段はこの型しか受け取らない。
#[derive(Debug, Clone)]
pub struct AuthorizedTransaction {
    inner: InboundTransaction,
}

impl AuthorizedTransaction {
    /// fee payer以外の必須署名者のうち、有効な署名が付いていないもの。
    pub fn missing_cosigners(&self) -> Vec<Pubkey> {
        let message = self.inner.message_bytes();
        self.inner
            .signature_slots()
            .into_iter()
            .zip(self.inner.account_keys())
            .skip(FEE_PAYER_INDEX + 1)
            .filter(|(slot, key)| match slot {
                Some(sig) => !sig.verify(key.as_ref(), message),
                None => true,
            })
            .map(|(_, key)| *key)
            .collect()
    }

    pub(crate) fn into_parts(self) -> (Transaction, Vec<u8>) {
        (self.inner.transaction, self.inner.message_bytes)
    }
}

/// ネットワークの事前検査と同等の構造チェック。
fn check_structure(tx: &Transaction) -> Result<(), DecodeError> {
    let header = &tx.message.header;
    let num_keys = tx.message.account_keys.len();
    let num_required = header.num_required_signatures as usize;

    if num_required == 0 {
        return Err(DecodeError::Structure("必須署名者がいません".to_string()));
    }
    if header.num_readonly_signed_accounts >= header.num_required_signatures {
        return Err(DecodeError::Structure(
            "fee payerが書き込み可能な署名者ではありません".to_string(),
        ));
    }
    if num_required + header.num_readonly_unsigned_accounts as usize > num_keys {
        return Err(DecodeError::Structure(format!(
            "ヘッダーがアカウントテーブル({num_keys}件)と矛盾しています"
        )));
    }
    if tx.signatures.len() != num_required {
        return Err(DecodeError::Structure(format!(
            "署名数 {} が必須署名者数 {} と一致しません",
            tx.signatures.len(),
            num_required
        )));
    }

    for (i, ix) in tx.message.instructions.iter().enumerate() {
        let program_index = ix.program_id_index as usize;
        if program_index == FEE_PAYER_INDEX || program_index >= num_keys {
            return Err(DecodeError::Structure(format!(
                "命令{i}のプログラムインデックス {program_index} が不正です"
            )));
        }
        if let Some(bad) = ix.accounts.iter().find(|&&a| a as usize >= num_keys) {
            return Err(DecodeError::Structure(format!(
                "命令{i}のアカウントインデックス {bad} が範囲外です"
            )));
        }
    }

    Ok(())
}
