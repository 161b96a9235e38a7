//! # 運用ウォレット（Operational Identity）
//!
//! fee payerとして共同署名するサーバー保持のキーペア。
//! 起動時に一度だけ読み込み、プロセス終了まで変更しない。
//! 秘密鍵はメモリ上のみに保持し、ログやレスポンスに出さない。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use base58::FromBase58;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::signer::keypair::{keypair_from_seed, Keypair};
use solana_sdk::signer::Signer;

/// 鍵素材の読み込みエラー。
/// 鍵のバイト列や文字列断片は含めない。
#[derive(Debug, thiserror::Error)]
pub enum KeyMaterialError {
    /// 空文字列
    #[error("鍵素材が空です")]
    Empty,
    /// JSON配列としてもBase58としても解釈できない
    #[error("鍵素材の形式を解釈できません")]
    Unparsable,
    /// 長さが32バイト（seed）でも64バイト（secret || public）でもない
    #[error("鍵素材の長さが不正です: {0} bytes")]
    InvalidLength(usize),
    /// 64バイト形式の公開鍵部分が秘密鍵から導出した公開鍵と一致しない
    #[error("鍵素材の公開鍵部分が秘密鍵と一致しません")]
    PublicKeyMismatch,
}

/// 運用ウォレット。
///
/// 署名操作は鍵を読むだけなので、複数リクエストから同時に呼び出してよい。
pub struct OperationalIdentity {
    keypair: Keypair,
    pubkey: Pubkey,
    signatures_issued: AtomicU64,
}

impl OperationalIdentity {
    pub fn new(keypair: Keypair) -> Self {
        let pubkey = keypair.pubkey();
        Self {
            keypair,
            pubkey,
            signatures_issued: AtomicU64::new(0),
        }
    }

    /// 鍵素材文字列から構築する。
    ///
    /// 受け付ける形式:
    /// - JSON配列 `[12,34,...]`（`solana-keygen`のキーペアファイルと同形式）
    /// - Base58文字列（ウォレットのエクスポート形式）
    ///
    /// 64バイトは `secret(32) || public(32)`、32バイトはseedとして扱う。
    pub fn from_key_material(raw: &str) -> Result<Self, KeyMaterialError> {
        let mut bytes = decode_key_material(raw)?;
        let result = keypair_from_bytes(&bytes);
        bytes.fill(0);
        result.map(Self::new)
    }

    /// 公開鍵（fee payerとして照合される値）。
    pub fn pubkey(&self) -> Pubkey {
        self.pubkey
    }

    /// メッセージ本体に署名する。
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signatures_issued.fetch_add(1, Ordering::Relaxed);
        self.keypair.sign_message(message)
    }

    /// このプロセスで発行した署名の数。
    pub fn signatures_issued(&self) -> u64 {
        self.signatures_issued.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for OperationalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationalIdentity")
            .field("pubkey", &self.pubkey)
            .finish_non_exhaustive()
    }
}

fn decode_key_material(raw: &str) -> Result<Vec<u8>, KeyMaterialError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(KeyMaterialError::Empty);
    }

    if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<u8>>(trimmed).map_err(|_| KeyMaterialError::Unparsable)
    } else {
        trimmed
            .from_base58()
            .map_err(|_| KeyMaterialError::Unparsable)
    }
}

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair, KeyMaterialError> {
    if bytes.len() != 32 && bytes.len() != 64 {
        return Err(KeyMaterialError::InvalidLength(bytes.len()));
    }

    let keypair = keypair_from_seed(&bytes[..32]).map_err(|_| KeyMaterialError::Unparsable)?;

    if bytes.len() == 64 && keypair.pubkey().to_bytes()[..] != bytes[32..] {
        return Err(KeyMaterialError::PublicKeyMismatch);
    }

    Ok(keypair)
}
