//! # リレー設定・共有状態
//!
//! 環境変数からの設定読み込みとリレーの共有状態の定義。
//! 設定は起動時に一度だけ読み込み、以後は変更しない。

use std::sync::Arc;
use std::time::Duration;

use crate::broadcast::{Broadcaster, ConfirmationSettings};
use crate::identity::{KeyMaterialError, OperationalIdentity};
use crate::rpc::{Commitment, LedgerRpc};

/// Solana RPC URLのデフォルト（devnet）
pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";
/// 待ち受けアドレスのデフォルト
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Authority等、fee payer以外の署名者に対する方針。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignerPolicy {
    /// 他の署名が欠けていても共同署名してブロードキャストする
    #[default]
    AllowPartial,
    /// fee payer以外の必須署名がすべて有効な場合のみ受け付ける
    RequireComplete,
}

/// 設定エラー。起動時に致命的。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0}が設定されていません")]
    Missing(&'static str),
    #[error("{name}の値が不正です: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("OPERATIONAL_KEYPAIRが不正です: {0}")]
    KeyMaterial(#[from] KeyMaterialError),
}

/// リレー設定。
#[derive(Debug)]
pub struct RelayConfig {
    /// 運用ウォレット
    pub identity: OperationalIdentity,
    /// Solana RPC URL
    pub rpc_url: String,
    /// RPCリクエスト1回あたりのタイムアウト
    pub rpc_request_timeout: Duration,
    /// preflightシミュレーションを省略するか
    pub skip_preflight: bool,
    /// 確定待ちの設定
    pub confirmation: ConfirmationSettings,
    /// 他署名者への方針
    pub signer_policy: SignerPolicy,
    /// 待ち受けアドレス
    pub bind_addr: String,
}

impl RelayConfig {
    /// 環境変数から構築する。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の参照関数から構築する。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key_material = lookup("OPERATIONAL_KEYPAIR")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("OPERATIONAL_KEYPAIR"))?;
        let identity = OperationalIdentity::from_key_material(&key_material)?;

        let rpc_url = lookup("SOLANA_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());

        let commitment = match lookup("CONFIRM_COMMITMENT") {
            Some(value) => value.parse::<Commitment>().map_err(|_| ConfigError::Invalid {
                name: "CONFIRM_COMMITMENT",
                value,
            })?,
            None => Commitment::Confirmed,
        };

        let defaults = ConfirmationSettings::default();
        let confirmation = ConfirmationSettings {
            commitment,
            timeout: parse_u64(&lookup, "CONFIRM_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            poll_interval: parse_u64(&lookup, "CONFIRM_POLL_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
        };

        let rpc_request_timeout = parse_u64(&lookup, "RPC_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        let signer_policy = if parse_bool(&lookup, "REQUIRE_COSIGNERS")?.unwrap_or(false) {
            SignerPolicy::RequireComplete
        } else {
            SignerPolicy::AllowPartial
        };

        Ok(Self {
            identity,
            rpc_url,
            rpc_request_timeout,
            skip_preflight: parse_bool(&lookup, "SKIP_PREFLIGHT")?.unwrap_or(false),
            confirmation,
            signer_policy,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }
}

fn parse_u64<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or(ConfigError::Invalid { name, value })
        })
        .transpose()
}

fn parse_bool<F>(lookup: &F, name: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value }),
        })
        .transpose()
}

/// リレーの共有状態。
/// 運用ウォレットとRPCハンドルのみを保持し、リクエスト間で可変状態を共有しない。
pub struct RelayState {
    /// 運用ウォレット
    pub identity: Arc<OperationalIdentity>,
    /// ブロードキャスト担当（RPC接続を共有）
    pub broadcaster: Broadcaster,
    /// 他署名者への方針
    pub signer_policy: SignerPolicy,
}

impl RelayState {
    pub fn new(
        identity: OperationalIdentity,
        rpc: Arc<dyn LedgerRpc>,
        confirmation: ConfirmationSettings,
        signer_policy: SignerPolicy,
    ) -> Self {
        Self {
            identity: Arc::new(identity),
            broadcaster: Broadcaster::new(rpc, confirmation),
            signer_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signer::keypair::Keypair;
    use solana_sdk::signer::Signer;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let keypair = Keypair::new();
        let b58 = keypair.to_base58_string();
        let config = RelayConfig::from_lookup(lookup_from(&[("OPERATIONAL_KEYPAIR", b58.as_str())])).unwrap();

        assert_eq!(config.identity.pubkey(), keypair.pubkey());
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.confirmation.commitment, Commitment::Confirmed);
        assert_eq!(config.confirmation.timeout, Duration::from_secs(30));
        assert_eq!(config.confirmation.poll_interval, Duration::from_millis(500));
        assert_eq!(config.signer_policy, SignerPolicy::AllowPartial);
        assert!(!config.skip_preflight);
    }

    #[test]
    fn test_overrides() {
        let keypair = Keypair::new();
        let b58 = keypair.to_base58_string();
        let config = RelayConfig::from_lookup(lookup_from(&[
            ("OPERATIONAL_KEYPAIR", b58.as_str()),
            ("SOLANA_RPC_URL", "http://localhost:8899"),
            ("CONFIRM_COMMITMENT", "finalized"),
            ("CONFIRM_TIMEOUT_SECS", "60"),
            ("CONFIRM_POLL_INTERVAL_MS", "250"),
            ("REQUIRE_COSIGNERS", "true"),
            ("SKIP_PREFLIGHT", "1"),
        ]))
        .unwrap();

        assert_eq!(config.rpc_url, "http://localhost:8899");
        assert_eq!(config.confirmation.commitment, Commitment::Finalized);
        assert_eq!(config.confirmation.timeout, Duration::from_secs(60));
        assert_eq!(config.confirmation.poll_interval, Duration::from_millis(250));
        assert_eq!(config.signer_policy, SignerPolicy::RequireComplete);
        assert!(config.skip_preflight);
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let result = RelayConfig::from_lookup(lookup_from(&[]));
        assert!(matches!(result, Err(ConfigError::Missing("OPERATIONAL_KEYPAIR"))));
    }

    #[test]
    fn test_invalid_key_does_not_echo_material() {
        let bogus = "[1,2,3,4,5,6,7,8]";
        let err = RelayConfig::from_lookup(lookup_from(&[("OPERATIONAL_KEYPAIR", bogus)]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::KeyMaterial(_)));
        assert!(!err.to_string().contains(bogus));
    }

    #[test]
    fn test_invalid_values() {
        let b58 = Keypair::new().to_base58_string();
        let err = RelayConfig::from_lookup(lookup_from(&[
            ("OPERATIONAL_KEYPAIR", b58.as_str()),
            ("CONFIRM_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "CONFIRM_TIMEOUT_SECS", .. }));

        let err = RelayConfig::from_lookup(lookup_from(&[
            ("OPERATIONAL_KEYPAIR", b58.as_str()),
            ("CONFIRM_COMMITMENT", "rooted"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "CONFIRM_COMMITMENT", .. }));
    }
}
