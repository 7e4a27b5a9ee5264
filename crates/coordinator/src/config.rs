//! # Coordinator設定・共有状態
//!
//! 環境変数からの設定読み込みと、ホストアプリと共有するウォレット状態。
//!
//! ## 環境変数
//! - `SIGNER_DISMISS_DELAY_MS`: 承認後に画面を閉じるまでの時間（既定1750ms）
//! - `SIGNER_REJECT_UNSUPPORTED`: 未対応リクエストをピアに明示的に拒否するか（既定false）
//! - `SIGNER_RPC_URLS`: `chainId=url` のカンマ区切り

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use signer_core::NetworkCatalog;
use signer_types::Address;

use crate::error::ConfigError;

/// 承認後に画面を閉じるまでの既定の待ち時間（ミリ秒）
pub const DEFAULT_DISMISS_DELAY_MS: u64 = 1750;

/// ユーザー操作による拒否の既定の理由
pub const DEFAULT_REJECT_REASON: &str = "User rejected";

/// 未対応リクエストを拒否するときの既定の理由
pub const DEFAULT_UNSUPPORTED_REASON: &str = "Unsupported request";

/// Coordinatorの動作設定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// 承認後、成功表示から画面を閉じるまでの時間
    pub dismiss_delay: Duration,
    /// 未対応・不正なリクエストをピアに明示的に拒否するか。
    /// falseの場合は画面を閉じるだけでピアには何も送らない。
    pub reject_unsupported: bool,
    /// 未対応リクエストを拒否するときの理由
    pub unsupported_reason: String,
    /// ユーザーが拒否したときの理由
    pub default_reject_reason: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            dismiss_delay: Duration::from_millis(DEFAULT_DISMISS_DELAY_MS),
            reject_unsupported: false,
            unsupported_reason: DEFAULT_UNSUPPORTED_REASON.to_string(),
            default_reject_reason: DEFAULT_REJECT_REASON.to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// 環境変数から設定を読み込む。未設定の項目は既定値。
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("SIGNER_DISMISS_DELAY_MS") {
            let ms = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                name: "SIGNER_DISMISS_DELAY_MS".into(),
                value: raw.clone(),
            })?;
            config.dismiss_delay = Duration::from_millis(ms);
        }

        if let Ok(raw) = std::env::var("SIGNER_REJECT_UNSUPPORTED") {
            config.reject_unsupported = parse_bool("SIGNER_REJECT_UNSUPPORTED", &raw)?;
        }

        Ok(config)
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// RPCエンドポイント
// ---------------------------------------------------------------------------

/// チェーンIDごとのJSON-RPCエンドポイント。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcEndpoints {
    urls: HashMap<u64, String>,
}

impl RpcEndpoints {
    /// `chainId=url,chainId=url` 形式の文字列を解析する。
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut urls = HashMap::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let invalid = || ConfigError::InvalidValue {
                name: "SIGNER_RPC_URLS".into(),
                value: entry.to_string(),
            };
            let (chain, url) = entry.split_once('=').ok_or_else(invalid)?;
            let chain_id = chain.trim().parse::<u64>().map_err(|_| invalid())?;
            let url = url.trim();
            if url.is_empty() {
                return Err(invalid());
            }
            urls.insert(chain_id, url.to_string());
        }
        Ok(Self { urls })
    }

    /// `SIGNER_RPC_URLS` から読み込む。未設定なら空。
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var("SIGNER_RPC_URLS") {
            Ok(raw) => Self::parse(&raw),
            Err(_) => Ok(Self::default()),
        }
    }

    /// カタログの各ネットワークの先頭のRPC URLを使う。
    pub fn from_catalog(catalog: &NetworkCatalog) -> Self {
        let urls = catalog
            .iter()
            .filter_map(|n| n.rpc_urls.first().map(|url| (n.chain_id, url.clone())))
            .collect();
        Self { urls }
    }

    /// `other` の設定で上書きする。
    pub fn merge(&mut self, other: RpcEndpoints) {
        self.urls.extend(other.urls);
    }

    pub fn insert(&mut self, chain_id: u64, url: impl Into<String>) {
        self.urls.insert(chain_id, url.into());
    }

    pub fn url(&self, chain_id: u64) -> Option<&str> {
        self.urls.get(&chain_id).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// ウォレット状態
// ---------------------------------------------------------------------------

/// 現在選択中のアカウントとチェーン。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveWallet {
    /// 選択中のアカウント（ウォレット未作成時はNone）
    pub account: Option<Address>,
    /// 選択中のチェーンID
    pub chain_id: u64,
}

impl Default for ActiveWallet {
    fn default() -> Self {
        Self {
            account: None,
            chain_id: 1,
        }
    }
}

/// ホストアプリとCoordinatorで共有するウォレット状態。
/// ホストアプリがアカウントやチェーンを切り替えると、以降のリクエストに反映される。
#[derive(Debug, Clone, Default)]
pub struct WalletContext {
    inner: Arc<RwLock<ActiveWallet>>,
}

impl WalletContext {
    pub fn new(account: Option<Address>, chain_id: u64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ActiveWallet { account, chain_id })),
        }
    }

    pub fn active_account(&self) -> Option<Address> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).account
    }

    pub fn active_chain_id(&self) -> u64 {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).chain_id
    }

    pub fn set_account(&self, account: Option<Address>) {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).account = account;
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).chain_id = chain_id;
    }
}
