//! # ネットワーク解決
//!
//! セッションとリクエストの情報から、リクエストの対象ネットワークを決める。
//!
//! ## 解決順序（最初に一致したものを採用）
//! 1. リクエストが明示したチェーンID（カタログに存在する場合）
//! 2. ウォレットで現在選択中のチェーンID（セッションで許可されている場合）
//! 3. セッションの許可チェーンのうち、カタログに存在する最初のもの
//! 4. カタログの先頭（無条件のフォールバック）
//!
//! 4.はセッションで許可されていないチェーンを選ぶ可能性がある。
//! その場合 `TargetNetwork::authorized` はfalseになる。

use signer_types::{Network, Session, TargetNetwork};

use crate::registry::SessionRegistry;
use crate::CoreError;

/// 空でないネットワーク一覧。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkCatalog {
    networks: Vec<Network>,
}

impl NetworkCatalog {
    /// ネットワーク一覧からカタログを作る。空の場合はエラー。
    pub fn new(networks: Vec<Network>) -> Result<Self, CoreError> {
        if networks.is_empty() {
            return Err(CoreError::EmptyCatalog);
        }
        Ok(Self { networks })
    }

    /// 組み込みの公開ネットワーク一覧。先頭はEthereumメインネット。
    pub fn public() -> Self {
        let entry = |chain_id: u64, network: &str, symbol: &str, color: &str, explorer: &str| Network {
            chain_id,
            network: network.to_string(),
            symbol: symbol.to_string(),
            color: color.to_string(),
            explorer: explorer.to_string(),
            rpc_urls: Vec::new(),
            is_user_added: false,
        };

        Self {
            networks: vec![
                entry(1, "Ethereum", "ETH", "#6186ff", "https://etherscan.io"),
                entry(10, "Optimism", "ETH", "#FF0420", "https://optimistic.etherscan.io"),
                entry(56, "BNB Chain", "BNB", "#f3ba2f", "https://bscscan.com"),
                entry(100, "Gnosis", "xDAI", "#48A9A6", "https://gnosisscan.io"),
                entry(137, "Polygon", "MATIC", "#8247E5", "https://polygonscan.com"),
                entry(250, "Fantom", "FTM", "#13b5ec", "https://ftmscan.com"),
                entry(42161, "Arbitrum", "ETH", "#28a0f0", "https://arbiscan.io"),
                entry(43114, "Avalanche", "AVAX", "#E84142", "https://snowtrace.io"),
            ],
        }
    }

    /// チェーンIDでネットワークを探す。
    pub fn find(&self, chain_id: u64) -> Option<&Network> {
        self.networks.iter().find(|n| n.chain_id == chain_id)
    }

    /// 先頭のネットワーク。カタログは空にならないので常に存在する。
    pub fn first(&self) -> &Network {
        &self.networks[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Network> {
        self.networks.iter()
    }

    /// ユーザーが追加したネットワークをカタログに加える。既存のチェーンIDは置き換える。
    pub fn upsert(&mut self, network: Network) {
        match self.networks.iter_mut().find(|n| n.chain_id == network.chain_id) {
            Some(existing) => *existing = network,
            None => self.networks.push(network),
        }
    }
}

/// リクエストの対象ネットワークを解決する。失敗しない。
///
/// 表示色と通貨記号が必要なため、カタログにないチェーンはどの段階でも選ばれない。
pub fn resolve(
    session: &Session,
    explicit_chain_id: Option<u64>,
    current_active_chain_id: u64,
    catalog: &NetworkCatalog,
) -> TargetNetwork {
    let registry = SessionRegistry::new(session);

    let network = explicit_chain_id
        .and_then(|id| catalog.find(id))
        .or_else(|| {
            registry
                .has_chain(current_active_chain_id)
                .then(|| catalog.find(current_active_chain_id))
                .flatten()
        })
        .or_else(|| {
            registry
                .enabled_chain_ids()
                .iter()
                .find_map(|id| catalog.find(*id))
        })
        .unwrap_or_else(|| catalog.first());

    TargetNetwork {
        chain_id: network.chain_id,
        color: network.color.clone(),
        symbol: network.symbol.clone(),
        authorized: registry.has_chain(network.chain_id),
    }
}

// ---------------------------------------------------------------------------
// ネットワーク追加時の編集
// ---------------------------------------------------------------------------

/// ネットワーク追加画面で編集される項目。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkEdit {
    /// 通貨シンボル
    pub symbol: String,
    /// カンマ区切りのRPC URL
    pub rpc_urls: String,
    /// エクスプローラURL
    pub explorer: String,
}

impl NetworkEdit {
    /// 既存のネットワークから編集項目を初期化する。
    ///
    /// ネットワーク自身がRPC URLを持たない場合は `default_rpc_urls` を使い、
    /// infura.io / alchemyapi.io のURLは末尾のAPIキーのパスを取り除いて表示する。
    pub fn from_network(network: &Network, default_rpc_urls: &[String]) -> Self {
        let rpc_urls = if network.rpc_urls.is_empty() {
            default_rpc_urls
                .iter()
                .map(|url| redact_api_key(url))
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            network.rpc_urls.join(", ")
        };

        Self {
            symbol: network.symbol.clone(),
            rpc_urls,
            explorer: network.explorer.clone(),
        }
    }

    /// 全項目が入力済みか。
    pub fn is_complete(&self) -> bool {
        !self.symbol.trim().is_empty()
            && !self.explorer.trim().is_empty()
            && !self.rpc_list().is_empty()
    }

    /// 編集内容を正規化してネットワークに反映した複製を返す。
    pub fn apply(&self, network: &Network) -> Network {
        Network {
            symbol: self.symbol.trim().to_uppercase(),
            rpc_urls: self.rpc_list(),
            explorer: self.explorer.trim().to_string(),
            ..network.clone()
        }
    }

    fn rpc_list(&self) -> Vec<String> {
        self.rpc_urls
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn redact_api_key(url: &str) -> String {
    if !(url.contains("infura.io") || url.contains("alchemyapi.io")) {
        return url.to_string();
    }
    match url.rfind('/') {
        Some(idx) => url[..idx].to_string(),
        None => url.to_string(),
    }
}
