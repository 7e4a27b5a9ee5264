//! # Remote Signer 共有型定義
//!
//! ピア（接続中のdApp）とウォレットの間でやり取りされるデータ構造を
//! Rust構造体として提供する。
//!
//! ## エンコーディング規則
//! - アドレス: `0x`プレフィックス付きhex（チェックサム有無は問わない）
//! - 金額: 最小単位の整数（U256）。hex文字列・10進文字列の両方を受け付ける

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use alloy_primitives::{Address, U256};

// ---------------------------------------------------------------------------
// セッション
// ---------------------------------------------------------------------------

/// 接続先ピアのメタデータ。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerMeta {
    /// アプリ名
    pub name: String,
    /// アプリの説明
    pub description: String,
    /// アイコンURL
    pub icon_url: String,
    /// アプリのURL
    pub url: String,
}

/// ウォレットと1つのピアとの間の認可済みの関係。
///
/// トランスポート側が所有し、コアはリクエストの処理中に読み取り専用で参照する。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// ピアに公開しているアカウント
    pub accounts: HashSet<Address>,
    /// ピアが使用を許可されたチェーンID（順序に意味がある）
    pub enabled_chain_ids: Vec<u64>,
    /// ピアのメタデータ
    #[serde(default)]
    pub peer_meta: PeerMeta,
}

// ---------------------------------------------------------------------------
// 呼び出しリクエスト
// ---------------------------------------------------------------------------

/// 保留中リクエストの識別子。同じ値が再利用されることはない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ピアから届いた呼び出しリクエスト。
///
/// `params`は型付けされていないJSON値の列で、解釈はデコーダが行う。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingRequest {
    /// リクエストID
    pub id: RequestId,
    /// メソッド名（例: "personal_sign"）
    pub method: String,
    /// パラメータ列
    #[serde(default)]
    pub params: Vec<serde_json::Value>,
    /// リクエストが明示したチェーンID（存在する場合）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

// ---------------------------------------------------------------------------
// ネットワーク
// ---------------------------------------------------------------------------

/// ウォレットが扱うネットワークの定義。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// チェーンID
    pub chain_id: u64,
    /// 表示名
    pub network: String,
    /// ネイティブ通貨のシンボル
    pub symbol: String,
    /// 表示色（`#rrggbb`）
    pub color: String,
    /// ブロックエクスプローラのURL
    pub explorer: String,
    /// RPCエンドポイント
    #[serde(default)]
    pub rpc_urls: Vec<String>,
    /// ユーザーが追加したネットワークか
    #[serde(default)]
    pub is_user_added: bool,
}

/// リクエストの対象として解決されたネットワーク。永続化はしない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetNetwork {
    /// チェーンID
    pub chain_id: u64,
    /// 表示色
    pub color: String,
    /// ネイティブ通貨のシンボル
    pub symbol: String,
    /// セッションで許可されたチェーンか。
    /// カタログ先頭へのフォールバック時はfalseになり得る。
    pub authorized: bool,
}

// ---------------------------------------------------------------------------
// ピア宛てメッセージ
// ---------------------------------------------------------------------------

/// ピアへ送る応答。1つのリクエストIDにつき高々1回だけ送られる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerMessage {
    /// 承認（署名またはトランザクションハッシュ）
    Approve {
        /// リクエストID
        id: RequestId,
        /// 結果
        result: String,
    },
    /// 拒否
    Reject {
        /// リクエストID
        id: RequestId,
        /// 拒否理由
        reason: String,
    },
}

impl PeerMessage {
    /// 対象のリクエストIDを返す。
    pub fn id(&self) -> RequestId {
        match self {
            PeerMessage::Approve { id, .. } | PeerMessage::Reject { id, .. } => *id,
        }
    }
}

// ---------------------------------------------------------------------------
// トークン
// ---------------------------------------------------------------------------

/// チェーンから取得したERC-20トークンの情報（アセット追加の確認用）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// コントラクトアドレス
    pub contract: Address,
    /// トークン名
    pub name: String,
    /// シンボル
    pub symbol: String,
    /// 小数点以下の桁数
    pub decimals: u8,
    /// 所有者の残高（最小単位）
    pub balance: U256,
}
