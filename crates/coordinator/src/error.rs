//! # Coordinator エラー型
//!
//! 署名・チェーンデータ取得・ピアへの送信・設定読み込みのエラー。
//! 署名の失敗は例外ではなく `SigningError` として呼び出し元に返す。

use signer_types::RequestId;

use crate::lifecycle::LifecycleState;

/// `sign` の失敗。いずれの場合もリクエストは終端状態にならない
/// （`Superseded` は既に終端または破棄済み）。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    /// 現在のアカウントがセッションに公開されていない。署名器は呼ばれない。
    #[error("アカウントがセッションで許可されていません")]
    AccountNotAuthorized,
    /// 署名器が署名を返さなかった、またはエラーになった
    #[error("署名に失敗: {0}")]
    SignerFailure(String),
    /// 署名できない状態
    #[error("リクエストの状態が不正です: {0:?}")]
    InvalidState(LifecycleState),
    /// リクエストが閉じられた、拒否された、または新しい世代に置き換えられた
    #[error("リクエストは既に閉じられたか置き換えられました")]
    Superseded,
    /// 該当するリクエストがない
    #[error("不明なリクエスト: {0}")]
    UnknownRequest(RequestId),
    /// 承認済みだがピアへの送信に失敗
    #[error("ピアへの送信に失敗: {0}")]
    Transport(String),
}

/// 署名器のエラー。
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// 署名器内部のエラー
    #[error("署名器でエラーが発生: {0}")]
    Backend(String),
    /// 署名対象のシリアライズ失敗
    #[error("署名対象のシリアライズに失敗: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// チェーンデータ取得のエラー。
#[derive(Debug, thiserror::Error)]
pub enum ChainDataError {
    /// RPCエンドポイントが設定されていないチェーン
    #[error("チェーン {0} のRPCエンドポイントがありません")]
    UnknownChain(u64),
    /// HTTP通信の失敗
    #[error("RPC通信に失敗: {0}")]
    Http(#[from] reqwest::Error),
    /// JSON-RPCのエラー応答
    #[error("RPCエラー: {0}")]
    Rpc(String),
    /// 戻り値のデコード失敗
    #[error("戻り値のデコードに失敗: {0}")]
    Decode(String),
    /// トークンが見つからない
    #[error("トークンが見つかりません: {0}")]
    NotFound(String),
}

/// ピアへの送信のエラー。
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// 送信先のチャネルが閉じている
    #[error("セッションは既に閉じられています")]
    Closed,
    /// その他の送信失敗
    #[error("送信に失敗: {0}")]
    Send(String),
}

/// 設定読み込みのエラー。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 値の形式不正
    #[error("環境変数 {name} の値が不正です: {value}")]
    InvalidValue {
        /// 変数名
        name: String,
        /// 値
        value: String,
    },
}
