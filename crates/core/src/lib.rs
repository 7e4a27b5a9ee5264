//! # Remote Signer Core
//!
//! ピアからの呼び出しリクエストを、意味を持つ型付きの操作に変換する。
//!
//! ## 処理フロー
//! 1. メソッド名でリクエストを分類し、パラメータをデコードする（`decoder`）
//! 2. セッションとウォレットの状態から対象ネットワークを解決する（`network`）
//! 3. トークン操作ではメタデータの取得結果を `TokenState` に反映する（`token`）
//!
//! このクレートは同期処理のみを扱う。非同期の取得・署名・状態遷移は
//! `signer-coordinator` が担当する。

pub mod amount;
pub mod decoder;
pub mod erc20;
pub mod network;
pub mod registry;
pub mod token;

pub use amount::{format_ether, format_units};
pub use decoder::{
    classify, DecodedView, MessageView, RequestKind, TransactionParam, TransactionType,
    TransactionView, UnsupportedReason,
};
pub use network::{resolve, NetworkCatalog, NetworkEdit};
pub use registry::SessionRegistry;
pub use token::TokenState;

/// Coreモジュールのエラー型
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// ネットワークカタログが空
    #[error("ネットワークカタログが空です")]
    EmptyCatalog,
}
