//! # チェーンデータ取得の抽象化
//!
//! トークンのメタデータ（decimals・symbol・name・残高）をチェーンから読み出す。
//! Coordinatorはtransfer/approveの表示補完とトークン追加の提案に使う。
//!
//! 現在の実装:
//! - `rpc`: JSON-RPC `eth_call`（reqwest）
//! - `mock`: メモリ内の固定データ（テスト・オフライン用）

pub mod mock;
pub mod rpc;

use async_trait::async_trait;

use signer_types::{Address, U256};

use crate::error::ChainDataError;

/// トークンメタデータの取得元。
#[async_trait]
pub trait ChainDataProvider: Send + Sync {
    /// `decimals()` を取得する。
    async fn token_decimals(&self, chain_id: u64, contract: &Address) -> Result<u8, ChainDataError>;

    /// `symbol()` を取得する。
    async fn token_symbol(&self, chain_id: u64, contract: &Address)
        -> Result<String, ChainDataError>;

    /// `name()` を取得する。
    async fn token_name(&self, chain_id: u64, contract: &Address) -> Result<String, ChainDataError>;

    /// `balanceOf(owner)` を取得する。
    async fn token_balance(
        &self,
        chain_id: u64,
        contract: &Address,
        owner: &Address,
    ) -> Result<U256, ChainDataError>;
}
