//! # メモリ内チェーンデータ
//!
//! 登録済みのトークンだけを返す。遅延を設定すると、メタデータ取得と
//! リクエストの破棄・拒否が競合する状況を再現できる。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use signer_types::{Address, TokenMetadata, U256};

use super::ChainDataProvider;
use crate::error::ChainDataError;

/// 固定データのチェーンデータ取得。
#[derive(Debug, Default)]
pub struct StaticChainData {
    tokens: HashMap<(u64, Address), TokenMetadata>,
    decimals_delay: Duration,
    symbol_delay: Duration,
    calls: AtomicUsize,
}

impl StaticChainData {
    pub fn new() -> Self {
        Self::default()
    }

    /// トークンを登録する。
    pub fn with_token(mut self, chain_id: u64, metadata: TokenMetadata) -> Self {
        self.tokens.insert((chain_id, metadata.contract), metadata);
        self
    }

    /// decimals・symbolの応答を遅らせる。
    pub fn with_delays(mut self, decimals: Duration, symbol: Duration) -> Self {
        self.decimals_delay = decimals;
        self.symbol_delay = symbol;
        self
    }

    /// これまでの呼び出し回数。
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn lookup(
        &self,
        chain_id: u64,
        contract: &Address,
        delay: Duration,
    ) -> Result<&TokenMetadata, ChainDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.tokens
            .get(&(chain_id, *contract))
            .ok_or_else(|| ChainDataError::NotFound(contract.to_string()))
    }
}

#[async_trait]
impl ChainDataProvider for StaticChainData {
    async fn token_decimals(&self, chain_id: u64, contract: &Address) -> Result<u8, ChainDataError> {
        Ok(self.lookup(chain_id, contract, self.decimals_delay).await?.decimals)
    }

    async fn token_symbol(
        &self,
        chain_id: u64,
        contract: &Address,
    ) -> Result<String, ChainDataError> {
        Ok(self.lookup(chain_id, contract, self.symbol_delay).await?.symbol.clone())
    }

    async fn token_name(&self, chain_id: u64, contract: &Address) -> Result<String, ChainDataError> {
        Ok(self.lookup(chain_id, contract, Duration::ZERO).await?.name.clone())
    }

    async fn token_balance(
        &self,
        chain_id: u64,
        contract: &Address,
        _owner: &Address,
    ) -> Result<U256, ChainDataError> {
        Ok(self.lookup(chain_id, contract, Duration::ZERO).await?.balance)
    }
}
