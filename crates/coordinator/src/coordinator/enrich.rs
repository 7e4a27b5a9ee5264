//! トークン情報の補完とトークン追加の提案。

use std::future::Future;
use std::sync::Arc;

use signer_types::{Address, TokenMetadata, U256};

use super::SigningCoordinator;
use crate::error::ChainDataError;
use crate::events::UiEvent;
use crate::lifecycle::{LifecycleCell, TokenUpdate};

impl SigningCoordinator {
    /// decimalsとsymbolを別々のタスクで取得する。
    /// 結果はセルの更新経路を通して1つずつ反映され、取得順は問わない。
    pub(super) fn spawn_enrichment(&self, cell: &Arc<LifecycleCell>, contract: Address) {
        let chain_id = cell.network().chain_id;

        let provider = Arc::clone(&self.shared.collaborators.chain_data);
        self.spawn_token_fetch(cell, "decimals", async move {
            provider
                .token_decimals(chain_id, &contract)
                .await
                .map(TokenUpdate::Decimals)
        });

        let provider = Arc::clone(&self.shared.collaborators.chain_data);
        self.spawn_token_fetch(cell, "symbol", async move {
            provider
                .token_symbol(chain_id, &contract)
                .await
                .map(TokenUpdate::Symbol)
        });
    }

    fn spawn_token_fetch<F>(&self, cell: &Arc<LifecycleCell>, field: &'static str, fetch: F)
    where
        F: Future<Output = Result<TokenUpdate, ChainDataError>> + Send + 'static,
    {
        let target = Arc::clone(cell);
        let task = tokio::spawn(async move {
            let handle = target.handle();
            match fetch.await {
                Ok(update) => {
                    if !target.apply_token(update) {
                        tracing::debug!(
                            id = %handle.id,
                            generation = handle.generation,
                            field,
                            "トークン情報を反映しませんでした（破棄済みまたは反映済み）"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(id = %handle.id, field, error = %e, "トークン情報の取得に失敗しました");
                }
            }
        });
        cell.track_task(task.abort_handle());
    }

    /// トークン追加の確認画面を開く。
    ///
    /// name・symbol・decimals・残高を並行して取得する。`owner` が未指定なら
    /// 現在のアカウントの残高を使い、アカウントもなければ残高は0とする。
    pub async fn propose_asset(
        &self,
        chain_id: u64,
        contract: Address,
        owner: Option<Address>,
    ) -> Result<TokenMetadata, ChainDataError> {
        let provider = &self.shared.collaborators.chain_data;
        let owner = owner.or_else(|| self.shared.wallet.active_account());
        let balance = async {
            match owner {
                Some(owner) => provider.token_balance(chain_id, &contract, &owner).await,
                None => Ok(U256::ZERO),
            }
        };

        let (name, symbol, decimals, balance) = tokio::try_join!(
            provider.token_name(chain_id, &contract),
            provider.token_symbol(chain_id, &contract),
            provider.token_decimals(chain_id, &contract),
            balance,
        )?;

        let token = TokenMetadata {
            contract,
            name,
            symbol,
            decimals,
            balance,
        };
        tracing::info!(chain_id, %contract, symbol = %token.symbol, "トークン追加を提案します");
        self.publish(UiEvent::OpenAddAsset {
            chain_id,
            token: token.clone(),
        });
        Ok(token)
    }
}
