//! # SigningCoordinator
//!
//! ピアからの呼び出しリクエストを受け付け、デコード・ネットワーク解決・
//! トークン情報の補完を経てユーザーの確認を待ち、署名器の結果に応じて
//! ピアへ承認または拒否を1回だけ送る。
//!
//! 保留中のリクエストはアリーナ（`RequestId` → セル）に置かれ、受付ごとに
//! 単調増加の世代番号が振られる。非同期処理の完了時にはセルの破棄状態を
//! 確認し、古い世代の結果は捨てる。

mod enrich;
mod sign;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use signer_core::{classify, resolve, DecodedView, NetworkCatalog};
use signer_types::{IncomingRequest, Network, RequestId, Session, TargetNetwork};

use crate::chain_data::ChainDataProvider;
use crate::config::{CoordinatorConfig, WalletContext};
use crate::events::{UiEvent, UiSender};
use crate::lifecycle::{
    LifecycleCell, LifecycleHandle, LifecycleState, Subscription, SubscriptionId,
};
use crate::signer::SigningCapability;
use crate::transport::SessionTransport;

pub use sign::Approval;

/// Coordinatorに注入する外部機能。
#[derive(Clone)]
pub struct Collaborators {
    /// 署名器
    pub signer: Arc<dyn SigningCapability>,
    /// トークン情報の取得元
    pub chain_data: Arc<dyn ChainDataProvider>,
    /// ピアへの応答送信
    pub transport: Arc<dyn SessionTransport>,
    /// UI通知の送信先
    pub ui: UiSender,
}

struct Shared {
    session: Arc<Session>,
    catalog: RwLock<NetworkCatalog>,
    wallet: WalletContext,
    collaborators: Collaborators,
    config: CoordinatorConfig,
    arena: Mutex<HashMap<RequestId, Arc<LifecycleCell>>>,
    next_generation: AtomicU64,
}

/// 1つのセッションの呼び出しリクエストを調停する。
///
/// クローンは同じアリーナを共有する。
#[derive(Clone)]
pub struct SigningCoordinator {
    shared: Arc<Shared>,
}

impl SigningCoordinator {
    pub fn new(
        session: Arc<Session>,
        catalog: NetworkCatalog,
        wallet: WalletContext,
        collaborators: Collaborators,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                session,
                catalog: RwLock::new(catalog),
                wallet,
                collaborators,
                config,
                arena: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    pub fn session(&self) -> &Session {
        &self.shared.session
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    /// リクエストを受け付ける。
    ///
    /// デコードとネットワーク解決は同期的に行い、確認画面の通知を送る。
    /// transfer/approveの場合はdecimalsとsymbolの取得をバックグラウンドで開始する。
    /// 処理できないリクエストは `Rejected` にして破棄する。
    pub async fn begin(&self, request: IncomingRequest) -> LifecycleHandle {
        let generation = self.shared.next_generation.fetch_add(1, Ordering::SeqCst);
        let network = {
            let catalog = self.catalog();
            resolve(
                &self.shared.session,
                request.chain_id,
                self.shared.wallet.active_chain_id(),
                &catalog,
            )
        };
        if !network.authorized {
            tracing::warn!(
                id = %request.id,
                chain_id = network.chain_id,
                "セッションで許可されていないネットワークにフォールバックしました"
            );
        }

        let cell = Arc::new(LifecycleCell::new(generation, request, network));
        let handle = cell.handle();
        tracing::info!(
            id = %handle.id,
            generation,
            method = %cell.request().method,
            "リクエストを受け付けました"
        );

        let previous = self.arena().insert(handle.id, Arc::clone(&cell));
        if let Some(previous) = previous {
            if previous.close() {
                tracing::debug!(
                    id = %handle.id,
                    generation = previous.generation(),
                    "同じIDの古いリクエストを破棄しました"
                );
            }
        }

        // 挿入直後で他から参照されていないため、遷移は失敗しない
        let _ = cell.transition(|s| s == LifecycleState::Pending, LifecycleState::Decoding);
        let view = classify(cell.request());

        match view {
            DecodedView::Unsupported(reason) => {
                tracing::info!(id = %handle.id, %reason, "処理できないリクエストを閉じます");
                if cell
                    .complete_decoding(DecodedView::Unsupported(reason), LifecycleState::Rejected)
                    .is_err()
                {
                    return handle;
                }
                if self.shared.config.reject_unsupported {
                    let reason = self.shared.config.unsupported_reason.clone();
                    if let Err(e) = self
                        .shared
                        .collaborators
                        .transport
                        .reject_request(handle.id, reason)
                        .await
                    {
                        tracing::warn!(id = %handle.id, error = %e, "拒否の送信に失敗しました");
                    }
                }
                self.close(&handle);
            }
            view => {
                let token_contract = view.token_contract();
                let is_transaction = matches!(view, DecodedView::Transaction(_));
                if cell.complete_decoding(view.clone(), LifecycleState::Ready).is_err() {
                    return handle;
                }

                let event = if is_transaction {
                    UiEvent::OpenSendTransaction {
                        id: handle.id,
                        view,
                        network: cell.network().clone(),
                        peer: self.shared.session.peer_meta.clone(),
                    }
                } else {
                    UiEvent::OpenSign {
                        id: handle.id,
                        view,
                        network: cell.network().clone(),
                        peer: self.shared.session.peer_meta.clone(),
                    }
                };
                self.publish(event);

                if let Some(contract) = token_contract {
                    self.spawn_enrichment(&cell, contract);
                }
            }
        }

        handle
    }

    /// リクエストを拒否する。終端状態でなければ `Rejected` にして拒否を1回送り、
    /// セルを破棄する（実行中のメタデータ取得も中断される）。
    ///
    /// 拒否を送った場合にtrue。承認・拒否済み、または古いハンドルでは何もしない。
    pub async fn reject(&self, handle: &LifecycleHandle, reason: Option<&str>) -> bool {
        let Some(cell) = self.lookup(handle) else {
            tracing::debug!(id = %handle.id, generation = handle.generation, "古いハンドルへの拒否を無視しました");
            return false;
        };
        if cell.transition(|s| !s.is_terminal(), LifecycleState::Rejected).is_err() {
            return false;
        }

        let reason = reason
            .map(str::to_string)
            .unwrap_or_else(|| self.shared.config.default_reject_reason.clone());
        tracing::info!(id = %handle.id, %reason, "リクエストを拒否しました");
        let sent = match self
            .shared
            .collaborators
            .transport
            .reject_request(handle.id, reason)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(id = %handle.id, error = %e, "拒否の送信に失敗しました");
                false
            }
        };
        self.close(handle);
        sent
    }

    /// ユーザーが画面を離れた。セルを破棄し、実行中のメタデータ取得を中断する。
    /// 以降、この世代への非同期処理の結果は反映されない。
    pub fn close(&self, handle: &LifecycleHandle) -> bool {
        let removed = {
            let mut arena = self.arena();
            let current = arena
                .get(&handle.id)
                .is_some_and(|cell| cell.generation() == handle.generation);
            if current {
                arena.remove(&handle.id)
            } else {
                None
            }
        };
        let Some(cell) = removed else {
            return false;
        };
        cell.close();
        tracing::debug!(id = %handle.id, generation = handle.generation, "リクエストを破棄しました");
        self.publish(UiEvent::Close { id: handle.id });
        true
    }

    pub fn state(&self, handle: &LifecycleHandle) -> Option<LifecycleState> {
        self.lookup(handle).map(|cell| cell.state())
    }

    /// 現在のデコード結果（トークン情報の補完を含む）。
    pub fn view(&self, handle: &LifecycleHandle) -> Option<DecodedView> {
        self.lookup(handle).and_then(|cell| cell.view())
    }

    pub fn network(&self, handle: &LifecycleHandle) -> Option<TargetNetwork> {
        self.lookup(handle).map(|cell| cell.network().clone())
    }

    /// 変更通知を購読する。
    pub fn subscribe(&self, handle: &LifecycleHandle) -> Option<Subscription> {
        self.lookup(handle).and_then(|cell| cell.subscribe())
    }

    pub fn unsubscribe(&self, handle: &LifecycleHandle, id: SubscriptionId) -> bool {
        self.lookup(handle).is_some_and(|cell| cell.unsubscribe(id))
    }

    /// ネットワーク追加の確認画面を開く。
    pub fn propose_chain(&self, network: Network) {
        tracing::info!(chain_id = network.chain_id, name = %network.network, "ネットワーク追加を提案します");
        self.publish(UiEvent::OpenAddChain { network });
    }

    /// ユーザーが承認したネットワークをカタログに追加する（同じチェーンIDは上書き）。
    pub fn add_network(&self, mut network: Network) {
        network.is_user_added = true;
        tracing::info!(chain_id = network.chain_id, "ネットワークを追加しました");
        self.shared
            .catalog
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .upsert(network);
    }

    /// 現在のネットワーク一覧。
    pub fn networks(&self) -> Vec<Network> {
        self.catalog().iter().cloned().collect()
    }

    // -----------------------------------------------------------------------
    // 内部
    // -----------------------------------------------------------------------

    fn arena(&self) -> MutexGuard<'_, HashMap<RequestId, Arc<LifecycleCell>>> {
        self.shared.arena.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn catalog(&self) -> std::sync::RwLockReadGuard<'_, NetworkCatalog> {
        self.shared.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// ハンドルの世代が現在のセルと一致する場合だけ返す。
    fn lookup(&self, handle: &LifecycleHandle) -> Option<Arc<LifecycleCell>> {
        self.arena()
            .get(&handle.id)
            .filter(|cell| cell.generation() == handle.generation)
            .cloned()
    }

    fn publish(&self, event: UiEvent) {
        let topic = event.topic();
        if self.shared.collaborators.ui.send(event).is_err() {
            tracing::debug!(topic, "UI通知の受信側が閉じています");
        }
    }
}
