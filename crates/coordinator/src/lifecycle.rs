//! # リクエストのライフサイクル
//!
//! 保留中リクエスト1件ごとの状態機械と、その変更通知。
//!
//! ```text
//! Pending → Decoding → Ready → Signing → Approved
//!                        │        │
//!                        │        └────→ Failed ──(再署名)──→ Signing
//!                        └──(拒否)──→ Rejected
//! ```
//!
//! `Approved` と `Rejected` は終端状態で、ピアへの応答はこのどちらかへの
//! 遷移に成功した呼び出し元だけが送る。状態・デコード結果・トークン情報の
//! 変更はすべてセルの `Mutex` を通り、ロックは `.await` をまたいで保持しない。
//!
//! セルは世代番号を持ち、破棄（`close`）や同じIDでの再受付で `closed` になる。
//! `closed` になったセルへの非同期処理の結果は反映されない。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use signer_core::DecodedView;
use signer_types::{IncomingRequest, RequestId, TargetNetwork};

/// リクエストの状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// 受付直後
    Pending,
    /// デコード中
    Decoding,
    /// ユーザーの確認待ち
    Ready,
    /// 署名器の応答待ち
    Signing,
    /// 承認済み（終端）
    Approved,
    /// 拒否済み（終端）
    Rejected,
    /// 署名失敗。再署名または拒否できる。
    Failed,
}

impl LifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Approved | LifecycleState::Rejected)
    }

    /// 署名を開始できる状態か。
    pub fn can_sign(self) -> bool {
        matches!(self, LifecycleState::Ready | LifecycleState::Failed)
    }
}

/// 呼び出し元が保持するリクエストへの参照。
///
/// 同じIDでも世代が異なれば別のリクエストとして扱われる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LifecycleHandle {
    /// リクエストID
    pub id: RequestId,
    /// 受付時に採番された世代
    pub generation: u64,
}

/// 購読者に届く変更。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleChange {
    /// 状態が変わった
    State(LifecycleState),
    /// トークンのdecimalsが反映された
    TokenDecimals(u8),
    /// トークンのsymbolが反映された
    TokenSymbol(String),
}

/// 購読の識別子。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// 変更通知の購読。セルが破棄されると `changes` は閉じる。
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub changes: mpsc::UnboundedReceiver<LifecycleChange>,
}

/// 非同期に取得したトークン情報。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenUpdate {
    Decimals(u8),
    Symbol(String),
}

/// 状態遷移の失敗。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransitionError {
    /// 破棄済み、または新しい世代に置き換えられた
    Closed,
    /// 遷移元の状態ではない
    InvalidState(LifecycleState),
}

struct CellInner {
    state: LifecycleState,
    view: Option<DecodedView>,
    closed: bool,
    subscribers: HashMap<SubscriptionId, mpsc::UnboundedSender<LifecycleChange>>,
    next_subscription: u64,
    tasks: Vec<AbortHandle>,
}

impl CellInner {
    fn notify(&mut self, change: LifecycleChange) {
        // 受信側が閉じた購読は取り除く
        self.subscribers.retain(|_, tx| tx.send(change.clone()).is_ok());
    }
}

/// リクエスト1件分の状態。アリーナに `Arc` で格納される。
pub(crate) struct LifecycleCell {
    generation: u64,
    request: IncomingRequest,
    network: TargetNetwork,
    inner: Mutex<CellInner>,
}

impl LifecycleCell {
    pub(crate) fn new(generation: u64, request: IncomingRequest, network: TargetNetwork) -> Self {
        Self {
            generation,
            request,
            network,
            inner: Mutex::new(CellInner {
                state: LifecycleState::Pending,
                view: None,
                closed: false,
                subscribers: HashMap::new(),
                next_subscription: 0,
                tasks: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CellInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn handle(&self) -> LifecycleHandle {
        LifecycleHandle {
            id: self.request.id,
            generation: self.generation,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn request(&self) -> &IncomingRequest {
        &self.request
    }

    pub(crate) fn network(&self) -> &TargetNetwork {
        &self.network
    }

    pub(crate) fn state(&self) -> LifecycleState {
        self.lock().state
    }

    pub(crate) fn view(&self) -> Option<DecodedView> {
        self.lock().view.clone()
    }

    /// 現在の状態が `allowed` のいずれかなら `to` に遷移し、遷移前の状態を返す。
    pub(crate) fn transition(
        &self,
        allowed: impl Fn(LifecycleState) -> bool,
        to: LifecycleState,
    ) -> Result<LifecycleState, TransitionError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(TransitionError::Closed);
        }
        let from = inner.state;
        if !allowed(from) {
            return Err(TransitionError::InvalidState(from));
        }
        inner.state = to;
        inner.notify(LifecycleChange::State(to));
        Ok(from)
    }

    /// デコード結果を格納して `to` に遷移する（`Decoding` からのみ）。
    pub(crate) fn complete_decoding(
        &self,
        view: DecodedView,
        to: LifecycleState,
    ) -> Result<(), TransitionError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(TransitionError::Closed);
        }
        if inner.state != LifecycleState::Decoding {
            return Err(TransitionError::InvalidState(inner.state));
        }
        inner.view = Some(view);
        inner.state = to;
        inner.notify(LifecycleChange::State(to));
        Ok(())
    }

    /// `Ready`/`Failed` から `Signing` に遷移し、署名対象のデコード結果を返す。
    pub(crate) fn begin_signing(&self) -> Result<DecodedView, TransitionError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(TransitionError::Closed);
        }
        let from = inner.state;
        let view = match (&inner.view, from.can_sign()) {
            (Some(view), true) if !view.is_unsupported() => view.clone(),
            _ => return Err(TransitionError::InvalidState(from)),
        };
        inner.state = LifecycleState::Signing;
        inner.notify(LifecycleChange::State(LifecycleState::Signing));
        Ok(view)
    }

    /// 取得したトークン情報を反映する。破棄済みまたは反映済みならfalse。
    pub(crate) fn apply_token(&self, update: TokenUpdate) -> bool {
        let mut inner = self.lock();
        if inner.closed {
            return false;
        }
        let Some(DecodedView::Transaction(tx)) = inner.view.as_mut() else {
            return false;
        };
        let change = match update {
            TokenUpdate::Decimals(decimals) => tx
                .token
                .apply_decimals(decimals)
                .then_some(LifecycleChange::TokenDecimals(decimals)),
            TokenUpdate::Symbol(symbol) => tx
                .token
                .apply_symbol(symbol.clone())
                .then_some(LifecycleChange::TokenSymbol(symbol)),
        };
        match change {
            Some(change) => {
                inner.notify(change);
                true
            }
            None => false,
        }
    }

    pub(crate) fn subscribe(&self) -> Option<Subscription> {
        let mut inner = self.lock();
        if inner.closed {
            return None;
        }
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;
        let (tx, changes) = mpsc::unbounded_channel();
        inner.subscribers.insert(id, tx);
        Some(Subscription { id, changes })
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().subscribers.remove(&id).is_some()
    }

    /// 非同期処理を登録する。破棄済みなら即座に中断する。
    pub(crate) fn track_task(&self, task: AbortHandle) {
        let mut inner = self.lock();
        if inner.closed {
            task.abort();
            return;
        }
        inner.tasks.retain(|t| !t.is_finished());
        inner.tasks.push(task);
    }

    /// セルを破棄する。実行中の非同期処理を中断し、購読を閉じる。
    /// 既に破棄済みならfalse。
    pub(crate) fn close(&self) -> bool {
        let mut inner = self.lock();
        if inner.closed {
            return false;
        }
        inner.closed = true;
        for task in inner.tasks.drain(..) {
            task.abort();
        }
        inner.subscribers.clear();
        true
    }
}
