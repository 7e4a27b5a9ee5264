//! # UI通知
//!
//! Coordinatorが周囲のUI（確認モーダル等）に送る通知。
//! プロセス全体のイベントバスは使わず、構築時に渡されたチャネルにだけ送る。

use std::time::Duration;

use serde::{Serialize, Serializer};
use tokio::sync::mpsc;

use signer_core::DecodedView;
use signer_types::{Network, PeerMeta, RequestId, TargetNetwork, TokenMetadata};

/// UIへの通知。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "topic")]
pub enum UiEvent {
    /// メッセージ署名の確認を開く
    #[serde(rename = "openInpageDAppSign")]
    OpenSign {
        id: RequestId,
        view: DecodedView,
        network: TargetNetwork,
        peer: PeerMeta,
    },
    /// トランザクション送信の確認を開く
    #[serde(rename = "openInpageDAppSendTransaction")]
    OpenSendTransaction {
        id: RequestId,
        view: DecodedView,
        network: TargetNetwork,
        peer: PeerMeta,
    },
    /// ネットワーク追加の確認を開く
    #[serde(rename = "openAddEthereumChain")]
    OpenAddChain { network: Network },
    /// トークン追加の確認を開く
    #[serde(rename = "openAddAsset")]
    OpenAddAsset { chain_id: u64, token: TokenMetadata },
    /// 承認の成功を表示し、`dismiss_after` 後に閉じる
    #[serde(rename = "success")]
    Success {
        id: RequestId,
        #[serde(rename = "dismiss_after_ms", serialize_with = "millis")]
        dismiss_after: Duration,
    },
    /// 確認画面を閉じる
    #[serde(rename = "close")]
    Close { id: RequestId },
}

impl UiEvent {
    /// 通知の種類を表す名前。
    pub fn topic(&self) -> &'static str {
        match self {
            UiEvent::OpenSign { .. } => "openInpageDAppSign",
            UiEvent::OpenSendTransaction { .. } => "openInpageDAppSendTransaction",
            UiEvent::OpenAddChain { .. } => "openAddEthereumChain",
            UiEvent::OpenAddAsset { .. } => "openAddAsset",
            UiEvent::Success { .. } => "success",
            UiEvent::Close { .. } => "close",
        }
    }

    /// 対象のリクエストID（リクエストに紐づかない通知はNone）。
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            UiEvent::OpenSign { id, .. }
            | UiEvent::OpenSendTransaction { id, .. }
            | UiEvent::Success { id, .. }
            | UiEvent::Close { id } => Some(*id),
            UiEvent::OpenAddChain { .. } | UiEvent::OpenAddAsset { .. } => None,
        }
    }
}

fn millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

pub type UiSender = mpsc::UnboundedSender<UiEvent>;
pub type UiReceiver = mpsc::UnboundedReceiver<UiEvent>;

/// UI通知のチャネルを作る。
pub fn ui_channel() -> (UiSender, UiReceiver) {
    mpsc::unbounded_channel()
}
