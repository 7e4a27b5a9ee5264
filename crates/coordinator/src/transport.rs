//! # ピアへの応答送信
//!
//! 承認・拒否の応答をセッションのピア（接続中のアプリ）に届ける。
//! 実際のWalletConnect等のプロトコル処理はこのクレートの外側で行い、
//! Coordinatorは `SessionTransport` を通じてのみ応答を送る。

use async_trait::async_trait;
use tokio::sync::mpsc;

use signer_types::{PeerMessage, RequestId};

use crate::error::TransportError;

/// セッションへの応答送信。
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// 承認の応答（署名またはトランザクションハッシュ）を送る。
    async fn approve_request(&self, id: RequestId, result: String) -> Result<(), TransportError>;

    /// 拒否の応答を送る。
    async fn reject_request(&self, id: RequestId, reason: String) -> Result<(), TransportError>;
}

/// 応答を `PeerMessage` としてチャネルに流す。
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<PeerMessage>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::UnboundedSender<PeerMessage>) -> Self {
        Self { tx }
    }

    /// 送信側と受信側の組を作る。
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PeerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, message: PeerMessage) -> Result<(), TransportError> {
        self.tx.send(message).map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl SessionTransport for ChannelTransport {
    async fn approve_request(&self, id: RequestId, result: String) -> Result<(), TransportError> {
        self.send(PeerMessage::Approve { id, result })
    }

    async fn reject_request(&self, id: RequestId, reason: String) -> Result<(), TransportError> {
        self.send(PeerMessage::Reject { id, reason })
    }
}
