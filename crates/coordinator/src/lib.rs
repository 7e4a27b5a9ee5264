//! # signer-coordinator
//!
//! 接続中のアプリ（ピア）から届く署名・送信リクエストを調停する。
//!
//! - `coordinator`: リクエストのライフサイクル管理と承認・拒否の送信
//! - `lifecycle`: 状態機械と変更通知
//! - `signer`: 署名機能の抽象化とモック
//! - `chain_data`: トークン情報の取得（JSON-RPC / メモリ内）
//! - `transport`: ピアへの応答送信
//! - `events`: UI通知
//! - `config`: 設定と共有ウォレット状態

pub mod chain_data;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod signer;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use chain_data::mock::StaticChainData;
pub use chain_data::rpc::RpcChainData;
pub use chain_data::ChainDataProvider;
pub use config::{CoordinatorConfig, RpcEndpoints, WalletContext};
pub use coordinator::{Approval, Collaborators, SigningCoordinator};
pub use error::{ChainDataError, ConfigError, SignerError, SigningError, TransportError};
pub use events::{ui_channel, UiEvent, UiReceiver, UiSender};
pub use lifecycle::{LifecycleChange, LifecycleHandle, LifecycleState, Subscription, SubscriptionId};
pub use signer::mock::{MockBehavior, MockSigner};
pub use signer::{AuthenticationProof, SigningCapability};
pub use transport::{ChannelTransport, SessionTransport};
