//! # 署名機能の抽象化
//!
//! 鍵の保管と認証（PIN・生体認証）はウォレット側の責務で、Coordinatorは
//! 認証の証跡を解釈せずにそのまま署名器へ渡す。
//!
//! 現在の実装:
//! - `mock`: ローカル開発・テスト用（メモリ内Ed25519鍵、PIN照合）

pub mod mock;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use signer_core::TransactionParam;
use signer_types::Address;

use crate::error::SignerError;

/// 認証の証跡。内容はCoordinatorにとって不透明。
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticationProof(Vec<u8>);

impl AuthenticationProof {
    /// PINから作る。
    pub fn from_pin(pin: &str) -> Self {
        Self(pin.as_bytes().to_vec())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for AuthenticationProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthenticationProof(..)")
    }
}

/// 外部の署名機能。
///
/// 戻り値の `Ok(None)` または空文字列は「署名されなかった」（認証失敗・キャンセル等）を表す。
#[async_trait]
pub trait SigningCapability: Send + Sync {
    /// テキストメッセージに署名する。
    async fn sign_message(
        &self,
        account: &Address,
        message: &[u8],
        proof: &AuthenticationProof,
    ) -> Result<Option<String>, SignerError>;

    /// 構造化データに署名する。
    async fn sign_typed_data(
        &self,
        account: &Address,
        typed_data: &Value,
        proof: &AuthenticationProof,
    ) -> Result<Option<String>, SignerError>;

    /// トランザクションに署名して送信し、トランザクションハッシュを返す。
    async fn sign_transaction(
        &self,
        account: &Address,
        tx: &TransactionParam,
        proof: &AuthenticationProof,
    ) -> Result<Option<String>, SignerError>;
}
