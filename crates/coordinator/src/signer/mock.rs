//! # ローカル開発用モック署名器
//!
//! ウォレットの鍵ストアが利用できない環境で使用するモック実装。
//! メモリ内でEd25519鍵を生成し、PINが一致した場合だけ署名を返す。
//! 呼び出し回数を記録するため、テストの代役としても使う。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use serde_json::Value;
use sha2::{Digest, Sha256};

use signer_core::TransactionParam;
use signer_types::Address;

use super::{AuthenticationProof, SigningCapability};
use crate::error::SignerError;

/// モック署名器の応答。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// PINが一致すれば署名する
    Sign,
    /// 常に署名を返さない（`Ok(None)`）
    Decline,
    /// 常にエラーを返す
    Fail,
}

/// モック署名器。ローカル開発・テスト用。
pub struct MockSigner {
    /// Ed25519署名用キーペア（メモリ内生成）
    signing_key: SigningKey,
    /// 期待するPIN（Noneの場合は照合しない）
    pin: Option<String>,
    /// 応答の種類
    behavior: RwLock<MockBehavior>,
    /// 署名前の待ち時間
    delay: Duration,
    /// 呼び出し回数
    invocations: AtomicUsize,
}

impl MockSigner {
    /// PINを照合するモック署名器を作る。
    pub fn new(pin: Option<&str>) -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::rngs::OsRng),
            pin: pin.map(str::to_string),
            behavior: RwLock::new(MockBehavior::Sign),
            delay: Duration::ZERO,
            invocations: AtomicUsize::new(0),
        }
    }

    /// 署名前に待機する（並行処理のテスト用）。
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_behavior(self, behavior: MockBehavior) -> Self {
        self.set_behavior(behavior);
        self
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.write().unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    /// これまでの呼び出し回数。
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    async fn sign_bytes(
        &self,
        payload: &[u8],
        proof: &AuthenticationProof,
    ) -> Result<Option<Vec<u8>>, SignerError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let behavior = *self.behavior.read().unwrap_or_else(PoisonError::into_inner);
        match behavior {
            MockBehavior::Fail => Err(SignerError::Backend("モック署名器は失敗するよう設定されています".into())),
            MockBehavior::Decline => Ok(None),
            MockBehavior::Sign => {
                if let Some(pin) = &self.pin {
                    if proof.as_bytes() != pin.as_bytes() {
                        tracing::debug!("PINが一致しないため署名しません");
                        return Ok(None);
                    }
                }
                Ok(Some(self.signing_key.sign(payload).to_bytes().to_vec()))
            }
        }
    }
}

/// 署名対象のテキストメッセージに付けるプレフィックス。
pub fn personal_message(message: &[u8]) -> Vec<u8> {
    let mut prefixed = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    prefixed.extend_from_slice(message);
    prefixed
}

fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[async_trait]
impl SigningCapability for MockSigner {
    async fn sign_message(
        &self,
        _account: &Address,
        message: &[u8],
        proof: &AuthenticationProof,
    ) -> Result<Option<String>, SignerError> {
        let signed = self.sign_bytes(&personal_message(message), proof).await?;
        Ok(signed.map(|sig| to_hex(&sig)))
    }

    async fn sign_typed_data(
        &self,
        _account: &Address,
        typed_data: &Value,
        proof: &AuthenticationProof,
    ) -> Result<Option<String>, SignerError> {
        let payload = serde_json::to_vec(typed_data)?;
        let signed = self.sign_bytes(&payload, proof).await?;
        Ok(signed.map(|sig| to_hex(&sig)))
    }

    /// 署名のSHA-256をトランザクションハッシュの代わりに返す。
    async fn sign_transaction(
        &self,
        _account: &Address,
        tx: &TransactionParam,
        proof: &AuthenticationProof,
    ) -> Result<Option<String>, SignerError> {
        let payload = serde_json::to_vec(tx)?;
        let signed = self.sign_bytes(&payload, proof).await?;
        Ok(signed.map(|sig| to_hex(&Sha256::digest(&sig))))
    }
}
