//! 署名と承認の送信。

use serde::Serialize;

use signer_core::{DecodedView, MessageView, SessionRegistry};
use signer_types::{Address, RequestId};

use super::SigningCoordinator;
use crate::error::{SignerError, SigningError};
use crate::events::UiEvent;
use crate::lifecycle::{LifecycleCell, LifecycleHandle, LifecycleState, TransitionError};
use crate::signer::AuthenticationProof;

/// ピアに送った承認。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Approval {
    pub id: RequestId,
    /// 署名またはトランザクションハッシュ
    pub result: String,
}

impl SigningCoordinator {
    /// ユーザーの確認を受けて署名する。
    ///
    /// 現在のアカウントがセッションに公開されていなければ署名器を呼ばずに失敗する。
    /// 署名器が署名を返さなかった場合は `Failed` になり、再署名または拒否ができる。
    /// 署名を待つ間に拒否・破棄されたリクエストの結果は捨てる。
    /// 承認の送信に失敗した場合も `Approved` のまま破棄する。
    pub async fn sign(
        &self,
        handle: &LifecycleHandle,
        proof: &AuthenticationProof,
    ) -> Result<Approval, SigningError> {
        let cell = self
            .lookup(handle)
            .ok_or_else(|| self.missing(handle))?;

        let registry = SessionRegistry::new(&self.shared.session);
        let account = self
            .shared
            .wallet
            .active_account()
            .filter(|account| registry.is_authorized(account))
            .ok_or(SigningError::AccountNotAuthorized)?;

        let view = cell.begin_signing().map_err(|e| match e {
            TransitionError::Closed => SigningError::Superseded,
            TransitionError::InvalidState(state) => SigningError::InvalidState(state),
        })?;

        let signature = match self.invoke_signer(&account, &view, proof).await {
            Ok(Some(signature)) if !signature.is_empty() => signature,
            Ok(_) => return Err(self.fail(&cell, "署名器が署名を返しませんでした".to_string())),
            Err(e) => return Err(self.fail(&cell, e.to_string())),
        };

        if cell
            .transition(|s| s == LifecycleState::Signing, LifecycleState::Approved)
            .is_err()
        {
            tracing::debug!(
                id = %handle.id,
                generation = handle.generation,
                "拒否または破棄されたリクエストの署名結果を破棄しました"
            );
            return Err(SigningError::Superseded);
        }

        tracing::info!(id = %handle.id, %account, "リクエストを承認しました");
        if let Err(e) = self
            .shared
            .collaborators
            .transport
            .approve_request(handle.id, signature.clone())
            .await
        {
            // 再送はトランスポート側の責務。終端状態のセルは残さない
            tracing::warn!(id = %handle.id, error = %e, "承認の送信に失敗しました");
            self.close(handle);
            return Err(SigningError::Transport(e.to_string()));
        }

        let dismiss_after = self.shared.config.dismiss_delay;
        self.publish(UiEvent::Success {
            id: handle.id,
            dismiss_after,
        });
        self.schedule_dismiss(&cell, dismiss_after);

        Ok(Approval {
            id: handle.id,
            result: signature,
        })
    }

    async fn invoke_signer(
        &self,
        account: &Address,
        view: &DecodedView,
        proof: &AuthenticationProof,
    ) -> Result<Option<String>, SignerError> {
        let signer = &self.shared.collaborators.signer;
        match view {
            DecodedView::Message(MessageView::PlainText(text)) => {
                signer.sign_message(account, text.as_bytes(), proof).await
            }
            DecodedView::Message(MessageView::TypedData(document)) => {
                signer.sign_typed_data(account, document, proof).await
            }
            DecodedView::Transaction(tx) => signer.sign_transaction(account, &tx.param, proof).await,
            DecodedView::Unsupported(reason) => Err(SignerError::Backend(reason.to_string())),
        }
    }

    /// `Signing` から `Failed` に戻す。既に拒否・破棄されていれば `Superseded`。
    fn fail(&self, cell: &LifecycleCell, message: String) -> SigningError {
        let id = cell.request().id;
        match cell.transition(|s| s == LifecycleState::Signing, LifecycleState::Failed) {
            Ok(_) => {
                tracing::warn!(%id, error = %message, "署名に失敗しました");
                SigningError::SignerFailure(message)
            }
            Err(_) => {
                tracing::debug!(%id, "拒否または破棄されたリクエストの署名失敗を破棄しました");
                SigningError::Superseded
            }
        }
    }

    /// 成功表示の後、一定時間で画面を閉じる。
    fn schedule_dismiss(&self, cell: &LifecycleCell, delay: std::time::Duration) {
        let coordinator = self.clone();
        let handle = cell.handle();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            coordinator.close(&handle);
        });
        cell.track_task(task.abort_handle());
    }

    /// ハンドルに対応するセルがないときのエラー。
    fn missing(&self, handle: &LifecycleHandle) -> SigningError {
        if self.arena().contains_key(&handle.id) {
            SigningError::Superseded
        } else {
            SigningError::UnknownRequest(handle.id)
        }
    }
}
