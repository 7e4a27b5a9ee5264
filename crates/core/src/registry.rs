//! # セッションレジストリ
//!
//! セッションが持つ事実（公開アカウント・許可チェーン・ピア情報）への
//! 問い合わせ。副作用はなく、失敗は「見つからない」という結果だけ。

use signer_types::{Address, PeerMeta, Session};

/// `Session` の読み取り専用ビュー。
#[derive(Debug, Clone, Copy)]
pub struct SessionRegistry<'a> {
    session: &'a Session,
}

impl<'a> SessionRegistry<'a> {
    /// セッションを参照するレジストリを作る。
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// アカウントがピアに公開されているか。
    pub fn is_authorized(&self, account: &Address) -> bool {
        self.session.accounts.contains(account)
    }

    /// チェーンがピアに許可されているか。
    pub fn has_chain(&self, chain_id: u64) -> bool {
        self.session.enabled_chain_ids.contains(&chain_id)
    }

    pub fn peer_meta(&self) -> &'a PeerMeta {
        &self.session.peer_meta
    }

    pub fn accounts(&self) -> impl Iterator<Item = &'a Address> {
        self.session.accounts.iter()
    }

    /// 許可チェーンを登録順に返す。
    pub fn enabled_chain_ids(&self) -> &'a [u64] {
        &self.session.enabled_chain_ids
    }
}
