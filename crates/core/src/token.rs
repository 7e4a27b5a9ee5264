//! # トークン状態
//!
//! transfer/approveリクエストのトークン金額と、非同期に取得される
//! decimals/symbolを保持する。各フィールドは高々1回だけ書き込まれる。

use alloy_primitives::U256;
use serde::Serialize;

use crate::amount::{format_units, NATIVE_DECIMALS};

/// トークン金額とメタデータ。
///
/// 初期状態は未解決（decimals=18, symbol=""）で、decimalsとsymbolの
/// 取得完了ごとに1回ずつ更新される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenState {
    /// 最小単位のトークン金額
    pub amount_raw: U256,
    /// 小数点以下の桁数
    pub decimals: u8,
    /// シンボル
    pub symbol: String,
    /// decimals/symbolの両方が反映済みか
    pub resolved: bool,
    #[serde(skip)]
    decimals_applied: bool,
    #[serde(skip)]
    symbol_applied: bool,
}

impl Default for TokenState {
    fn default() -> Self {
        Self::new(U256::ZERO)
    }
}

impl TokenState {
    /// 未解決のトークン状態を作る。
    pub fn new(amount_raw: U256) -> Self {
        Self {
            amount_raw,
            decimals: NATIVE_DECIMALS,
            symbol: String::new(),
            resolved: false,
            decimals_applied: false,
            symbol_applied: false,
        }
    }

    /// 取得したdecimalsを反映する。2回目以降は無視してfalseを返す。
    pub fn apply_decimals(&mut self, decimals: u8) -> bool {
        if self.decimals_applied {
            return false;
        }
        self.decimals = decimals;
        self.decimals_applied = true;
        self.refresh_resolved();
        true
    }

    /// 取得したsymbolを反映する。2回目以降は無視してfalseを返す。
    pub fn apply_symbol(&mut self, symbol: String) -> bool {
        if self.symbol_applied {
            return false;
        }
        self.symbol = symbol;
        self.symbol_applied = true;
        self.refresh_resolved();
        true
    }

    /// 表示用のトークン金額。
    pub fn amount(&self) -> String {
        format_units(self.amount_raw, self.decimals)
    }

    fn refresh_resolved(&mut self) {
        self.resolved = self.decimals_applied && self.symbol_applied;
    }
}
