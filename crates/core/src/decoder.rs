//! # リクエストデコーダ
//!
//! 型付けされていない呼び出しリクエストを、署名対象のメッセージまたは
//! 送信対象のトランザクションとして解釈する。
//!
//! ## 対応メソッド
//! | メソッド | 解釈 |
//! |---|---|
//! | `eth_sign` | `params[1]` のhexをUTF-8テキストとして署名 |
//! | `personal_sign` | `params[0]` のhexをUTF-8テキストとして署名 |
//! | `eth_signTypedData` | `params[1]` を構造化データとして署名 |
//! | `eth_sendTransaction` | `params[0]` をトランザクションとして解釈 |
//!
//! 上記以外のメソッドやパラメータの不備は `DecodedView::Unsupported` になり、
//! `classify` の外へエラーとして伝播することはない。

use std::str::FromStr;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use signer_types::IncomingRequest;

use crate::amount::format_ether;
use crate::erc20::{IERC20, APPROVE_SELECTOR, TRANSFER_SELECTOR};
use crate::token::TokenState;

// ---------------------------------------------------------------------------
// リクエスト種別
// ---------------------------------------------------------------------------

/// デコーダが認識するメソッドの閉じた集合。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    EthSign,
    PersonalSign,
    SignTypedData,
    SendTransaction,
}

impl RequestKind {
    /// メソッド名を返す。
    pub fn method(&self) -> &'static str {
        match self {
            RequestKind::EthSign => "eth_sign",
            RequestKind::PersonalSign => "personal_sign",
            RequestKind::SignTypedData => "eth_signTypedData",
            RequestKind::SendTransaction => "eth_sendTransaction",
        }
    }
}

impl FromStr for RequestKind {
    type Err = UnsupportedReason;

    fn from_str(method: &str) -> Result<Self, Self::Err> {
        match method {
            "eth_sign" => Ok(RequestKind::EthSign),
            "personal_sign" => Ok(RequestKind::PersonalSign),
            "eth_signTypedData" => Ok(RequestKind::SignTypedData),
            "eth_sendTransaction" => Ok(RequestKind::SendTransaction),
            other => Err(UnsupportedReason::UnsupportedMethod(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// デコード結果
// ---------------------------------------------------------------------------

/// 署名対象のメッセージ。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum MessageView {
    /// UTF-8テキスト
    PlainText(String),
    /// 構造化データ（型付きデータ署名）
    TypedData(Value),
}

/// トランザクションの種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Transfer,
    Approve,
    ContractInteraction,
}

/// `eth_sendTransaction` の `params[0]`。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransactionParam {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(alias = "input", skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(alias = "gasLimit", skip_serializing_if = "Option::is_none")]
    pub gas: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Value>,
}

/// 送信対象のトランザクション。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionView {
    /// 種別
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    /// 受取人（transferの宛先、approveのspender、それ以外は `to`）
    pub recipient: Address,
    /// ネイティブ通貨の送金額（最小単位）
    pub native_value: U256,
    /// トークン金額とメタデータ
    pub token: TokenState,
    /// 呼び出し先（`to`）
    pub contract: Address,
    /// calldata
    pub calldata: Bytes,
    /// 元のパラメータ（署名に渡す）
    #[serde(skip)]
    pub param: TransactionParam,
}

impl TransactionView {
    /// ERC-20のtransfer/approve呼び出しか（メタデータ取得の対象）。
    pub fn is_token_call(&self) -> bool {
        !self.calldata.is_empty()
            && matches!(self.tx_type, TransactionType::Transfer | TransactionType::Approve)
    }

    /// 表示用のネイティブ通貨金額。
    pub fn value(&self) -> String {
        format_ether(self.native_value)
    }
}

/// 処理できないリクエストの理由。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum UnsupportedReason {
    /// パラメータの形式不正
    #[error("不正なリクエスト: {0}")]
    MalformedRequest(String),
    /// 未対応のメソッド
    #[error("未対応のメソッド: {0}")]
    UnsupportedMethod(String),
}

/// リクエストのデコード結果。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DecodedView {
    Message(MessageView),
    Transaction(TransactionView),
    Unsupported(UnsupportedReason),
}

impl DecodedView {
    /// メタデータを取得すべきトークンコントラクト。
    pub fn token_contract(&self) -> Option<Address> {
        match self {
            DecodedView::Transaction(tx) if tx.is_token_call() => Some(tx.contract),
            _ => None,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, DecodedView::Unsupported(_))
    }
}

// ---------------------------------------------------------------------------
// デコードエラー（classifyの内部でUnsupportedに変換される）
// ---------------------------------------------------------------------------

/// パラメータのデコードエラー。
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// パラメータが足りない
    #[error("params[{0}]がありません")]
    MissingParam(usize),
    /// パラメータの型が想定と異なる
    #[error("params[{index}]は{expected}である必要があります")]
    UnexpectedType {
        /// パラメータ位置
        index: usize,
        /// 想定した型
        expected: &'static str,
    },
    /// hexのデコード失敗
    #[error("hexのデコードに失敗: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    /// 構造化データのパース失敗
    #[error("構造化データのパースに失敗: {0}")]
    InvalidDocument(serde_json::Error),
    /// トランザクションパラメータの形式不正
    #[error("トランザクションのパースに失敗: {0}")]
    InvalidTransaction(serde_json::Error),
    /// 金額の形式不正
    #[error("金額の形式が不正です: {0}")]
    InvalidQuantity(String),
    /// 宛先がない
    #[error("トランザクションにtoがありません")]
    MissingRecipient,
    /// calldataのABIデコード失敗
    #[error("calldataのABIデコードに失敗: {0}")]
    Abi(#[from] alloy_sol_types::Error),
}

// ---------------------------------------------------------------------------
// デコード処理
// ---------------------------------------------------------------------------

/// リクエストを分類してデコードする。失敗は `Unsupported` として返す。
pub fn classify(request: &IncomingRequest) -> DecodedView {
    let kind = match request.method.parse::<RequestKind>() {
        Ok(kind) => kind,
        Err(reason) => return DecodedView::Unsupported(reason),
    };

    decode(kind, &request.params).unwrap_or_else(|e| {
        DecodedView::Unsupported(UnsupportedReason::MalformedRequest(e.to_string()))
    })
}

/// 種別ごとにパラメータをデコードする。
pub fn decode(kind: RequestKind, params: &[Value]) -> Result<DecodedView, DecodeError> {
    let view = match kind {
        RequestKind::EthSign => {
            DecodedView::Message(MessageView::PlainText(decode_text(params, 1)?))
        }
        RequestKind::PersonalSign => {
            DecodedView::Message(MessageView::PlainText(decode_text(params, 0)?))
        }
        RequestKind::SignTypedData => {
            DecodedView::Message(MessageView::TypedData(decode_document(params, 1)?))
        }
        RequestKind::SendTransaction => DecodedView::Transaction(decode_transaction(params)?),
    };
    Ok(view)
}

fn param(params: &[Value], index: usize) -> Result<&Value, DecodeError> {
    params.get(index).ok_or(DecodeError::MissingParam(index))
}

fn string_param(params: &[Value], index: usize) -> Result<&str, DecodeError> {
    param(params, index)?
        .as_str()
        .ok_or(DecodeError::UnexpectedType { index, expected: "文字列" })
}

/// `0x` プレフィックスは省略可能。奇数長は不正。
fn parse_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(digits)
}

fn decode_text(params: &[Value], index: usize) -> Result<String, DecodeError> {
    let bytes = parse_hex(string_param(params, index)?)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn decode_document(params: &[Value], index: usize) -> Result<Value, DecodeError> {
    match param(params, index)? {
        Value::String(text) => serde_json::from_str(text).map_err(DecodeError::InvalidDocument),
        doc @ Value::Object(_) => Ok(doc.clone()),
        _ => Err(DecodeError::UnexpectedType { index, expected: "構造化データ" }),
    }
}

/// `value` はhex文字列・10進文字列・整数のいずれか。省略時は0。
fn parse_quantity(value: Option<&Value>) -> Result<U256, DecodeError> {
    match value {
        None | Some(Value::Null) => Ok(U256::ZERO),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("0x") {
                return Ok(U256::ZERO);
            }
            U256::from_str(s).map_err(|e| DecodeError::InvalidQuantity(format!("{s}: {e}")))
        }
        Some(Value::Number(n)) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| DecodeError::InvalidQuantity(n.to_string())),
        Some(other) => Err(DecodeError::InvalidQuantity(other.to_string())),
    }
}

fn decode_transaction(params: &[Value]) -> Result<TransactionView, DecodeError> {
    let tx_param: TransactionParam =
        serde_json::from_value(param(params, 0)?.clone()).map_err(DecodeError::InvalidTransaction)?;

    let contract = tx_param.to.ok_or(DecodeError::MissingRecipient)?;
    let calldata = parse_hex(tx_param.data.as_deref().unwrap_or_default())?;
    let native_value = parse_quantity(tx_param.value.as_ref())?;
    let selector = calldata.get(..4);

    let (tx_type, recipient, amount) = if calldata.is_empty() {
        (TransactionType::Transfer, contract, U256::ZERO)
    } else if selector == Some(TRANSFER_SELECTOR.as_slice()) {
        // 引数の後ろに付加されたバイト列（トラッキングタグ等）は無視する
        let call = IERC20::transferCall::abi_decode(&calldata, false)?;
        (TransactionType::Transfer, call.to, call.amount)
    } else if selector == Some(APPROVE_SELECTOR.as_slice()) {
        let call = IERC20::approveCall::abi_decode(&calldata, false)?;
        (TransactionType::Approve, call.spender, call.amount)
    } else {
        (TransactionType::ContractInteraction, contract, U256::ZERO)
    };

    Ok(TransactionView {
        tx_type,
        recipient,
        native_value,
        token: TokenState::new(amount),
        contract,
        calldata: Bytes::from(calldata),
        param: tx_param,
    })
}
