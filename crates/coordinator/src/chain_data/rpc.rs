//! # JSON-RPCによるチェーンデータ取得
//!
//! ERC-20のview関数を `eth_call` で呼び出し、`sol!` の定義で戻り値をデコードする。
//! name/symbolは `string` でデコードできない場合に `bytes32` として再解釈する。

use alloy_primitives::{Bytes, FixedBytes};
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use serde_json::Value;

use signer_core::erc20::IERC20;
use signer_types::{Address, U256};

use super::ChainDataProvider;
use crate::config::RpcEndpoints;
use crate::error::ChainDataError;

/// JSON-RPCエンドポイント経由のチェーンデータ取得。
#[derive(Debug, Clone)]
pub struct RpcChainData {
    /// HTTPクライアント（接続を再利用する）
    pub http_client: reqwest::Client,
    /// チェーンIDごとのエンドポイント
    pub endpoints: RpcEndpoints,
}

impl RpcChainData {
    pub fn new(endpoints: RpcEndpoints) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            endpoints,
        }
    }

    /// `eth_call` を実行し、戻り値のバイト列を返す。
    async fn eth_call(
        &self,
        chain_id: u64,
        contract: &Address,
        calldata: Vec<u8>,
    ) -> Result<Vec<u8>, ChainDataError> {
        let url = self
            .endpoints
            .url(chain_id)
            .ok_or(ChainDataError::UnknownChain(chain_id))?;

        let rpc_request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                { "to": contract, "data": Bytes::from(calldata) },
                "latest"
            ]
        });

        let rpc_body: Value = self
            .http_client
            .post(url)
            .json(&rpc_request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = rpc_body.get("error") {
            tracing::warn!(chain_id, %contract, %error, "eth_callがエラーを返しました");
            return Err(ChainDataError::Rpc(error.to_string()));
        }

        let result = rpc_body
            .get("result")
            .and_then(Value::as_str)
            .ok_or_else(|| ChainDataError::Rpc("RPCレスポンスにresultがありません".to_string()))?;

        let bytes = hex::decode(result.trim_start_matches("0x"))
            .map_err(|e| ChainDataError::Decode(format!("resultがhexではありません: {e}")))?;
        if bytes.is_empty() {
            // コントラクトが存在しない、または関数が実装されていない
            return Err(ChainDataError::NotFound(contract.to_string()));
        }
        Ok(bytes)
    }

    /// `string` を返す関数を呼ぶ。デコードできなければ `bytes32` として読む。
    async fn call_text(
        &self,
        chain_id: u64,
        contract: &Address,
        calldata: Vec<u8>,
    ) -> Result<String, ChainDataError> {
        let ret = self.eth_call(chain_id, contract, calldata).await?;
        match String::abi_decode(&ret, true) {
            Ok(text) => Ok(text),
            Err(_) => {
                let raw = FixedBytes::<32>::abi_decode(&ret, true)
                    .map_err(|e| ChainDataError::Decode(e.to_string()))?;
                tracing::debug!(chain_id, %contract, "bytes32として読み直しました");
                Ok(bytes32_to_string(&raw))
            }
        }
    }
}

/// 末尾のゼロ埋めを除いてUTF-8として読む。
fn bytes32_to_string(raw: &FixedBytes<32>) -> String {
    let end = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[async_trait]
impl ChainDataProvider for RpcChainData {
    async fn token_decimals(&self, chain_id: u64, contract: &Address) -> Result<u8, ChainDataError> {
        let ret = self
            .eth_call(chain_id, contract, IERC20::decimalsCall {}.abi_encode())
            .await?;
        let decoded = IERC20::decimalsCall::abi_decode_returns(&ret, true)
            .map_err(|e| ChainDataError::Decode(e.to_string()))?;
        Ok(decoded._0)
    }

    async fn token_symbol(
        &self,
        chain_id: u64,
        contract: &Address,
    ) -> Result<String, ChainDataError> {
        self.call_text(chain_id, contract, IERC20::symbolCall {}.abi_encode())
            .await
    }

    async fn token_name(&self, chain_id: u64, contract: &Address) -> Result<String, ChainDataError> {
        self.call_text(chain_id, contract, IERC20::nameCall {}.abi_encode())
            .await
    }

    async fn token_balance(
        &self,
        chain_id: u64,
        contract: &Address,
        owner: &Address,
    ) -> Result<U256, ChainDataError> {
        let call = IERC20::balanceOfCall { owner: *owner };
        let ret = self.eth_call(chain_id, contract, call.abi_encode()).await?;
        let decoded = IERC20::balanceOfCall::abi_decode_returns(&ret, true)
            .map_err(|e| ChainDataError::Decode(e.to_string()))?;
        Ok(decoded._0)
    }
}
