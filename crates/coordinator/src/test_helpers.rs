//! # テスト用共通ヘルパー
//!
//! JSON-RPCエンドポイントのモックサーバー。

use std::sync::Arc;

use axum::Json;
use serde_json::Value;

use signer_types::U256;

/// `eth_call` に応答するモックサーバーを起動する。
/// `handler` はcalldataを受け取り、戻り値のバイト列を返す。
pub async fn start_mock_rpc<F>(handler: F) -> u16
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
{
    use axum::routing::post;

    let handler = Arc::new(handler);
    let app = axum::Router::new().route(
        "/",
        post(move |Json(body): Json<Value>| {
            let handler = Arc::clone(&handler);
            async move {
                let data = body["params"][0]["data"].as_str().unwrap_or("0x");
                let calldata = hex::decode(data.trim_start_matches("0x")).unwrap();
                let ret = handler(&calldata);
                Json(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": body["id"],
                    "result": format!("0x{}", hex::encode(ret)),
                }))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    port
}

/// 32バイトのABIワード。
pub fn abi_word(value: U256) -> Vec<u8> {
    value.to_be_bytes::<32>().to_vec()
}
