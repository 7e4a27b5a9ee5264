use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use alloy_sol_types::SolCall;
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

use signer_core::erc20::IERC20;
use signer_core::{DecodedView, MessageView, NetworkCatalog};
use signer_types::{
    Address, IncomingRequest, PeerMessage, PeerMeta, RequestId, Session, TokenMetadata, U256,
};

use super::*;
use crate::chain_data::mock::StaticChainData;
use crate::events::{ui_channel, UiReceiver};
use crate::lifecycle::LifecycleChange;
use crate::signer::mock::{MockBehavior, MockSigner};
use crate::signer::AuthenticationProof;
use crate::transport::ChannelTransport;
use crate::SigningError;

const ACCOUNT: Address = Address::repeat_byte(0x11);
const STRANGER: Address = Address::repeat_byte(0x99);
const USDT: Address = Address::repeat_byte(0xdd);
const PIN: &str = "123456";

struct Harness {
    coordinator: SigningCoordinator,
    signer: Arc<MockSigner>,
    chain_data: Arc<StaticChainData>,
    wallet: WalletContext,
    peer: UnboundedReceiver<PeerMessage>,
    ui: UiReceiver,
}

fn session(enabled_chain_ids: Vec<u64>) -> Session {
    Session {
        accounts: HashSet::from([ACCOUNT]),
        enabled_chain_ids,
        peer_meta: PeerMeta {
            name: "Example DApp".into(),
            url: "https://dapp.example".into(),
            ..Default::default()
        },
    }
}

fn usdt() -> TokenMetadata {
    TokenMetadata {
        contract: USDT,
        name: "Tether USD".into(),
        symbol: "USDT".into(),
        decimals: 6,
        balance: U256::from(42_000_000u64),
    }
}

fn harness_with(
    signer: MockSigner,
    chain_data: StaticChainData,
    config: CoordinatorConfig,
    enabled_chain_ids: Vec<u64>,
) -> Harness {
    let signer = Arc::new(signer);
    let chain_data = Arc::new(chain_data);
    let (transport, peer) = ChannelTransport::channel();
    let (ui_tx, ui) = ui_channel();
    let wallet = WalletContext::new(Some(ACCOUNT), 1);

    let coordinator = SigningCoordinator::new(
        Arc::new(session(enabled_chain_ids)),
        NetworkCatalog::public(),
        wallet.clone(),
        Collaborators {
            signer: signer.clone(),
            chain_data: chain_data.clone(),
            transport: Arc::new(transport),
            ui: ui_tx,
        },
        config,
    );

    Harness {
        coordinator,
        signer,
        chain_data,
        wallet,
        peer,
        ui,
    }
}

fn harness() -> Harness {
    harness_with(
        MockSigner::new(Some(PIN)),
        StaticChainData::new().with_token(1, usdt()),
        CoordinatorConfig::default(),
        vec![1, 56],
    )
}

fn drain<T>(rx: &mut UnboundedReceiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}

fn proof() -> AuthenticationProof {
    AuthenticationProof::from_pin(PIN)
}

fn personal_sign(id: u64) -> IncomingRequest {
    IncomingRequest {
        id: RequestId(id),
        method: "personal_sign".into(),
        params: vec![json!(format!("0x{}", hex::encode("Hello"))), json!(ACCOUNT)],
        chain_id: None,
    }
}

fn token_transfer(id: u64, amount: u64) -> IncomingRequest {
    let calldata = IERC20::transferCall {
        to: Address::repeat_byte(0x22),
        amount: U256::from(amount),
    }
    .abi_encode();
    IncomingRequest {
        id: RequestId(id),
        method: "eth_sendTransaction".into(),
        params: vec![json!({
            "from": ACCOUNT,
            "to": USDT,
            "data": format!("0x{}", hex::encode(calldata)),
            "value": "0x0",
        })],
        chain_id: Some(1),
    }
}

/// 変更通知を `count` 件受け取る。
async fn next_changes(
    rx: &mut UnboundedReceiver<LifecycleChange>,
    count: usize,
) -> Vec<LifecycleChange> {
    let mut changes = Vec::new();
    while changes.len() < count {
        let change = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for lifecycle change")
            .expect("subscription closed");
        changes.push(change);
    }
    changes
}

// ---------------------------------------------------------------------------
// begin
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_begin_personal_sign_opens_sign_modal() {
    let mut h = harness();
    let handle = h.coordinator.begin(personal_sign(1)).await;

    assert_eq!(h.coordinator.state(&handle), Some(LifecycleState::Ready));
    assert_eq!(
        h.coordinator.view(&handle),
        Some(DecodedView::Message(MessageView::PlainText("Hello".into())))
    );

    let events = drain(&mut h.ui);
    assert_eq!(events.len(), 1);
    match &events[0] {
        UiEvent::OpenSign { id, network, peer, .. } => {
            assert_eq!(*id, RequestId(1));
            assert_eq!(network.chain_id, 1);
            assert!(network.authorized);
            assert_eq!(peer.name, "Example DApp");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(drain(&mut h.peer).is_empty());
}

#[tokio::test]
async fn test_begin_resolves_first_enabled_chain() {
    let h = harness();
    h.wallet.set_chain_id(137);
    let handle = h.coordinator.begin(personal_sign(1)).await;
    assert_eq!(h.coordinator.network(&handle).unwrap().chain_id, 1);
}

#[tokio::test]
async fn test_unauthorized_fallback_network_is_flagged() {
    let h = harness_with(
        MockSigner::new(Some(PIN)),
        StaticChainData::new(),
        CoordinatorConfig::default(),
        vec![999_999],
    );
    let handle = h.coordinator.begin(personal_sign(1)).await;
    let network = h.coordinator.network(&handle).unwrap();
    assert_eq!(network.chain_id, 1);
    assert!(!network.authorized);
}

#[tokio::test]
async fn test_unsupported_method_closes_silently() {
    let mut h = harness();
    let handle = h
        .coordinator
        .begin(IncomingRequest {
            id: RequestId(5),
            method: "eth_signTransaction".into(),
            params: vec![],
            chain_id: None,
        })
        .await;

    assert_eq!(h.coordinator.state(&handle), None);
    assert_eq!(drain(&mut h.ui), vec![UiEvent::Close { id: RequestId(5) }]);
    assert!(drain(&mut h.peer).is_empty());

    // 破棄済みなので拒否も画面の再クローズも起きない
    assert!(!h.coordinator.reject(&handle, None).await);
    assert!(!h.coordinator.close(&handle));
    assert!(drain(&mut h.peer).is_empty());
    assert!(drain(&mut h.ui).is_empty());
}

#[tokio::test]
async fn test_unsupported_requests_leave_no_slots() {
    let mut h = harness();
    let mut handles = Vec::new();
    for id in 100..103 {
        handles.push(
            h.coordinator
                .begin(IncomingRequest {
                    id: RequestId(id),
                    method: "eth_signTransaction".into(),
                    params: vec![],
                    chain_id: None,
                })
                .await,
        );
    }

    assert!(h.coordinator.arena().is_empty());
    assert_eq!(
        drain(&mut h.ui),
        (100..103)
            .map(|id| UiEvent::Close { id: RequestId(id) })
            .collect::<Vec<_>>()
    );
    for handle in &handles {
        assert!(!h.coordinator.close(handle));
    }
    assert!(drain(&mut h.ui).is_empty());
}

#[tokio::test]
async fn test_malformed_request_rejected_when_configured() {
    let mut h = harness_with(
        MockSigner::new(Some(PIN)),
        StaticChainData::new(),
        CoordinatorConfig {
            reject_unsupported: true,
            ..Default::default()
        },
        vec![1],
    );
    let handle = h
        .coordinator
        .begin(IncomingRequest {
            id: RequestId(6),
            method: "personal_sign".into(),
            params: vec![],
            chain_id: None,
        })
        .await;

    assert_eq!(h.coordinator.state(&handle), None);
    assert_eq!(drain(&mut h.ui), vec![UiEvent::Close { id: RequestId(6) }]);
    assert_eq!(
        drain(&mut h.peer),
        vec![PeerMessage::Reject {
            id: RequestId(6),
            reason: "Unsupported request".into()
        }]
    );
    assert_eq!(h.signer.invocations(), 0);
}

// ---------------------------------------------------------------------------
// sign / reject
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_sign_then_reject_sends_single_approve() {
    let mut h = harness();
    let handle = h.coordinator.begin(personal_sign(1)).await;

    let approval = h.coordinator.sign(&handle, &proof()).await.unwrap();
    assert_eq!(approval.id, RequestId(1));
    assert!(approval.result.starts_with("0x"));
    assert_eq!(h.coordinator.state(&handle), Some(LifecycleState::Approved));

    for _ in 0..3 {
        assert!(!h.coordinator.reject(&handle, Some("too late")).await);
    }

    let messages = drain(&mut h.peer);
    assert_eq!(
        messages,
        vec![PeerMessage::Approve {
            id: RequestId(1),
            result: approval.result.clone()
        }]
    );
    assert!(drain(&mut h.ui).contains(&UiEvent::Success {
        id: RequestId(1),
        dismiss_after: Duration::from_millis(1750),
    }));
}

#[tokio::test]
async fn test_reject_twice_sends_single_reject() {
    let mut h = harness();
    let handle = h.coordinator.begin(personal_sign(1)).await;

    assert!(h.coordinator.reject(&handle, None).await);
    assert!(!h.coordinator.reject(&handle, None).await);

    assert_eq!(
        drain(&mut h.peer),
        vec![PeerMessage::Reject {
            id: RequestId(1),
            reason: "User rejected".into()
        }]
    );
    assert_eq!(h.coordinator.state(&handle), None);
    assert!(h.coordinator.arena().is_empty());
    assert_eq!(
        drain(&mut h.ui).last(),
        Some(&UiEvent::Close { id: RequestId(1) })
    );
    assert_eq!(
        h.coordinator.sign(&handle, &proof()).await,
        Err(SigningError::UnknownRequest(RequestId(1)))
    );
}

#[tokio::test]
async fn test_reject_stops_enrichment() {
    let h = harness_with(
        MockSigner::new(Some(PIN)),
        StaticChainData::new()
            .with_token(1, usdt())
            .with_delays(Duration::from_millis(50), Duration::from_millis(80)),
        CoordinatorConfig::default(),
        vec![1],
    );
    let handle = h.coordinator.begin(token_transfer(3, 1_000_000)).await;
    let mut sub = h.coordinator.subscribe(&handle).unwrap();
    assert!(h.coordinator.reject(&handle, None).await);

    let mut changes = Vec::new();
    while let Some(change) = sub.changes.recv().await {
        changes.push(change);
    }
    assert_eq!(changes, vec![LifecycleChange::State(LifecycleState::Rejected)]);

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(h.coordinator.view(&handle), None);
    assert!(h.coordinator.arena().is_empty());
}

#[tokio::test]
async fn test_unauthorized_account_never_reaches_signer() {
    let mut h = harness();
    let handle = h.coordinator.begin(personal_sign(1)).await;
    h.wallet.set_account(Some(STRANGER));

    assert_eq!(
        h.coordinator.sign(&handle, &proof()).await,
        Err(SigningError::AccountNotAuthorized)
    );
    assert_eq!(h.signer.invocations(), 0);
    assert_eq!(h.coordinator.state(&handle), Some(LifecycleState::Ready));

    h.wallet.set_account(None);
    assert_eq!(
        h.coordinator.sign(&handle, &proof()).await,
        Err(SigningError::AccountNotAuthorized)
    );
    assert_eq!(h.signer.invocations(), 0);
    assert!(drain(&mut h.peer).is_empty());
}

#[tokio::test]
async fn test_failed_signature_allows_retry() {
    let mut h = harness();
    let handle = h.coordinator.begin(personal_sign(1)).await;

    let wrong = AuthenticationProof::from_pin("000000");
    assert!(matches!(
        h.coordinator.sign(&handle, &wrong).await,
        Err(SigningError::SignerFailure(_))
    ));
    assert_eq!(h.coordinator.state(&handle), Some(LifecycleState::Failed));
    assert!(drain(&mut h.peer).is_empty());

    h.signer.set_behavior(MockBehavior::Fail);
    assert!(matches!(
        h.coordinator.sign(&handle, &proof()).await,
        Err(SigningError::SignerFailure(_))
    ));
    assert_eq!(h.coordinator.state(&handle), Some(LifecycleState::Failed));

    h.signer.set_behavior(MockBehavior::Sign);
    h.coordinator.sign(&handle, &proof()).await.unwrap();
    assert_eq!(h.coordinator.state(&handle), Some(LifecycleState::Approved));
    assert_eq!(h.signer.invocations(), 3);
    assert_eq!(drain(&mut h.peer).len(), 1);
}

#[tokio::test]
async fn test_failed_request_can_be_rejected() {
    let mut h = harness_with(
        MockSigner::new(Some(PIN)).with_behavior(MockBehavior::Decline),
        StaticChainData::new(),
        CoordinatorConfig::default(),
        vec![1],
    );
    let handle = h.coordinator.begin(personal_sign(1)).await;
    assert!(h.coordinator.sign(&handle, &proof()).await.is_err());
    assert!(h.coordinator.reject(&handle, Some("gave up")).await);
    assert_eq!(
        drain(&mut h.peer),
        vec![PeerMessage::Reject {
            id: RequestId(1),
            reason: "gave up".into()
        }]
    );
}

#[tokio::test]
async fn test_reject_during_signing_discards_signature() {
    let mut h = harness_with(
        MockSigner::new(Some(PIN)).with_delay(Duration::from_millis(100)),
        StaticChainData::new(),
        CoordinatorConfig::default(),
        vec![1],
    );
    let handle = h.coordinator.begin(personal_sign(1)).await;

    let coordinator = h.coordinator.clone();
    let signing = tokio::spawn(async move { coordinator.sign(&handle, &proof()).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.coordinator.state(&handle), Some(LifecycleState::Signing));

    assert!(h.coordinator.reject(&handle, None).await);
    assert_eq!(signing.await.unwrap(), Err(SigningError::Superseded));

    assert_eq!(h.coordinator.state(&handle), None);
    let messages = drain(&mut h.peer);
    assert_eq!(messages.len(), 1);
    assert!(matches!(messages[0], PeerMessage::Reject { .. }));
}

#[tokio::test]
async fn test_close_during_signing_sends_nothing() {
    let mut h = harness_with(
        MockSigner::new(Some(PIN)).with_delay(Duration::from_millis(100)),
        StaticChainData::new(),
        CoordinatorConfig::default(),
        vec![1],
    );
    let handle = h.coordinator.begin(personal_sign(1)).await;

    let coordinator = h.coordinator.clone();
    let signing = tokio::spawn(async move { coordinator.sign(&handle, &proof()).await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(h.coordinator.close(&handle));
    assert_eq!(signing.await.unwrap(), Err(SigningError::Superseded));
    assert!(drain(&mut h.peer).is_empty());
    assert_eq!(h.coordinator.state(&handle), None);
    assert!(!h.coordinator.reject(&handle, None).await);
}

#[tokio::test]
async fn test_stale_handle_after_rebegin() {
    let mut h = harness();
    let first = h.coordinator.begin(personal_sign(1)).await;
    let second = h.coordinator.begin(personal_sign(1)).await;
    assert_ne!(first.generation, second.generation);

    assert_eq!(
        h.coordinator.sign(&first, &proof()).await,
        Err(SigningError::Superseded)
    );
    assert!(!h.coordinator.reject(&first, None).await);
    assert_eq!(h.coordinator.state(&first), None);
    assert!(drain(&mut h.peer).is_empty());

    assert_eq!(
        h.coordinator
            .sign(
                &LifecycleHandle {
                    id: RequestId(404),
                    generation: 1
                },
                &proof()
            )
            .await,
        Err(SigningError::UnknownRequest(RequestId(404)))
    );

    h.coordinator.sign(&second, &proof()).await.unwrap();
    assert_eq!(drain(&mut h.peer).len(), 1);
}

#[tokio::test]
async fn test_approve_delivery_failure_closes_request() {
    let Harness {
        coordinator,
        peer,
        mut ui,
        ..
    } = harness();
    drop(peer);

    let handle = coordinator.begin(personal_sign(1)).await;
    assert!(matches!(
        coordinator.sign(&handle, &proof()).await,
        Err(SigningError::Transport(_))
    ));
    assert_eq!(coordinator.state(&handle), None);
    assert!(coordinator.arena().is_empty());

    let events = drain(&mut ui);
    assert_eq!(events.last(), Some(&UiEvent::Close { id: RequestId(1) }));
    assert!(!events.iter().any(|e| matches!(e, UiEvent::Success { .. })));
}

#[tokio::test]
async fn test_success_dismisses_after_delay() {
    let mut h = harness_with(
        MockSigner::new(Some(PIN)),
        StaticChainData::new(),
        CoordinatorConfig {
            dismiss_delay: Duration::from_millis(10),
            ..Default::default()
        },
        vec![1],
    );
    let handle = h.coordinator.begin(personal_sign(1)).await;
    h.coordinator.sign(&handle, &proof()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let events = drain(&mut h.ui);
    assert_eq!(events.last(), Some(&UiEvent::Close { id: RequestId(1) }));
    assert_eq!(h.coordinator.state(&handle), None);
}

#[tokio::test]
async fn test_typed_data_and_transaction_signing() {
    let mut h = harness();
    let typed = h
        .coordinator
        .begin(IncomingRequest {
            id: RequestId(2),
            method: "eth_signTypedData".into(),
            params: vec![json!(ACCOUNT), json!({ "types": {}, "message": { "a": 1 } })],
            chain_id: None,
        })
        .await;
    assert!(matches!(
        h.coordinator.view(&typed),
        Some(DecodedView::Message(MessageView::TypedData(_)))
    ));
    h.coordinator.sign(&typed, &proof()).await.unwrap();

    let send = h
        .coordinator
        .begin(IncomingRequest {
            id: RequestId(3),
            method: "eth_sendTransaction".into(),
            params: vec![json!({ "from": ACCOUNT, "to": STRANGER, "value": "0xde0b6b3a7640000" })],
            chain_id: None,
        })
        .await;
    let approval = h.coordinator.sign(&send, &proof()).await.unwrap();
    assert_eq!(approval.result.len(), 66);

    let ids: Vec<RequestId> = drain(&mut h.peer).iter().map(PeerMessage::id).collect();
    assert_eq!(ids, vec![RequestId(2), RequestId(3)]);
    // ネイティブ送金はトークン情報を取得しない
    assert_eq!(h.chain_data.calls(), 0);
}

// ---------------------------------------------------------------------------
// トークン情報の補完
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_transfer_enrichment_resolves_token() {
    let mut h = harness();
    let handle = h.coordinator.begin(token_transfer(8, 1_500_000)).await;
    assert!(matches!(
        drain(&mut h.ui).as_slice(),
        [UiEvent::OpenSendTransaction { .. }]
    ));

    let mut sub = h.coordinator.subscribe(&handle).unwrap();
    let mut changes = next_changes(&mut sub.changes, 2).await;
    changes.sort_by_key(|c| format!("{c:?}"));
    assert_eq!(
        changes,
        vec![
            LifecycleChange::TokenDecimals(6),
            LifecycleChange::TokenSymbol("USDT".into())
        ]
    );

    let Some(DecodedView::Transaction(tx)) = h.coordinator.view(&handle) else {
        panic!("transaction view expected");
    };
    assert!(tx.token.resolved);
    assert_eq!(tx.token.amount(), "1.5");
    assert_eq!(tx.recipient, Address::repeat_byte(0x22));
    assert_eq!(h.chain_data.calls(), 2);
    assert!(h.coordinator.unsubscribe(&handle, sub.id));
}

#[tokio::test]
async fn test_stale_enrichment_is_discarded() {
    let h = harness_with(
        MockSigner::new(Some(PIN)),
        StaticChainData::new()
            .with_token(1, usdt())
            .with_delays(Duration::from_millis(50), Duration::from_millis(80)),
        CoordinatorConfig::default(),
        vec![1],
    );

    let stale = h.coordinator.begin(token_transfer(9, 1_000_000)).await;
    let mut stale_sub = h.coordinator.subscribe(&stale).unwrap();
    assert!(h.coordinator.close(&stale));

    // 破棄で購読は閉じ、トークン情報は届かない
    let mut stale_changes = Vec::new();
    while let Some(change) = stale_sub.changes.recv().await {
        stale_changes.push(change);
    }
    assert!(stale_changes
        .iter()
        .all(|c| matches!(c, LifecycleChange::State(_))));

    let current = h.coordinator.begin(token_transfer(9, 2_000_000)).await;
    let mut sub = h.coordinator.subscribe(&current).unwrap();
    next_changes(&mut sub.changes, 2).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let Some(DecodedView::Transaction(tx)) = h.coordinator.view(&current) else {
        panic!("transaction view expected");
    };
    assert_eq!(tx.token.amount(), "2");
    assert_eq!(h.coordinator.view(&stale), None);
}

#[tokio::test]
async fn test_enrichment_unknown_token_keeps_defaults() {
    let h = harness_with(
        MockSigner::new(Some(PIN)),
        StaticChainData::new(),
        CoordinatorConfig::default(),
        vec![1],
    );
    let handle = h.coordinator.begin(token_transfer(10, 5)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let Some(DecodedView::Transaction(tx)) = h.coordinator.view(&handle) else {
        panic!("transaction view expected");
    };
    assert!(!tx.token.resolved);
    assert_eq!(tx.token.decimals, 18);
    assert_eq!(h.coordinator.state(&handle), Some(LifecycleState::Ready));
}

// ---------------------------------------------------------------------------
// ネットワーク・トークン追加
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_propose_asset_fetches_metadata() {
    let mut h = harness();
    let token = h.coordinator.propose_asset(1, USDT, None).await.unwrap();
    assert_eq!(token, usdt());
    assert_eq!(
        drain(&mut h.ui),
        vec![UiEvent::OpenAddAsset {
            chain_id: 1,
            token: usdt()
        }]
    );

    assert!(h.coordinator.propose_asset(56, USDT, None).await.is_err());
    assert!(drain(&mut h.ui).is_empty());
}

#[tokio::test]
async fn test_propose_and_add_chain() {
    let mut h = harness();
    let network = signer_types::Network {
        chain_id: 8453,
        network: "Base".into(),
        symbol: "ETH".into(),
        color: "#0052ff".into(),
        explorer: "https://basescan.org".into(),
        rpc_urls: vec!["https://mainnet.base.org".into()],
        is_user_added: false,
    };

    h.coordinator.propose_chain(network.clone());
    assert_eq!(
        drain(&mut h.ui),
        vec![UiEvent::OpenAddChain {
            network: network.clone()
        }]
    );

    h.coordinator.add_network(network);
    let added = h
        .coordinator
        .networks()
        .into_iter()
        .find(|n| n.chain_id == 8453)
        .unwrap();
    assert!(added.is_user_added);
}
