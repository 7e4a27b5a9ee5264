//! # Remote Signer CLI
//!
//! ピアから届くリクエストをファイルから読み込み、デコード結果の確認や
//! モック署名器を使った承認・拒否の流れを端末上で再現する。
//!
//! ```bash
//! # リクエストのデコードとネットワーク解決
//! signer-cli decode --request req.json --session session.json --active-chain 1
//!
//! # モック署名器で承認まで通す
//! signer-cli simulate --request req.json --session session.json \
//!     --account 0x1111111111111111111111111111111111111111 --pin 123456
//! ```
//!
//! RPCエンドポイントは `SIGNER_RPC_URLS`（`chainId=url` のカンマ区切り）で指定する。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use signer_coordinator::{
    ui_channel, AuthenticationProof, ChainDataProvider, ChannelTransport, Collaborators,
    CoordinatorConfig, LifecycleState, MockSigner, RpcChainData, RpcEndpoints, SigningCoordinator,
    UiReceiver, WalletContext,
};
use signer_core::{classify, resolve, DecodedView, NetworkCatalog, NetworkEdit};
use signer_types::{Address, IncomingRequest, Network, PeerMessage, Session};

#[derive(Parser, Debug)]
#[command(name = "signer-cli", version, about = "Remote signer request tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// リクエストをデコードし、対象ネットワークとともにJSONで表示する
    Decode {
        /// リクエストのJSONファイル
        #[arg(long)]
        request: PathBuf,
        /// セッションのJSONファイル（省略時は空のセッション）
        #[arg(long)]
        session: Option<PathBuf>,
        /// ウォレットで選択中のチェーンID
        #[arg(long, default_value_t = 1)]
        active_chain: u64,
        /// transfer/approveのトークン情報をRPCで取得する
        #[arg(long)]
        enrich: bool,
    },
    /// モック署名器でリクエストの承認または拒否を再現する
    Simulate {
        #[arg(long)]
        request: PathBuf,
        #[arg(long)]
        session: PathBuf,
        /// ウォレットで選択中のアカウント
        #[arg(long)]
        account: Address,
        #[arg(long, default_value_t = 1)]
        active_chain: u64,
        /// 署名器が期待するPIN
        #[arg(long, default_value = "123456")]
        signer_pin: String,
        /// ユーザーが入力したPIN
        #[arg(long)]
        pin: Option<String>,
        /// 署名せずに拒否する
        #[arg(long)]
        reject: bool,
    },
    /// トークン追加の確認内容をRPCで取得する
    Token {
        #[arg(long)]
        chain_id: u64,
        #[arg(long)]
        contract: Address,
        #[arg(long)]
        owner: Option<Address>,
    },
    /// ネットワーク追加の編集内容を検証して表示する
    AddChain {
        /// ネットワークのJSONファイル
        #[arg(long)]
        network: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// カンマ区切りのRPC URL
        #[arg(long)]
        rpc_urls: Option<String>,
        #[arg(long)]
        explorer: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Decode {
            request,
            session,
            active_chain,
            enrich,
        } => decode(&request, session.as_deref(), active_chain, enrich).await,
        Command::Simulate {
            request,
            session,
            account,
            active_chain,
            signer_pin,
            pin,
            reject,
        } => {
            let pin = pin.unwrap_or_else(|| signer_pin.clone());
            simulate(&request, &session, account, active_chain, &signer_pin, &pin, reject).await
        }
        Command::Token {
            chain_id,
            contract,
            owner,
        } => token(chain_id, contract, owner).await,
        Command::AddChain {
            network,
            symbol,
            rpc_urls,
            explorer,
        } => add_chain(&network, symbol, rpc_urls, explorer),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("{} の読み込みに失敗", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} のパースに失敗", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn rpc_chain_data() -> anyhow::Result<RpcChainData> {
    let endpoints = RpcEndpoints::from_env()?;
    Ok(RpcChainData::new(endpoints))
}

async fn decode(
    request_path: &Path,
    session_path: Option<&Path>,
    active_chain: u64,
    enrich: bool,
) -> anyhow::Result<()> {
    let request: IncomingRequest = read_json(request_path)?;
    let session: Session = match session_path {
        Some(path) => read_json(path)?,
        None => Session::default(),
    };
    let catalog = NetworkCatalog::public();

    let network = resolve(&session, request.chain_id, active_chain, &catalog);
    let mut view = classify(&request);

    if enrich {
        if let (Some(contract), DecodedView::Transaction(tx)) = (view.token_contract(), &mut view) {
            let rpc = rpc_chain_data()?;
            let (decimals, symbol) = tokio::join!(
                rpc.token_decimals(network.chain_id, &contract),
                rpc.token_symbol(network.chain_id, &contract),
            );
            match decimals {
                Ok(decimals) => {
                    tx.token.apply_decimals(decimals);
                }
                Err(e) => tracing::warn!(error = %e, "decimalsを取得できませんでした"),
            }
            match symbol {
                Ok(symbol) => {
                    tx.token.apply_symbol(symbol);
                }
                Err(e) => tracing::warn!(error = %e, "symbolを取得できませんでした"),
            }
        }
    }

    let amount = match &view {
        DecodedView::Transaction(tx) if tx.is_token_call() => Some(tx.token.amount()),
        DecodedView::Transaction(tx) => Some(tx.value()),
        _ => None,
    };
    print_json(&serde_json::json!({
        "network": network,
        "view": view,
        "amount": amount,
    }))
}

async fn simulate(
    request_path: &Path,
    session_path: &Path,
    account: Address,
    active_chain: u64,
    signer_pin: &str,
    pin: &str,
    reject: bool,
) -> anyhow::Result<()> {
    let request: IncomingRequest = read_json(request_path)?;
    let session: Session = read_json(session_path)?;

    let catalog = NetworkCatalog::public();
    let mut endpoints = RpcEndpoints::from_catalog(&catalog);
    endpoints.merge(RpcEndpoints::from_env()?);

    let (transport, mut peer) = ChannelTransport::channel();
    let (ui_tx, mut ui) = ui_channel();
    let coordinator = SigningCoordinator::new(
        Arc::new(session),
        catalog,
        WalletContext::new(Some(account), active_chain),
        Collaborators {
            signer: Arc::new(MockSigner::new(Some(signer_pin))),
            chain_data: Arc::new(RpcChainData::new(endpoints)),
            transport: Arc::new(transport),
            ui: ui_tx,
        },
        CoordinatorConfig::from_env()?,
    );

    let handle = coordinator.begin(request).await;
    print_ui_events(&mut ui)?;

    match coordinator.state(&handle) {
        Some(LifecycleState::Ready) => {}
        state => {
            // 処理できないリクエストは受付時点で破棄される
            println!("リクエストは確認画面を開かずに終了しました: {state:?}");
            print_peer_messages(&mut peer)?;
            return Ok(());
        }
    }

    if reject {
        coordinator.reject(&handle, None).await;
    } else {
        match coordinator
            .sign(&handle, &AuthenticationProof::from_pin(pin))
            .await
        {
            Ok(approval) => tracing::info!(result = %approval.result, "承認しました"),
            Err(e) => {
                tracing::warn!(error = %e, "署名できませんでした");
                coordinator.reject(&handle, None).await;
            }
        }
    }

    print_ui_events(&mut ui)?;
    print_peer_messages(&mut peer)?;
    coordinator.close(&handle);
    Ok(())
}

fn print_ui_events(ui: &mut UiReceiver) -> anyhow::Result<()> {
    while let Ok(event) = ui.try_recv() {
        print_json(&event)?;
    }
    Ok(())
}

fn print_peer_messages(
    peer: &mut tokio::sync::mpsc::UnboundedReceiver<PeerMessage>,
) -> anyhow::Result<()> {
    while let Ok(message) = peer.try_recv() {
        print_json(&message)?;
    }
    Ok(())
}

async fn token(chain_id: u64, contract: Address, owner: Option<Address>) -> anyhow::Result<()> {
    let rpc = rpc_chain_data()?;
    let (transport, _peer) = ChannelTransport::channel();
    let (ui_tx, mut ui) = ui_channel();
    let coordinator = SigningCoordinator::new(
        Arc::new(Session::default()),
        NetworkCatalog::public(),
        WalletContext::new(owner, chain_id),
        Collaborators {
            signer: Arc::new(MockSigner::new(None)),
            chain_data: Arc::new(rpc),
            transport: Arc::new(transport),
            ui: ui_tx,
        },
        CoordinatorConfig::default(),
    );

    coordinator
        .propose_asset(chain_id, contract, owner)
        .await
        .context("トークン情報の取得に失敗")?;
    print_ui_events(&mut ui)
}

fn add_chain(
    path: &Path,
    symbol: Option<String>,
    rpc_urls: Option<String>,
    explorer: Option<String>,
) -> anyhow::Result<()> {
    let network: Network = read_json(path)?;
    let mut edit = NetworkEdit::from_network(&network, &[]);
    if let Some(symbol) = symbol {
        edit.symbol = symbol;
    }
    if let Some(rpc_urls) = rpc_urls {
        edit.rpc_urls = rpc_urls;
    }
    if let Some(explorer) = explorer {
        edit.explorer = explorer;
    }
    if !edit.is_complete() {
        bail!("symbol・RPC URL・explorerをすべて入力してください");
    }

    let mut catalog = NetworkCatalog::public();
    let mut added = edit.apply(&network);
    added.is_user_added = true;
    catalog.upsert(added.clone());
    tracing::info!(chain_id = added.chain_id, networks = catalog.iter().count(), "ネットワークを追加しました");
    print_json(&added)
}
