/// EVM chain client tests against a local JSON-RPC node stand-in
///
/// The node answers `eth_call` by function selector, so these tests cover
/// calldata selection, ABI decoding of return data, revert reasons and
/// receipt polling end to end over HTTP.
mod common;

use anyhow::Result;
use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chaos_star_client::chain::abi::{self, Token};
use chaos_star_client::chain::{
    account_created_id, AccountType, ChainClient, EvmChainClient, TxHash, TxStatus,
    ACCOUNT_CREATED_EVENT, U256,
};
use chaos_star_client::error::{ChainError, DecodeError};
use common::*;

const TX_HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

#[derive(Default)]
struct MockNode {
    /// `eth_call` return data keyed by function signature selector
    calls: Mutex<HashMap<[u8; 4], Vec<u8>>>,
    /// `eth_call` reverts keyed by selector
    reverts: Mutex<HashMap<[u8; 4], String>>,
    /// Receipt polls answered with `null` before the receipt appears
    pending_polls: AtomicUsize,
    receipt_polls: AtomicUsize,
    receipt: Mutex<Option<Value>>,
    sent: Mutex<Vec<Value>>,
}

impl MockNode {
    fn answer(&self, signature: &str, tokens: &[Token]) {
        self.calls
            .lock()
            .unwrap()
            .insert(abi::selector(signature), abi::encode_params(tokens));
    }

    fn answer_empty(&self, signature: &str) {
        self.calls
            .lock()
            .unwrap()
            .insert(abi::selector(signature), Vec::new());
    }

    fn revert(&self, signature: &str, reason: &str) {
        self.reverts
            .lock()
            .unwrap()
            .insert(abi::selector(signature), reason.to_string());
    }
}

fn uint(value: u64) -> Token {
    Token::Uint(U256::from(value))
}

/// One past the largest id a `u64` can hold.
fn too_wide() -> U256 {
    U256::from(u64::MAX) + U256::from(1u8)
}

fn hex_blob(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn revert_data(reason: &str) -> Vec<u8> {
    let mut data = abi::selector("Error(string)").to_vec();
    data.extend(abi::encode_params(&[Token::String(reason.to_string())]));
    data
}

async fn rpc_handler(State(node): State<Arc<MockNode>>, Json(request): Json<Value>) -> Json<Value> {
    let id = request["id"].clone();
    let method = request["method"].as_str().unwrap_or_default();
    let params = &request["params"];

    let outcome: Result<Value, Value> = match method {
        "eth_getCode" => Ok(json!("0x6080")),
        "eth_call" => {
            let data = params[0]["data"].as_str().unwrap_or_default();
            let bytes = hex::decode(data.trim_start_matches("0x")).unwrap_or_default();
            let mut selector = [0u8; 4];
            selector.copy_from_slice(&bytes[..4]);

            if let Some(reason) = node.reverts.lock().unwrap().get(&selector) {
                Err(json!({
                    "code": 3,
                    "message": format!("execution reverted: {}", reason),
                    "data": hex_blob(&revert_data(reason)),
                }))
            } else {
                match node.calls.lock().unwrap().get(&selector) {
                    Some(result) => Ok(json!(hex_blob(result))),
                    None => Err(json!({ "code": -32601, "message": "unknown selector" })),
                }
            }
        }
        "eth_sendTransaction" => {
            node.sent.lock().unwrap().push(params[0].clone());
            Ok(json!(TX_HASH))
        }
        "eth_getTransactionReceipt" => {
            let poll = node.receipt_polls.fetch_add(1, Ordering::SeqCst);
            if poll < node.pending_polls.load(Ordering::SeqCst) {
                Ok(Value::Null)
            } else {
                Ok(node.receipt.lock().unwrap().clone().unwrap_or(Value::Null))
            }
        }
        other => Err(json!({ "code": -32601, "message": format!("method {} not found", other) })),
    };

    Json(match outcome {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err(error) => json!({ "jsonrpc": "2.0", "id": id, "error": error }),
    })
}

/// Serve the node on an ephemeral port and return its URL.
async fn spawn_node(node: Arc<MockNode>) -> Result<String> {
    let app = Router::new().route("/", post(rpc_handler)).with_state(node);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{}", addr))
}

async fn client_for(node: Arc<MockNode>) -> Result<EvmChainClient> {
    init_logging();
    let url = spawn_node(node).await?;
    Ok(EvmChainClient::new(url).with_receipt_polling(5, Duration::from_millis(20)))
}

#[tokio::test]
async fn test_reads_account_ids_and_primary() -> Result<()> {
    let node = Arc::new(MockNode::default());
    node.answer(
        "getAccountsByWallet(address)",
        &[Token::UintArray(vec![U256::from(3u8), U256::from(5u8), U256::from(8u8)])],
    );
    node.answer("getPrimaryAccount(address)", &[uint(5)]);
    node.answer("totalAccounts()", &[uint(42)]);
    let client = client_for(node).await?;

    assert_eq!(
        client.get_accounts_by_wallet(registry(), wallet()).await?,
        vec![3, 5, 8]
    );
    assert_eq!(client.get_primary_account(registry(), wallet()).await?, 5);
    assert_eq!(client.total_accounts(registry()).await?, 42);
    assert_eq!(client.get_code(registry()).await?, vec![0x60, 0x80]);
    Ok(())
}

#[tokio::test]
async fn test_wide_account_id_is_skipped_not_the_list() -> Result<()> {
    let node = Arc::new(MockNode::default());
    node.answer(
        "getAccountsByWallet(address)",
        &[Token::UintArray(vec![U256::from(1u8), too_wide(), U256::from(2u8)])],
    );
    node.answer("getPrimaryAccount(address)", &[Token::Uint(too_wide())]);
    let client = client_for(node).await?;

    assert_eq!(
        client.get_accounts_by_wallet(registry(), wallet()).await?,
        vec![1, 2]
    );
    assert_eq!(client.get_primary_account(registry(), wallet()).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_wide_registered_at_still_reads_identity() -> Result<()> {
    let node = Arc::new(MockNode::default());
    node.answer(
        "ids(address)",
        &[
            Token::String("Ada".to_string()),
            Token::String("Lovelace".to_string()),
            Token::String("ada@chaos.star".to_string()),
            Token::String(String::new()),
            Token::Uint(U256::MAX),
            Token::Bool(true),
        ],
    );
    let client = client_for(node).await?;

    let identity = client.identity_of(digital_id_contract(), wallet()).await?;

    assert_eq!(identity.first_name, "Ada");
    assert_eq!(identity.registered_at.timestamp(), 0);
    assert!(identity.active);
    Ok(())
}

#[tokio::test]
async fn test_decodes_account_record() -> Result<()> {
    let node = Arc::new(MockNode::default());
    node.answer(
        "getAccount(uint256)",
        &[Token::Tuple(vec![
            uint(7),
            Token::String("Treasury Ops".to_string()),
            Token::Address(addr(0x21)),
            uint(1),
            Token::Address(wallet()),
            Token::String("operations".to_string()),
            Token::Address(addr(0x00)),
            Token::Bool(true),
            uint(1_700_000_000),
            uint(1_700_000_100),
        ])],
    );
    let client = client_for(node).await?;

    let account = client.get_account(registry(), 7).await?;

    assert_eq!(account.id, 7);
    assert_eq!(account.name, "Treasury Ops");
    assert_eq!(account.wallet_address, addr(0x21));
    assert_eq!(account.account_type, AccountType::from_index(1));
    assert_eq!(account.owner_wallet, wallet());
    assert_eq!(account.parent_account, None);
    assert!(account.is_active);
    assert_eq!(account.created_at.timestamp(), 1_700_000_000);
    Ok(())
}

#[tokio::test]
async fn test_identity_lookup_decodes_or_reports_empty() -> Result<()> {
    let node = Arc::new(MockNode::default());
    node.answer(
        "ids(address)",
        &[
            Token::String("Ada".to_string()),
            Token::String("Lovelace".to_string()),
            Token::String("ada@chaos.star".to_string()),
            Token::String(String::new()),
            uint(1_700_000_000),
            Token::Bool(true),
        ],
    );
    let client = client_for(node.clone()).await?;

    let identity = client.identity_of(digital_id_contract(), wallet()).await?;
    assert_eq!(identity.first_name, "Ada");
    assert_eq!(identity.email, "ada@chaos.star");
    assert!(identity.active);

    node.answer_empty("ids(address)");
    let result = client.identity_of(digital_id_contract(), wallet()).await;
    match result {
        Err(ChainError::Decode(DecodeError::Empty)) => {}
        other => panic!("expected empty decode, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_revert_reason_is_extracted() -> Result<()> {
    let node = Arc::new(MockNode::default());
    node.revert("ownerOfPlot(uint256)", "Plot does not exist");
    let client = client_for(node).await?;

    let error = client
        .owner_of_plot(plot_contract(), 404)
        .await
        .expect_err("revert");

    assert_eq!(error.reason(), Some("Plot does not exist"));
    assert!(!error.is_decode_absent());
    Ok(())
}

#[tokio::test]
async fn test_write_submits_from_session_wallet() -> Result<()> {
    let node = Arc::new(MockNode::default());
    let client = client_for(node.clone()).await?;

    let hash = client
        .request_transfer(plot_contract(), wallet(), 9, addr(0x44))
        .await?;

    assert_eq!(hash, TxHash(TX_HASH.to_string()));
    let sent = node.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["from"], json!(wallet().to_string()));
    assert_eq!(sent[0]["to"], json!(plot_contract().to_string()));
    let data = sent[0]["data"].as_str().unwrap_or_default().to_string();
    assert!(data.starts_with(&hex_blob(&abi::selector("requestTransfer(uint256,address)"))));
    Ok(())
}

#[tokio::test]
async fn test_receipt_polling_waits_for_inclusion() -> Result<()> {
    let node = Arc::new(MockNode::default());
    node.pending_polls.store(2, Ordering::SeqCst);

    let mut id_topic = [0u8; 32];
    id_topic[31] = 12;
    *node.receipt.lock().unwrap() = Some(json!({
        "status": "0x1",
        "blockNumber": "0x10",
        "logs": [{
            "address": registry().to_string(),
            "topics": [
                hex_blob(abi::event_topic(ACCOUNT_CREATED_EVENT).as_slice()),
                hex_blob(&id_topic),
            ],
            "data": "0x",
        }],
    }));
    let client = client_for(node.clone()).await?;

    let receipt = client.wait_for_receipt(&TxHash(TX_HASH.to_string())).await?;

    assert_eq!(receipt.status, TxStatus::Success);
    assert_eq!(receipt.block_number, Some(16));
    assert_eq!(node.receipt_polls.load(Ordering::SeqCst), 3);
    assert_eq!(account_created_id(&receipt, registry()), Some(12));
    assert_eq!(account_created_id(&receipt, addr(0x01)), None);
    Ok(())
}

#[tokio::test]
async fn test_reverted_receipt_status() -> Result<()> {
    let node = Arc::new(MockNode::default());
    *node.receipt.lock().unwrap() = Some(json!({ "status": "0x0", "blockNumber": "0x2", "logs": [] }));
    let client = client_for(node).await?;

    let receipt = client.wait_for_receipt(&TxHash(TX_HASH.to_string())).await?;

    assert_eq!(receipt.status, TxStatus::Reverted);
    assert!(!receipt.is_success());
    Ok(())
}

#[tokio::test]
async fn test_receipt_polling_gives_up() -> Result<()> {
    let node = Arc::new(MockNode::default());
    let client = client_for(node.clone()).await?;

    let result = client.wait_for_receipt(&TxHash(TX_HASH.to_string())).await;

    assert!(matches!(result, Err(ChainError::NotIncluded { attempts: 5, .. })));
    assert_eq!(node.receipt_polls.load(Ordering::SeqCst), 5);
    Ok(())
}
