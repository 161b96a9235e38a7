//! # テスト用共通ヘルパー
//!
//! トランザクション構築とモックJSON-RPCサーバー。

use base64::Engine;
use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::signer::keypair::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;

use crate::transaction::b64;

/// fee payer + authority の2署名者を持つ送金トランザクションを構築する（未署名）。
pub fn build_transfer_tx(fee_payer: &Pubkey, authority: &Keypair) -> Transaction {
    let recipient = Pubkey::new_unique();
    let ix = solana_sdk::system_instruction::transfer(&authority.pubkey(), &recipient, 1_000);
    let message = Message::new_with_blockhash(&[ix], Some(fee_payer), &Hash::new_unique());

    let num_signers = message.header.num_required_signatures as usize;
    Transaction {
        signatures: vec![Signature::default(); num_signers],
        message,
    }
}

/// 指定キーペアに対応する署名スロットに署名する。
pub fn sign_slot(tx: &mut Transaction, keypair: &Keypair) {
    let index = tx
        .message
        .account_keys
        .iter()
        .position(|k| *k == keypair.pubkey())
        .unwrap();
    tx.signatures[index] = keypair.sign_message(&tx.message.serialize());
}

pub fn encode_tx(tx: &Transaction) -> String {
    b64().encode(bincode::serialize(tx).unwrap())
}

/// テスト用モックJSON-RPCサーバーを起動し、ベースURLを返す。
/// `responder`はメソッド名とparamsを受け取り、JSON-RPCレスポンス全体を返す。
pub async fn start_mock_rpc<F>(responder: F) -> String
where
    F: Fn(&str, &serde_json::Value) -> serde_json::Value + Clone + Send + Sync + 'static,
{
    use axum::routing::post;
    use axum::Json;

    let app = axum::Router::new().route(
        "/",
        post(move |Json(body): Json<serde_json::Value>| {
            let responder = responder.clone();
            async move {
                let method = body["method"].as_str().unwrap_or_default().to_string();
                Json(responder(&method, &body["params"]))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    format!("http://127.0.0.1:{port}")
}

/// 接続を受け付けないアドレス（bindした直後に閉じたポート）。
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}
