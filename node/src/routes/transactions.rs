use axum::{Json, extract::State, http::StatusCode};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use chain::{Address, PublicKey, Signature, Transaction};
use chain::types::tx::{TxCommon, TxKind};

use crate::state::SharedState;

/// Request body for `POST /transactions`.
///
/// Clients sign the transaction themselves (see
/// [`chain::Transaction::signing_bytes`]) and submit the already-signed
/// envelope; the node only queues it.
#[derive(Debug, Deserialize)]
pub struct SubmitTransactionRequest {
    pub kind: TxKindDto,
    pub epoch: u16,
    pub account_nonce: u32,
    pub to_hex: Option<String>,
    pub amount: String,
    pub sender_pubkey_hex: String,
    pub signature_hex: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKindDto {
    Regular,
    Invite,
    Activation,
    Kill,
    NewEpoch,
}

impl From<TxKindDto> for TxKind {
    fn from(dto: TxKindDto) -> Self {
        match dto {
            TxKindDto::Regular => TxKind::Regular,
            TxKindDto::Invite => TxKind::Invite,
            TxKindDto::Activation => TxKind::Activation,
            TxKindDto::Kill => TxKind::Kill,
            TxKindDto::NewEpoch => TxKind::NewEpoch,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitTransactionResponse {
    pub status: &'static str,
    pub tx_hash_hex: String,
}

fn bad_request(msg: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg.into())
}

fn parse_address(hex_str: &str) -> Result<Address, (StatusCode, String)> {
    let bytes = hex::decode(hex_str).map_err(|_| bad_request("invalid hex address"))?;
    if bytes.len() != chain::ADDRESS_LEN {
        return Err(bad_request("address must be 20 bytes"));
    }
    let mut arr = [0u8; 20];
    arr.copy_from_slice(&bytes);
    Ok(Address(arr))
}

fn parse_biguint(s: &str) -> Result<BigUint, (StatusCode, String)> {
    s.parse::<BigUint>()
        .map_err(|_| bad_request("expected a non-negative decimal integer"))
}

/// `POST /transactions`
///
/// Queues a signed transaction into the local pool. The block producer
/// loop includes it in a future block, subject to the executor's
/// nonce, balance, and identity-state checks.
pub async fn submit_transaction(
    State(state): State<SharedState>,
    Json(body): Json<SubmitTransactionRequest>,
) -> Result<(StatusCode, Json<SubmitTransactionResponse>), (StatusCode, String)> {
    let to = body
        .to_hex
        .as_deref()
        .map(parse_address)
        .transpose()?;

    let common = TxCommon {
        kind: body.kind.into(),
        epoch: body.epoch,
        account_nonce: body.account_nonce,
        to,
        amount: parse_biguint(&body.amount)?,
    };

    let sender_pubkey_bytes =
        hex::decode(&body.sender_pubkey_hex).map_err(|_| bad_request("invalid hex public key"))?;
    let signature_bytes =
        hex::decode(&body.signature_hex).map_err(|_| bad_request("invalid hex signature"))?;

    let tx = Transaction {
        common,
        sender_pubkey: PublicKey(sender_pubkey_bytes),
        signature: Signature(signature_bytes),
    };

    tx.verify_signature()
        .map_err(|e| bad_request(format!("signature verification failed: {e}")))?;

    let tx_hash_hex = hex::encode(tx.hash().as_bytes());

    {
        let mut pool = state.tx_pool.lock().await;
        pool.push(tx);
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitTransactionResponse {
            status: "queued",
            tx_hash_hex,
        }),
    ))
}
