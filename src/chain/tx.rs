//! Solana legacy transaction wire format.
//!
//! Just enough of the message encoding to build and sign the two transfer
//! shapes this service submits itself (System transfer, SPL Token transfer)
//! and to countersign transactions built for us by the swap aggregator.

use crate::Result;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};

/// System program: all zeros ("11111111111111111111111111111111")
const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];

/// SPL Token program
const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// System program Transfer instruction tag
const SYSTEM_IX_TRANSFER: u32 = 2;

/// SPL Token Transfer instruction tag
const TOKEN_IX_TRANSFER: u8 = 3;

/// Executor signing identity (ed25519)
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Accepts either a 32-byte seed or a 64-byte seed+pubkey concatenation
    /// (the format Solana wallets export), base58 encoded.
    pub fn from_base58(encoded: &str) -> Result<Self> {
        let bytes = bs58::decode(encoded.trim()).into_vec()?;
        let seed: [u8; 32] = match bytes.len() {
            32 => bytes.as_slice().try_into()?,
            64 => bytes[..32].try_into()?,
            n => return Err(format!("unexpected key length: {} bytes", n).into()),
        };
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    pub fn pubkey(&self) -> [u8; 32] {
        VerifyingKey::from(&self.signing_key).to_bytes()
    }

    pub fn pubkey_base58(&self) -> String {
        bs58::encode(self.pubkey()).into_string()
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

/// Decode a base58 account address into its 32 raw bytes
pub fn decode_pubkey(address: &str) -> Result<[u8; 32]> {
    let bytes = bs58::decode(address.trim()).into_vec()?;
    let key: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("address is not 32 bytes: {}", address))?;
    Ok(key)
}

/// Solana's compact-u16 (shortvec) length prefix
pub fn encode_compact_u16(mut value: u16, out: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a compact-u16 prefix; returns (value, bytes consumed)
pub fn decode_compact_u16(bytes: &[u8]) -> Result<(u16, usize)> {
    let mut value: u16 = 0;
    for (i, byte) in bytes.iter().take(3).enumerate() {
        value |= ((byte & 0x7f) as u16) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err("malformed compact-u16 prefix".into())
}

struct Instruction {
    program_id_index: u8,
    account_indices: Vec<u8>,
    data: Vec<u8>,
}

/// Serialize and sign a single-signer legacy transaction.
///
/// `account_keys[0]` must be the fee payer (the signer); `readonly_unsigned`
/// is the count of trailing readonly accounts (program ids).
fn sign_and_serialize(
    keypair: &Keypair,
    account_keys: &[[u8; 32]],
    readonly_unsigned: u8,
    recent_blockhash: [u8; 32],
    instruction: Instruction,
) -> Vec<u8> {
    let mut message = Vec::new();

    // Header: one required signature, no readonly signed accounts
    message.push(1);
    message.push(0);
    message.push(readonly_unsigned);

    encode_compact_u16(account_keys.len() as u16, &mut message);
    for key in account_keys {
        message.extend_from_slice(key);
    }

    message.extend_from_slice(&recent_blockhash);

    encode_compact_u16(1, &mut message);
    message.push(instruction.program_id_index);
    encode_compact_u16(instruction.account_indices.len() as u16, &mut message);
    message.extend_from_slice(&instruction.account_indices);
    encode_compact_u16(instruction.data.len() as u16, &mut message);
    message.extend_from_slice(&instruction.data);

    let signature = keypair.sign(&message);

    let mut tx = Vec::with_capacity(1 + 64 + message.len());
    encode_compact_u16(1, &mut tx);
    tx.extend_from_slice(&signature);
    tx.extend_from_slice(&message);
    tx
}

/// Build and sign a System Program transfer of `lamports` to `recipient`.
pub fn build_transfer(
    keypair: &Keypair,
    recipient: &str,
    lamports: u64,
    recent_blockhash: &str,
) -> Result<Vec<u8>> {
    let to = decode_pubkey(recipient)?;
    let blockhash = decode_pubkey(recent_blockhash)?;

    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_IX_TRANSFER.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());

    Ok(sign_and_serialize(
        keypair,
        &[keypair.pubkey(), to, SYSTEM_PROGRAM_ID],
        1,
        blockhash,
        Instruction {
            program_id_index: 2,
            account_indices: vec![0, 1],
            data,
        },
    ))
}

/// Build and sign an SPL Token transfer between token accounts, with the
/// keypair as both fee payer and token authority.
pub fn build_token_transfer(
    keypair: &Keypair,
    source_token_account: &str,
    dest_token_account: &str,
    base_units: u64,
    recent_blockhash: &str,
) -> Result<Vec<u8>> {
    let source = decode_pubkey(source_token_account)?;
    let dest = decode_pubkey(dest_token_account)?;
    let token_program = decode_pubkey(TOKEN_PROGRAM_ID)?;
    let blockhash = decode_pubkey(recent_blockhash)?;

    let mut data = Vec::with_capacity(9);
    data.push(TOKEN_IX_TRANSFER);
    data.extend_from_slice(&base_units.to_le_bytes());

    Ok(sign_and_serialize(
        keypair,
        &[keypair.pubkey(), source, dest, token_program],
        1,
        blockhash,
        Instruction {
            program_id_index: 3,
            // source, destination, authority
            account_indices: vec![1, 2, 0],
            data,
        },
    ))
}

/// Replace the fee-payer signature slot of an aggregator-built transaction
/// with our signature over its message bytes.
///
/// The swap is requested with our pubkey as the user, so the fee payer slot
/// (signature index 0) belongs to us; any other signature slots are left
/// exactly as the aggregator produced them.
pub fn countersign(tx_bytes: &[u8], keypair: &Keypair) -> Result<Vec<u8>> {
    let (signature_count, prefix_len) = decode_compact_u16(tx_bytes)?;
    if signature_count == 0 {
        return Err("transaction has no signature slots".into());
    }

    let signatures_len = signature_count as usize * 64;
    let message_start = prefix_len + signatures_len;
    if tx_bytes.len() <= message_start {
        return Err("transaction truncated before message".into());
    }

    let message = &tx_bytes[message_start..];
    let signature = keypair.sign(message);

    let mut signed = tx_bytes.to_vec();
    signed[prefix_len..prefix_len + 64].copy_from_slice(&signature);
    Ok(signed)
}
