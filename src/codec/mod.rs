//! At-rest codec for sensitive strategy columns.
//!
//! Columns are stored as a reversible two-stage transform: serialize ->
//! zlib-compress (base64 wrapped) -> optionally AEAD-encrypt -> opaque blob.
//! Decoding is degrade-graceful: a corrupt or legacy-format blob comes back
//! as the raw stored bytes with a warning, never as an error. Downstream
//! code depends on receiving *something* rather than failing a whole batch.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

const NONCE_LEN: usize = 24;

/// zlib-compress text and wrap it in base64
pub fn compress_to_base64(text: &str) -> crate::Result<String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes())?;
    Ok(BASE64.encode(encoder.finish()?))
}

/// Reverse of [`compress_to_base64`]
pub fn decompress_from_base64(encoded: &str) -> crate::Result<String> {
    let compressed = BASE64.decode(encoded.trim())?;
    let mut decoder = ZlibDecoder::new(compressed.as_slice());
    let mut text = String::new();
    decoder.read_to_string(&mut text)?;
    Ok(text)
}

/// Encode a plain (compressed, unencrypted) column value
pub fn encode_compressed(text: &str) -> crate::Result<Vec<u8>> {
    Ok(compress_to_base64(text)?.into_bytes())
}

/// Decode a plain column value, falling back to the raw bytes on any
/// decode failure.
pub fn decode_compressed(stored: &[u8]) -> String {
    match try_decode_compressed(stored) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("column decode failed ({}), returning raw bytes", e);
            String::from_utf8_lossy(stored).into_owned()
        }
    }
}

fn try_decode_compressed(stored: &[u8]) -> crate::Result<String> {
    decompress_from_base64(std::str::from_utf8(stored)?)
}

/// AEAD codec for sensitive columns (key material).
///
/// The key is derived from a passphrase with SHA-256; each blob carries its
/// own random nonce as a prefix.
#[derive(Clone)]
pub struct CipherCodec {
    cipher: XChaCha20Poly1305,
}

impl CipherCodec {
    pub fn new(passphrase: &str) -> Self {
        let key: [u8; 32] = Sha256::digest(passphrase.as_bytes()).into();
        Self {
            cipher: XChaCha20Poly1305::new(&key.into()),
        }
    }

    /// Compress then encrypt a column value
    pub fn encode(&self, text: &str) -> crate::Result<Vec<u8>> {
        let compressed = compress_to_base64(text)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from(nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, compressed.as_bytes())
            .map_err(|e| format!("column encryption failed: {}", e))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt then decompress, falling back to the raw bytes on any
    /// failure (wrong key, truncated blob, legacy plaintext row).
    pub fn decode(&self, stored: &[u8]) -> String {
        match self.try_decode(stored) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("sensitive column decode failed ({}), returning raw bytes", e);
                String::from_utf8_lossy(stored).into_owned()
            }
        }
    }

    fn try_decode(&self, stored: &[u8]) -> crate::Result<String> {
        if stored.len() <= NONCE_LEN {
            return Err("blob shorter than nonce".into());
        }
        let (nonce_bytes, ciphertext) = stored.split_at(NONCE_LEN);
        let nonce = XNonce::from_slice(nonce_bytes);

        let compressed = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| format!("column decryption failed: {}", e))?;

        decompress_from_base64(std::str::from_utf8(&compressed)?)
    }
}
