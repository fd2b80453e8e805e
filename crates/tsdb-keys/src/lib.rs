//! Key and table-name encoding shared by the persistence adapter (C3) and
//! the persisted-collection wrapper (C5). Every key crossing the adapter
//! boundary is encoded here on the way in and decoded on the way out, so
//! caller code never observes the encoded form.

use data_encoding::{Encoding, Specification};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use tsdb_errors::{Result, TsdbError};

/// A collection row's primary key, as callers see it. Carries its own
/// `Serialize`/`Deserialize` (untagged — a JSON string or number, exactly
/// the shape `changedKeys`/`deletedKeys` wire arrays use) since
/// both the coordinator's `tx:committed` payload and the bridge envelope
/// put keys directly on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StorageKey {
    Str(String),
    Num(f64),
}

impl StorageKey {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StorageKey::Str(s) => Some(s),
            StorageKey::Num(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StorageKey::Num(n) => Some(*n),
            StorageKey::Str(_) => None,
        }
    }
}

/// Encode a key to its on-disk `key_encoded` form: `s:<string>` or
/// `n:<number>`. Numbers must be finite — NaN and +/-infinity are rejected.
pub fn encode(key: &StorageKey) -> Result<String> {
    match key {
        StorageKey::Str(s) => Ok(format!("s:{s}")),
        StorageKey::Num(n) => {
            if !n.is_finite() {
                return Err(TsdbError::InvalidKey(format!(
                    "numeric key must be finite, got {n}"
                )));
            }
            Ok(format!("n:{}", format_number(*n)))
        }
    }
}

pub fn encode_str(s: impl Into<String>) -> String {
    format!("s:{}", s.into())
}

pub fn encode_num(n: f64) -> Result<String> {
    encode(&StorageKey::Num(n))
}

/// Rust's `Display` for `f64` already omits a trailing `.0` for integral
/// values and renders negative zero as `-0`, which is exactly the
/// round-trippable form the codec needs.
fn format_number(n: f64) -> String {
    format!("{n}")
}

/// Decode a `key_encoded` value back to its original type. Anything
/// without a recognised `s:`/`n:` discriminator is rejected.
pub fn decode(encoded: &str) -> Result<StorageKey> {
    if let Some(rest) = encoded.strip_prefix("s:") {
        return Ok(StorageKey::Str(rest.to_string()));
    }
    if let Some(rest) = encoded.strip_prefix("n:") {
        let n: f64 = rest
            .parse()
            .map_err(|_| TsdbError::InvalidKeyEncoding(encoded.to_string()))?;
        if !n.is_finite() {
            return Err(TsdbError::InvalidKeyEncoding(encoded.to_string()));
        }
        return Ok(StorageKey::Num(n));
    }
    Err(TsdbError::InvalidKeyEncoding(encoded.to_string()))
}

/// Which physical table a collection id names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Rows,
    Tombstones,
}

impl TableKind {
    fn prefix(self) -> char {
        match self {
            TableKind::Rows => 'c',
            TableKind::Tombstones => 't',
        }
    }
}

fn lower_base32() -> &'static Encoding {
    static ENC: OnceLock<Encoding> = OnceLock::new();
    ENC.get_or_init(|| {
        let mut spec = Specification::new();
        spec.symbols.push_str("abcdefghijklmnopqrstuvwxyz234567");
        spec.encoding().expect("valid base32 specification")
    })
}

/// Deterministic, collision-resistant, SQL-safe table name for a
/// collection id: `^[ct]_[a-z2-7]+_[0-9a-z]+$`. Two calls with the same
/// input always produce identical output; two different ids produce
/// distinct output with overwhelming probability (112-bit digest).
pub fn table_name(collection_id: &str, kind: TableKind) -> String {
    safe_identifier(collection_id, kind.prefix())
}

/// Deterministic, collision-resistant, SQL-safe identifier derived from an
/// arbitrary seed string: `^<prefix>_[a-z2-7]+_[0-9a-z]+$`. `table_name`
/// is the collection-id specialization of this; `tsdb-persist` reuses it
/// directly to turn an opaque index signature into a physical index name.
pub fn safe_identifier(seed: &str, prefix: char) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    let body = lower_base32().encode(&digest[0..10]);
    let suffix = hex_lower(&digest[10..14]);
    format!("{prefix}_{body}_{suffix}")
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
