//! Restart-stable torrent identity derived from magnet URIs.
//!
//! The engine reorders its live list freely between polls, so positional
//! indices cannot identify a torrent across restarts. The only durable
//! identity is the content hash carried in a magnet's `xt` parameter, which
//! this module extracts once at add-time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Restart-durable identity for a torrent.
///
/// Normally a lowercase hex string: 40 chars for a 20-byte v1 info-hash or
/// 64 chars for a 32-byte v2 hash. When no hash can be derived the caller
/// may fall back to the raw magnet text via [`StableId::fallback`]; that
/// degenerate form survives the process but not a reordering of tracker
/// parameters, and is flagged as such when minted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableId(String);

impl StableId {
    /// Derives a stable identity from a magnet URI.
    ///
    /// Walks every `xt` query value in order (a magnet may repeat the same
    /// resource under several hash schemes) and returns the first that
    /// yields a fixed-length hash:
    ///
    /// - `urn:btih:` followed by 40 hex chars, or by RFC 4648 base32
    ///   decoding to exactly 20 bytes
    /// - `urn:btmh:` carrying the sha-256 multihash prefix `1220` followed
    ///   by exactly 64 hex chars
    ///
    /// Returns `None` when no `xt` is present or none decodes.
    pub fn derive(magnet: &str) -> Option<Self> {
        let parsed = url::Url::parse(magnet.trim()).ok()?;

        for (key, value) in parsed.query_pairs() {
            if key != "xt" {
                continue;
            }
            if let Some(id) = decode_exact_topic(&value) {
                return Some(id);
            }
        }
        None
    }

    /// Degenerate identity: the trimmed raw magnet text.
    ///
    /// Not restart-stable if tracker parameters change order. Known weak
    /// spot, kept for availability over strict correctness.
    pub fn fallback(magnet: &str) -> Self {
        Self(magnet.trim().to_string())
    }

    /// Derives an identity, falling back to the raw magnet text.
    pub fn derive_or_fallback(magnet: &str) -> Self {
        match Self::derive(magnet) {
            Some(id) => id,
            None => {
                tracing::warn!(
                    magnet = %magnet.trim(),
                    "no hash-based identity in magnet, using fragile raw-string key"
                );
                Self::fallback(magnet)
            }
        }
    }

    /// Wraps an already-validated hex hash (40 or 64 lowercase-able chars).
    pub fn from_hex(hash: &str) -> Option<Self> {
        if matches!(hash.len(), 40 | 64) && hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(hash.to_ascii_lowercase()))
        } else {
            None
        }
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-facing name for a magnet: the `dn` parameter when present,
/// otherwise a placeholder built from the identity prefix.
pub fn display_name(magnet: &str, id: &StableId) -> String {
    if let Ok(parsed) = url::Url::parse(magnet.trim()) {
        for (key, value) in parsed.query_pairs() {
            if key == "dn" && !value.is_empty() {
                return value.replace('+', " ");
            }
        }
    }
    let prefix: String = id.as_str().chars().take(16).collect();
    format!("Torrent_{prefix}")
}

/// Decodes a single `xt` value, trying the info-hash form then the
/// sha-256 multihash form.
fn decode_exact_topic(value: &str) -> Option<StableId> {
    if let Some(rest) = strip_prefix_ignore_case(value, "urn:btih:") {
        if let Some(id) = StableId::from_hex(rest).filter(|id| id.as_str().len() == 40) {
            return Some(id);
        }
        if let Some(bytes) = base32_decode(rest) {
            if bytes.len() == 20 {
                return Some(StableId(hex::encode(bytes)));
            }
        }
        return None;
    }

    if let Some(rest) = strip_prefix_ignore_case(value, "urn:btmh:") {
        // Multihash framing: 0x12 (sha-256) 0x20 (32 bytes) then the digest.
        let digest = strip_prefix_ignore_case(rest, "1220")?;
        if digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Some(StableId(digest.to_ascii_lowercase()));
        }
    }

    None
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    if value.len() >= prefix.len() && value[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}

/// Decodes RFC 4648 base32 (A-Z, 2-7), case-insensitive, padding optional.
///
/// Returns `None` on any character outside the alphabet.
fn base32_decode(input: &str) -> Option<Vec<u8>> {
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::with_capacity(input.len() * 5 / 8);

    for byte in input.bytes() {
        let value = match byte {
            b'A'..=b'Z' => byte - b'A',
            b'a'..=b'z' => byte - b'a',
            b'2'..=b'7' => byte - b'2' + 26,
            b'=' => break,
            _ => return None,
        };
        buffer = (buffer << 5) | u32::from(value);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const HEX40: &str = "0123456789abcdef0123456789abcdef01234567";

    /// RFC 4648 base32 encoding, test-side counterpart of the decoder.
    fn base32_encode(input: &[u8]) -> String {
        const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
        let mut buffer: u32 = 0;
        let mut bits: u32 = 0;
        let mut out = String::new();

        for &byte in input {
            buffer = (buffer << 8) | u32::from(byte);
            bits += 8;
            while bits >= 5 {
                bits -= 5;
                out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
            }
        }
        if bits > 0 {
            out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
        }
        out
    }

    #[test]
    fn derives_hex_info_hash_lowercased() {
        let magnet = format!("magnet:?xt=urn:btih:{}", HEX40.to_uppercase());
        let id = StableId::derive(&magnet).unwrap();
        assert_eq!(id.as_str(), HEX40);
    }

    #[test]
    fn derives_base32_info_hash() {
        let bytes = hex::decode(HEX40).unwrap();
        let magnet = format!("magnet:?xt=urn:btih:{}", base32_encode(&bytes));
        let id = StableId::derive(&magnet).unwrap();
        assert_eq!(id.as_str(), HEX40);
    }

    #[test]
    fn derives_sha256_multihash() {
        let digest = "AA".repeat(32);
        let magnet = format!("magnet:?xt=urn:btmh:1220{digest}");
        let id = StableId::derive(&magnet).unwrap();
        assert_eq!(id.as_str(), digest.to_lowercase());
    }

    #[test]
    fn first_decodable_topic_wins() {
        let magnet = format!(
            "magnet:?xt=urn:btih:notahash&xt=urn:btih:{HEX40}&xt=urn:btmh:1220{}",
            "bb".repeat(32)
        );
        let id = StableId::derive(&magnet).unwrap();
        assert_eq!(id.as_str(), HEX40);
    }

    #[test]
    fn no_exact_topic_yields_none() {
        assert!(StableId::derive("magnet:?dn=Some.Release&tr=http://t.example/a").is_none());
        assert!(StableId::derive("not even a magnet").is_none());
        assert!(StableId::derive("magnet:?xt=urn:btih:tooshort").is_none());
    }

    #[test]
    fn fallback_preserves_trimmed_text() {
        let id = StableId::derive_or_fallback("  magnet:?dn=No.Hash  ");
        assert_eq!(id.as_str(), "magnet:?dn=No.Hash");
    }

    #[test]
    fn from_hex_rejects_odd_lengths() {
        assert!(StableId::from_hex("abc123").is_none());
        assert!(StableId::from_hex(&"g".repeat(40)).is_none());
        assert!(StableId::from_hex(&"A".repeat(64)).is_some());
    }

    proptest! {
        #[test]
        fn base32_and_hex_forms_agree(bytes in proptest::collection::vec(any::<u8>(), 20)) {
            let hex_form = hex::encode(&bytes);
            let via_hex =
                StableId::derive(&format!("magnet:?xt=urn:btih:{hex_form}")).unwrap();
            let via_base32 =
                StableId::derive(&format!("magnet:?xt=urn:btih:{}", base32_encode(&bytes)))
                    .unwrap();
            prop_assert_eq!(via_hex.as_str(), hex_form.as_str());
            prop_assert_eq!(via_base32, via_hex);
        }
    }
}
