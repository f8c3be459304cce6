//! Session-key blob handling: splitting the concatenated rotate-keys output
//! into per-consensus-role keys and naming them for `session.set_keys`.

use std::collections::BTreeMap;
use warden_common::RpcError;

/// Split a `0x`-prefixed session key blob into 32-byte (64 hex char)
/// chunks. The beefy key can be longer than 32 bytes, so a trailing short
/// chunk is folded into the previous one.
pub fn split_session_key(key: &str) -> Result<Vec<String>, RpcError> {
    let hex_part = key
        .strip_prefix("0x")
        .filter(|rest| rest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()))
        .ok_or_else(|| RpcError::Protocol("Invalid session key".to_string()))?;
    if hex_part.is_empty() {
        return Err(RpcError::Protocol("Invalid session key".to_string()));
    }

    let mut chunks: Vec<String> = hex_part
        .as_bytes()
        .chunks(64)
        .map(|c| String::from_utf8_lossy(c).to_string())
        .collect();
    if chunks.len() > 1 && chunks.last().is_some_and(|last| last.len() < 64) {
        let tail = chunks.pop().unwrap_or_default();
        if let Some(previous) = chunks.last_mut() {
            previous.push_str(&tail);
        }
    }
    Ok(chunks.into_iter().map(|c| format!("0x{c}")).collect())
}

/// Map split session keys to their pallet names for the given chain. The
/// Enjin ecosystem uses a different key set than Polkadot's.
pub fn name_session_keys(
    chain_name: &str,
    keys: &[String],
) -> Result<BTreeMap<&'static str, String>, RpcError> {
    let names: &[&'static str] = if chain_name.to_lowercase().contains("enjin") {
        match keys.len() {
            // Enjin relay chain
            6 => &["grandpa", "babe", "im_online", "para_validator", "para_assignment", "authority_discovery"],
            // Enjin parachain
            2 => &["aura", "pools"],
            n => {
                return Err(RpcError::Protocol(format!(
                    "Enjin chain with {n} session keys not supported"
                )))
            }
        }
    } else {
        match keys.len() {
            // Relay chain in the Polkadot ecosystem
            6 => &["grandpa", "babe", "para_validator", "para_assignment", "authority_discovery", "beefy"],
            // Parachain in the Polkadot ecosystem
            1 => &["aura"],
            n => {
                return Err(RpcError::Protocol(format!(
                    "Mismatch between chain {chain_name} and number of session keys ({n})"
                )))
            }
        }
    };
    Ok(names.iter().copied().zip(keys.iter().cloned()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(chunks: usize, extra: usize) -> String {
        format!("0x{}", "ab".repeat(32 * chunks + extra / 2))
    }

    #[test]
    fn splits_into_64_char_chunks() {
        let keys = split_session_key(&blob(6, 0)).unwrap();
        assert_eq!(keys.len(), 6);
        assert!(keys.iter().all(|k| k.len() == 66 && k.starts_with("0x")));
    }

    #[test]
    fn long_beefy_key_folds_into_last_chunk() {
        // Six keys where the last carries 33 bytes instead of 32.
        let keys = split_session_key(&blob(6, 2)).unwrap();
        assert_eq!(keys.len(), 6);
        assert_eq!(keys.last().unwrap().len(), 68);
    }

    #[test]
    fn rejects_non_hex_and_missing_prefix() {
        assert!(split_session_key("deadbeef").is_err());
        assert!(split_session_key("0xnothex").is_err());
        assert!(split_session_key("0x").is_err());
    }

    #[test]
    fn polkadot_relay_naming() {
        let keys = split_session_key(&blob(6, 0)).unwrap();
        let named = name_session_keys("polkadot", &keys).unwrap();
        assert_eq!(named.len(), 6);
        assert!(named.contains_key("beefy"));
        assert!(!named.contains_key("im_online"));
    }

    #[test]
    fn enjin_relay_naming() {
        let keys = split_session_key(&blob(6, 0)).unwrap();
        let named = name_session_keys("enjin-relay", &keys).unwrap();
        assert!(named.contains_key("im_online"));
        assert!(!named.contains_key("beefy"));
    }

    #[test]
    fn parachain_naming() {
        let keys = split_session_key(&blob(1, 0)).unwrap();
        let named = name_session_keys("moonbeam", &keys).unwrap();
        assert_eq!(named.get("aura"), Some(&keys[0]));
    }

    #[test]
    fn unsupported_key_counts_error() {
        let keys = split_session_key(&blob(3, 0)).unwrap();
        assert!(name_session_keys("polkadot", &keys).is_err());
        assert!(name_session_keys("enjin", &keys).is_err());
    }
}
