//! Parsing of detached sha256 checksum files, both the single
//! `<hash> <name>` form and multi-line `sha256sums` manifests.

use std::collections::HashMap;

/// First token of a single-artifact checksum file.
pub fn parse_checksum_line(text: &str) -> String {
    text.split_whitespace().next().unwrap_or_default().to_string()
}

/// Parse a `sha256sums`-style manifest into a name -> hash map. Lines
/// without both fields are skipped.
pub fn parse_checksum_manifest(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let hash = fields.next()?;
            let name = fields.next()?;
            Some((name.trim_start_matches('*').to_string(), hash.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_takes_first_token() {
        assert_eq!(parse_checksum_line("abc123  polkadot\n"), "abc123");
        assert_eq!(parse_checksum_line(""), "");
    }

    #[test]
    fn manifest_maps_names_to_hashes() {
        let manifest = "aaa  polkadot\nbbb  polkadot-execute-worker\n\nccc *polkadot-prepare-worker\n";
        let map = parse_checksum_manifest(manifest);
        assert_eq!(map.len(), 3);
        assert_eq!(map["polkadot"], "aaa");
        assert_eq!(map["polkadot-execute-worker"], "bbb");
        assert_eq!(map["polkadot-prepare-worker"], "ccc");
    }
}
