//! Per-chain override registry.
//!
//! Everything that used to be a growing if/else chain on the chain name
//! lives here as lookup tables: deprecated `--chain` aliases, docker image
//! sources, worker binary names and tarball handlers.

/// Deprecated hardcoded `--chain` substitutions. New deployments should use
/// the chain-spec URL configuration instead, which takes precedence.
pub fn spec_alias(chain: &str) -> Option<&'static str> {
    match chain {
        "aleph-zero-testnet" => Some("testnet"),
        "aleph-zero-mainnet" => Some("mainnet"),
        "crust-mainnet" => Some("mainnet"),
        "crust-maxwell" => Some("maxwell"),
        "crust-rocky" => Some("rocky"),
        _ => None,
    }
}

/// Where to find a chain's client binary inside its published container image.
#[derive(Debug, Clone, Copy)]
pub struct DockerSource {
    pub image: &'static str,
    pub binary_path: &'static str,
    /// Additional files copied out of the container, as (container path,
    /// file name under the workload home directory) pairs.
    pub extra_copies: &'static [(&'static str, &'static str)],
}

/// Container image lookup for chains distributed through docker registries.
pub fn docker_source(chain: &str) -> Option<DockerSource> {
    let (image, binary_path): (&'static str, &'static str) = match chain {
        "spiritnet" | "peregrine" | "peregrine-stg-kilt" => {
            return Some(DockerSource {
                image: "kiltprotocol/kilt-node",
                binary_path: "/usr/local/bin/node-executable",
                extra_copies: &[("/node/dev-specs", "dev-specs")],
            })
        }
        "equilibrium" => {
            return Some(DockerSource {
                image: "equilab/eq-para",
                binary_path: "/usr/local/bin/paranode",
                extra_copies: &[("/etc/chainspec.json", "chainspec.json")],
            })
        }
        "centrifuge" | "altair" => ("centrifugeio/centrifuge-chain", "/usr/local/bin/centrifuge-chain"),
        "nodle" | "arcadia" | "eden" => ("nodlecode/chain", "/usr/local/bin/nodle-parachain"),
        "acala" => ("acala/acala-node", "/usr/local/bin/acala"),
        "karura" => ("acala/karura-node", "/usr/local/bin/acala"),
        "astar" | "shiden" | "shibuya" => ("staketechnologies/astar-collator", "/usr/local/bin/astar-collator"),
        "darwinia" | "crab" => ("ghcr.io/darwinia-network/darwinia", "/home/darwinia/darwinia-nodes/darwinia"),
        "moonbeam" | "moonriver" | "alphanet" => ("purestake/moonbeam", "/moonbeam/moonbeam"),
        "zeitgeist" => ("zeitgeistpm/zeitgeist-node-parachain", "/usr/local/bin/zeitgeist"),
        "phala" => ("phalanetwork/phala-node", "/usr/local/bin/khala-node"),
        "khala" => ("phalanetwork/khala-node", "/usr/local/bin/khala-node"),
        "heiko" | "parallel" => ("parallelfinance/parallel", "/usr/local/bin/parallel"),
        "turing" => ("oaknetwork/turing", "/oak/oak-collator"),
        "efinity" => ("enjin/efinity-node", "/efinity/efinity"),
        "joystream" => ("joystream/node", "/joystream/node"),
        "aleph-zero-mainnet" | "aleph-zero-testnet" => ("public.ecr.aws/p6e8q1z1/aleph-node", "/usr/local/bin/aleph-node"),
        "pendulum" | "amplitude" => ("pendulumchain/pendulum-collator", "/usr/local/bin/pendulum-collator"),
        "kapex" => ("totemlive/totem-parachain-collator", "/usr/local/bin/totem-parachain-collator"),
        _ => return None,
    };
    Some(DockerSource { image, binary_path, extra_copies: &[] })
}

/// File names for the PVF worker binaries shipped next to the main client.
#[derive(Debug, Clone, Copy)]
pub struct WorkerNames {
    pub execute: &'static str,
    pub prepare: &'static str,
}

/// Worker binary names for a chain; the Enjin fork renames them.
pub fn worker_names(chain: &str) -> WorkerNames {
    match chain {
        "enjin" | "canary" => WorkerNames {
            execute: "enjin-execute-worker",
            prepare: "enjin-prepare-worker",
        },
        _ => WorkerNames {
            execute: "polkadot-execute-worker",
            prepare: "polkadot-prepare-worker",
        },
    }
}

/// Name of the client binary inside a chain's release tarball, for chains
/// that distribute tarballs.
pub fn tarball_member(chain: &str) -> Option<&'static str> {
    match chain {
        // Avail
        "goldberg" => Some("data-avail"),
        _ => None,
    }
}

/// Classify a relay chain from its database directory name.
pub fn relay_name_from_db_dir(dir_name: &str) -> Option<&'static str> {
    if dir_name.contains("westend") {
        Some("Westend")
    } else if dir_name.contains("ksm") {
        Some("Kusama")
    } else if dir_name.contains("polkadot") {
        Some("Polkadot")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_cover_deprecated_chains() {
        assert_eq!(spec_alias("aleph-zero-testnet"), Some("testnet"));
        assert_eq!(spec_alias("crust-rocky"), Some("rocky"));
        assert_eq!(spec_alias("westend"), None);
    }

    #[test]
    fn docker_sources_resolve() {
        let kilt = docker_source("spiritnet").unwrap();
        assert_eq!(kilt.image, "kiltprotocol/kilt-node");
        assert_eq!(kilt.extra_copies.len(), 1);

        let moonbeam = docker_source("moonriver").unwrap();
        assert_eq!(moonbeam.binary_path, "/moonbeam/moonbeam");
        assert!(moonbeam.extra_copies.is_empty());

        assert!(docker_source("westend").is_none());
    }

    #[test]
    fn enjin_worker_names_differ() {
        assert_eq!(worker_names("enjin").execute, "enjin-execute-worker");
        assert_eq!(worker_names("polkadot").prepare, "polkadot-prepare-worker");
    }

    #[test]
    fn relay_classification_prefers_most_specific() {
        assert_eq!(relay_name_from_db_dir("westend2"), Some("Westend"));
        assert_eq!(relay_name_from_db_dir("ksmcc3"), Some("Kusama"));
        assert_eq!(relay_name_from_db_dir("polkadot"), Some("Polkadot"));
        assert_eq!(relay_name_from_db_dir("solo-db"), None);
    }
}
