//! Artifact retrieval: client binaries from direct URLs, container images or
//! release tarballs, plus chain-spec and wasm-runtime downloads. Downloads
//! are verified against detached sha256 checksums before anything is written
//! to the workload's directories, and multi-artifact sets are processed
//! sequentially so a bad checksum aborts before later artifacts land.

mod checksum;
mod docker;

pub use checksum::{parse_checksum_line, parse_checksum_manifest};
pub use docker::extract_from_docker;

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use warden_common::layout::BinaryLayout;
use warden_common::{chains, sys, ConfigurationError, InstallError, WardenError};

/// A downloaded and checksum-verified artifact, not yet written to disk.
#[derive(Debug)]
pub struct PreparedArtifact {
    /// File name under the workload home directory.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Fetch raw bytes, failing on any non-200 response.
pub async fn fetch_bytes(url: &str) -> Result<Vec<u8>, WardenError> {
    debug!("Downloading {}", url);
    let response = reqwest::get(url).await.map_err(|e| InstallError::Download {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if !response.status().is_success() {
        let reason = response.text().await.unwrap_or_default();
        return Err(InstallError::Download { url: url.to_string(), reason }.into());
    }
    let bytes = response.bytes().await.map_err(|e| InstallError::Download {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(bytes.to_vec())
}

/// Fetch a detached checksum file. Anything over 1KB means the operator
/// pointed the checksum config at the wrong URL.
pub async fn fetch_checksum_text(url: &str) -> Result<String, WardenError> {
    let bytes = fetch_bytes(url).await?;
    if bytes.len() > 1024 {
        return Err(ConfigurationError::OversizedChecksum.into());
    }
    Ok(String::from_utf8_lossy(&bytes).to_string())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Download a whitespace-separated set of binary URLs. The checksum config
/// is either one combined manifest URL or one URL per binary. Worker
/// binaries are renamed per the chain's registry entry; everything else is
/// treated as the main client binary.
pub async fn fetch_binary_set(
    binary_urls: &str,
    sha256_urls: Option<&str>,
    chain: &str,
    main_binary_name: &str,
) -> Result<Vec<PreparedArtifact>, WardenError> {
    let urls: Vec<&str> = binary_urls.split_whitespace().collect();
    let sha_urls: Vec<&str> = sha256_urls.unwrap_or_default().split_whitespace().collect();
    let workers = chains::worker_names(chain);

    let mut downloads = Vec::new();
    for (i, url) in urls.iter().enumerate() {
        let bytes = fetch_bytes(url).await?;
        let file_name = artifact_name(url);
        let name = if file_name.contains("execute-worker") {
            workers.execute.to_string()
        } else if file_name.contains("prepare-worker") {
            workers.prepare.to_string()
        } else {
            main_binary_name.to_string()
        };
        let hash = sha256_hex(&bytes);
        let sha_url = sha_urls.get(i).copied();
        downloads.push((name, bytes, hash, sha_url));
    }

    if sha_urls.len() == 1 && urls.len() > 1 {
        // One combined manifest covering every artifact by file name.
        let manifest = fetch_checksum_text(sha_urls[0]).await?;
        let targets = parse_checksum_manifest(&manifest);
        for (name, _, hash, _) in &downloads {
            let target = targets
                .get(name.as_str())
                .ok_or_else(|| InstallError::ChecksumTargetMissing(name.clone()))?;
            if hash != target {
                return Err(InstallError::ChecksumMismatch(name.clone()).into());
            }
        }
    } else {
        for (name, _, hash, sha_url) in &downloads {
            if let Some(sha_url) = sha_url {
                let manifest = fetch_checksum_text(sha_url).await?;
                if *hash != parse_checksum_line(&manifest) {
                    return Err(InstallError::ChecksumMismatch(name.clone()).into());
                }
            }
        }
    }

    Ok(downloads
        .into_iter()
        .map(|(name, bytes, _, _)| PreparedArtifact { name, bytes })
        .collect())
}

/// Write verified artifacts into the workload home directory with ownership
/// and the exec bit applied. The caller must have stopped the service.
pub fn write_artifacts(
    artifacts: &[PreparedArtifact],
    layout: &BinaryLayout,
) -> Result<(), WardenError> {
    for artifact in artifacts {
        let path = layout.home_dir.join(&artifact.name);
        info!("Installing binary {}", path.display());
        std::fs::write(&path, &artifact.bytes)?;
        sys::chown(&path, &layout.user);
        sys::make_executable(&path)?;
    }
    Ok(())
}

/// Download a release tarball and extract the chain's client binary from it.
pub async fn install_from_tarball(
    url: &str,
    chain: &str,
    layout: &BinaryLayout,
) -> Result<(), WardenError> {
    let member = chains::tarball_member(chain).ok_or_else(|| {
        ConfigurationError::UnsupportedTarballChain { chain: chain.to_string() }
    })?;
    let bytes = fetch_bytes(url).await?;

    let temp = tempfile::tempdir()?;
    unpack_tar_gz(&bytes, temp.path())?;
    let extracted = temp.path().join(member);
    if !extracted.is_file() {
        return Err(InstallError::Failed(format!(
            "Expected client binary '{member}' not found in tarball!"
        ))
        .into());
    }
    std::fs::copy(&extracted, &layout.binary_file)?;
    sys::chown(&layout.binary_file, &layout.user);
    sys::make_executable(&layout.binary_file)?;
    Ok(())
}

/// Download a chain spec, validate it parses as JSON and persist it under
/// the spec directory.
pub async fn download_chain_spec(
    url: &str,
    filename: &str,
    spec_dir: &Path,
    owner: &str,
) -> Result<PathBuf, WardenError> {
    if !spec_dir.exists() {
        std::fs::create_dir_all(spec_dir)?;
    }
    let bytes = fetch_bytes(url).await?;
    let path = spec_dir.join(filename);
    serde_json::from_slice::<serde_json::Value>(&bytes).map_err(|e| {
        InstallError::InvalidChainSpec { path: path.display().to_string(), reason: e.to_string() }
    })?;
    std::fs::write(&path, &bytes)?;
    sys::chown(&path, owner);
    Ok(path)
}

/// Download a wasm runtime override: either a bare `.wasm` file or a
/// `.tar.gz` bundle of them. Previously installed overrides are replaced.
pub async fn download_wasm_runtime(
    url: &str,
    wasm_dir: &Path,
    owner: &str,
) -> Result<(), WardenError> {
    let filename = artifact_name(url);
    let is_bundle = filename.ends_with(".tar.gz");
    if !is_bundle && !filename.ends_with(".wasm") {
        return Err(ConfigurationError::InvalidWasmArtifact(filename).into());
    }
    let bytes = fetch_bytes(url).await?;

    if !wasm_dir.exists() {
        std::fs::create_dir_all(wasm_dir)?;
    }
    let temp = tempfile::tempdir()?;
    if is_bundle {
        unpack_tar_gz(&bytes, temp.path())?;
    } else {
        std::fs::write(temp.path().join(&filename), &bytes)?;
    }

    for entry in std::fs::read_dir(wasm_dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "wasm") {
            std::fs::remove_file(path)?;
        }
    }
    for entry in std::fs::read_dir(temp.path())? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "wasm") {
            let target = wasm_dir.join(path.file_name().unwrap_or_default());
            std::fs::copy(&path, &target)?;
        }
    }
    sys::chown_recursive(wasm_dir, owner);
    Ok(())
}

fn unpack_tar_gz(bytes: &[u8], dest: &Path) -> Result<(), WardenError> {
    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    archive
        .unpack(dest)
        .map_err(|e| WardenError::Install(InstallError::Failed(format!("tarball extraction failed: {e}"))))
}

/// Trailing path segment of a URL, used as the artifact file name.
fn artifact_name(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_name_is_last_segment() {
        assert_eq!(artifact_name("https://host/releases/v1/polkadot"), "polkadot");
        assert_eq!(artifact_name("polkadot"), "polkadot");
    }

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
