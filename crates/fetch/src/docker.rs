//! Client binary extraction from published container images, for chains
//! that only distribute through a registry. The image is pulled, a
//! throwaway container is created, the binary (and any registry-listed
//! extra files) copied out, and both container and image removed again.

use tokio::process::Command;
use tracing::info;
use warden_common::layout::BinaryLayout;
use warden_common::{chains, sys, ConfigurationError, InstallError, WardenError};

const TEMP_CONTAINER: &str = "nodewarden-extract";

/// Extract the chain's client binary from its container image into the
/// binary layout. The caller must have stopped the service.
pub async fn extract_from_docker(
    chain: &str,
    docker_tag: &str,
    layout: &BinaryLayout,
) -> Result<(), WardenError> {
    let source = chains::docker_source(chain)
        .ok_or_else(|| ConfigurationError::UnsupportedDockerChain { chain: chain.to_string() })?;
    let image = format!("{}:{}", source.image, docker_tag);
    info!("Extracting client binary from image {}", image);

    run(&["docker", "pull", &image], true).await?;
    // A leftover container from an interrupted run is not fatal.
    let _ = run(&["docker", "rm", TEMP_CONTAINER], false).await;
    run(&["docker", "create", "--name", TEMP_CONTAINER, &image], true).await?;

    let result = copy_resources(&source, layout).await;

    let _ = run(&["docker", "rm", TEMP_CONTAINER], false).await;
    let _ = run(&["docker", "rmi", &image], false).await;
    result
}

async fn copy_resources(
    source: &chains::DockerSource,
    layout: &BinaryLayout,
) -> Result<(), WardenError> {
    let binary_src = format!("{TEMP_CONTAINER}:{}", source.binary_path);
    let binary_dest = layout.binary_file.display().to_string();
    run(&["docker", "cp", &binary_src, &binary_dest], true).await?;
    sys::chown(&layout.binary_file, &layout.user);
    sys::make_executable(&layout.binary_file)?;

    for (container_path, name) in source.extra_copies {
        let src = format!("{TEMP_CONTAINER}:{container_path}");
        let dest = layout.home_dir.join(name);
        run(&["docker", "cp", &src, &dest.display().to_string()], true).await?;
        sys::chown_recursive(&dest, &layout.user);
    }
    Ok(())
}

async fn run(argv: &[&str], check: bool) -> Result<(), WardenError> {
    let status = Command::new(argv[0])
        .args(&argv[1..])
        .status()
        .await
        .map_err(|e| InstallError::Command { command: argv.join(" "), reason: e.to_string() })?;
    if check && !status.success() {
        return Err(InstallError::Command {
            command: argv.join(" "),
            reason: format!("exit status {status}"),
        }
        .into());
    }
    Ok(())
}
