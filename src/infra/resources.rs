// ============================================================
// Layer 6 — Pretrained Resources
// ============================================================
// ELMo options and weights are given either as local paths or
// as URLs. URLs are downloaded once into the cached-path cache
// directory and reused on later runs.

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Published options of the original 5.5B-token ELMo model.
pub const ELMO_OPTIONS_URL: &str = "https://s3-us-west-2.amazonaws.com/allennlp/models/elmo/2x4096_512_2048cnn_2xhighway/elmo_2x4096_512_2048cnn_2xhighway_options.json";

/// Published HDF5 weights of the same model.
pub const ELMO_WEIGHTS_URL: &str = "https://s3-us-west-2.amazonaws.com/allennlp/models/elmo/2x4096_512_2048cnn_2xhighway/elmo_2x4096_512_2048cnn_2xhighway_weights.hdf5";

fn is_remote(resource: &str) -> bool {
    resource.starts_with("http://") || resource.starts_with("https://")
}

/// Local path of `resource`, downloading it first when it is a URL.
pub fn resolve(resource: &str) -> Result<PathBuf> {
    if !is_remote(resource) {
        let path = Path::new(resource);
        if !path.exists() {
            anyhow::bail!("Resource '{}' does not exist", path.display());
        }
        return Ok(path.to_path_buf());
    }

    tracing::info!("Fetching '{}'", resource);
    let path = cached_path::cached_path(resource)
        .map_err(|e| anyhow::anyhow!("Cannot fetch '{resource}': {e}"))?;
    tracing::debug!("'{}' cached at '{}'", resource, path.display());
    Ok(path)
}
