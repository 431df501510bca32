use std::path::{Path, PathBuf};
use tracing::{info, warn};
use verdict_core::ModelRegistry;

/// Deploy every `*.json` file in `dir` under its file stem.
///
/// Files are loaded in path order so repeated startups assign the same
/// versions. Unreadable or malformed files are logged and skipped. Returns
/// the number of models deployed.
pub fn preload_models(registry: &ModelRegistry, dir: &Path) -> anyhow::Result<usize> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut loaded = 0;
    for path in paths {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!("Skipping model file with non UTF-8 name: {:?}", path);
            continue;
        };

        let definition = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {:?}: {}", path, e);
                continue;
            }
        };

        match registry.deploy_next(name, &definition) {
            Ok(version) => {
                info!("Preloaded {}@{} from {:?}", name, version, path);
                loaded += 1;
            }
            Err(e) => warn!("Failed to deploy {:?}: {}", path, e),
        }
    }

    Ok(loaded)
}
