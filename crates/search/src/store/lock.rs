//! Process-wide registry of per-location index locks

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::RwLock;

type Registry = Mutex<HashMap<PathBuf, Arc<RwLock<()>>>>;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Lock guarding the index stored at `path`
///
/// Different spellings of the same location share one lock.
pub fn lock_for(path: &Path) -> Arc<RwLock<()>> {
    let key = normalize(path);
    let registry = REGISTRY.get_or_init(Default::default);
    let mut locks = registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    locks.entry(key).or_default().clone()
}

/// Absolute path with the parent directory canonicalized when it exists
fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or(absolute),
        _ => absolute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_location_shares_lock() {
        let dir = tempfile::tempdir().unwrap();
        let direct = dir.path().join("index.dqix");
        let indirect = dir.path().join("sub").join("..").join("index.dqix");
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        assert!(Arc::ptr_eq(&lock_for(&direct), &lock_for(&indirect)));
        assert!(!Arc::ptr_eq(
            &lock_for(&direct),
            &lock_for(&dir.path().join("other.dqix"))
        ));
    }
}
