//! Mapping from source origins to cache directories.

use std::path::{Path, PathBuf};

use crate::error::CacheError;

/// Subdirectory of the cache root holding remote origins.
pub const REMOTE_DIR: &str = "remote";

/// Returns `<root>/remote/<owner>/<repo>` for an `owner/repo` origin.
pub fn origin_cache_dir(root: &Path, origin: &str) -> Result<PathBuf, CacheError> {
    let invalid = || CacheError::InvalidOrigin {
        origin: origin.to_string(),
    };
    let (owner, repo) = origin.split_once('/').ok_or_else(invalid)?;
    let valid = |part: &str| {
        !part.is_empty() && part != "." && part != ".." && !part.contains(['/', '\\'])
    };
    if !valid(owner) || !valid(repo) {
        return Err(invalid());
    }
    Ok(root.join(REMOTE_DIR).join(owner).join(repo))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_owner_and_repo() {
        let dir = origin_cache_dir(Path::new("/cache"), "acme/widget").unwrap();
        assert_eq!(dir, Path::new("/cache/remote/acme/widget"));
    }

    #[test]
    fn rejects_malformed_origins() {
        for origin in ["acme", "acme/", "/widget", "../widget", "acme/..", "a/b/c", "a/b\\c"] {
            assert!(
                origin_cache_dir(Path::new("/cache"), origin).is_err(),
                "{origin} accepted"
            );
        }
    }
}
