//! Resolution of a plugin descriptor into the concrete source to build.

use crate::types::{PluginDescriptor, PluginSource};
use std::path::PathBuf;

/// The source tree to build for one load attempt, after alternate-version
/// selection has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    /// A remote archive.
    Remote {
        /// Repository identity, `owner/name`.
        repository: String,
        /// Revision to fetch and record in the cache manifest.
        revision: String,
    },
    /// A local folder.
    Local {
        /// Folder path.
        path: PathBuf,
    },
}

/// Resolves the revision to build for `descriptor`.
///
/// A `selected` alternate version name overrides the default revision; names
/// compare case-insensitively. An unknown selection falls back to the default
/// revision. Local sources ignore the selection.
pub fn resolve_source(descriptor: &PluginDescriptor, selected: Option<&str>) -> ResolvedSource {
    match &descriptor.plugin.source {
        PluginSource::Local { path } => ResolvedSource::Local { path: path.clone() },
        PluginSource::Remote {
            repository,
            revision,
        } => {
            let revision = selected
                .and_then(|name| {
                    let found = descriptor
                        .versions
                        .iter()
                        .find(|v| v.name.eq_ignore_ascii_case(name));
                    if found.is_none() {
                        tracing::warn!(
                            plugin = %descriptor.plugin.name,
                            version = name,
                            "unknown alternate version, using default revision"
                        );
                    }
                    found
                })
                .map_or_else(|| revision.clone(), |v| v.revision.clone());
            ResolvedSource::Remote {
                repository: repository.clone(),
                revision,
            }
        }
    }
}
