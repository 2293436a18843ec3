//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::{is_url, HostConfig, PluginDescriptor, PluginSource};
use std::path::Path;

/// File name of the host configuration.
pub const HOST_CONFIG_FILE: &str = "tinker.toml";

/// File name of a plugin descriptor.
pub const PLUGIN_DESCRIPTOR_FILE: &str = "plugin.toml";

/// Loads `<dir>/tinker.toml`, anchoring relative paths at `dir`.
///
/// A missing file yields the default configuration.
pub fn load_host_config(dir: &Path) -> Result<HostConfig, ConfigError> {
    let path = dir.join(HOST_CONFIG_FILE);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no host configuration, using defaults");
        return Ok(HostConfig::default());
    }
    let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
        path: path.clone(),
        source: e,
    })?;
    let mut config = load_host_config_from_str(&content)?;
    config.anchor_paths(dir);
    Ok(config)
}

/// Parses and validates a `tinker.toml` from a string.
pub fn load_host_config_from_str(content: &str) -> Result<HostConfig, ConfigError> {
    let config: HostConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_host(&config)?;
    Ok(config)
}

fn validate_host(config: &HostConfig) -> Result<(), ConfigError> {
    if config.host.version.trim().is_empty() {
        return Err(ConfigError::MissingField("host.version".to_string()));
    }
    if config.packages.framework.trim().is_empty() {
        return Err(ConfigError::MissingField("packages.framework".to_string()));
    }
    if let Some(template) = &config.sources.url_template {
        if !is_url(template) {
            return Err(ConfigError::Invalid {
                field: "sources.url_template".to_string(),
                reason: "must be an http or https URL".to_string(),
            });
        }
        for placeholder in ["{repository}", "{revision}"] {
            if !template.contains(placeholder) {
                return Err(ConfigError::Invalid {
                    field: "sources.url_template".to_string(),
                    reason: format!("missing {placeholder} placeholder"),
                });
            }
        }
    }
    Ok(())
}

/// Loads a plugin descriptor from a file.
///
/// A relative local `path` source is anchored at the descriptor's directory.
pub fn load_plugin_descriptor(path: &Path) -> Result<PluginDescriptor, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut descriptor = load_plugin_descriptor_from_str(&content)?;
    if let PluginSource::Local { path: folder } = &mut descriptor.plugin.source {
        if folder.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            *folder = base.join(&*folder);
        }
    }
    Ok(descriptor)
}

/// Parses and validates a `plugin.toml` from a string.
pub fn load_plugin_descriptor_from_str(content: &str) -> Result<PluginDescriptor, ConfigError> {
    let descriptor: PluginDescriptor =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_descriptor(&descriptor)?;
    Ok(descriptor)
}

fn validate_descriptor(descriptor: &PluginDescriptor) -> Result<(), ConfigError> {
    if descriptor.plugin.name.trim().is_empty() {
        return Err(ConfigError::MissingField("plugin.name".to_string()));
    }
    if let PluginSource::Remote {
        repository,
        revision,
    } = &descriptor.plugin.source
    {
        let parts: Vec<&str> = repository.split('/').collect();
        if parts.len() != 2 || parts.iter().any(|p| p.is_empty() || *p == "." || *p == "..") {
            return Err(ConfigError::Invalid {
                field: "plugin.repository".to_string(),
                reason: format!("expected owner/name, got '{repository}'"),
            });
        }
        if revision.trim().is_empty() {
            return Err(ConfigError::MissingField("plugin.revision".to_string()));
        }
    }
    for (i, pin) in descriptor.packages.ids.iter().enumerate() {
        if pin.id.trim().is_empty() {
            return Err(ConfigError::MissingField(format!("packages.ids[{i}].id")));
        }
    }
    for version in &descriptor.versions {
        if version.name.trim().is_empty() || version.revision.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "versions".to_string(),
                reason: "alternate versions need a name and a revision".to_string(),
            });
        }
    }
    Ok(())
}
