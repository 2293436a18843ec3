//! Toolchain context hosted in the calling process.

use tinker_lang::ReferenceSet;
use tinker_refs::ReferenceCatalog;

use crate::error::ToolchainError;
use crate::session::{CompilationSession, LocalSession};
use crate::settings::ToolchainSettings;
use crate::ToolchainFactory;

/// A toolchain whose reference catalog lives in this process.
///
/// Also the engine behind the worker side of [`ProcessToolchain`](crate::ProcessToolchain).
#[derive(Debug)]
pub struct InProcessToolchain {
    settings: ToolchainSettings,
    catalog: Option<ReferenceCatalog>,
}

impl InProcessToolchain {
    /// Creates an uninitialized toolchain.
    pub fn new(settings: ToolchainSettings) -> Self {
        Self {
            settings,
            catalog: None,
        }
    }

    /// Returns the settings.
    pub fn settings(&self) -> &ToolchainSettings {
        &self.settings
    }

    /// Returns `true` between `init` and `dispose`.
    pub fn is_initialized(&self) -> bool {
        self.catalog.is_some()
    }

    /// Names of every resolved reference, empty before `init`.
    pub fn references(&self) -> Vec<String> {
        self.catalog
            .iter()
            .flat_map(|catalog| catalog.entries().map(|e| e.name.clone()))
            .collect()
    }

    /// Resolves one more reference into the context.
    pub fn load_reference(&mut self, name: &str) -> Result<bool, ToolchainError> {
        self.init()?;
        Ok(self
            .catalog
            .as_mut()
            .is_some_and(|catalog| catalog.load_reference(name).is_some()))
    }

    /// Creates a concrete session rather than a boxed one.
    pub fn create_local(&mut self, debug_build: bool) -> Result<LocalSession, ToolchainError> {
        self.init()?;
        let mut refs = ReferenceSet::new();
        if let Some(catalog) = &self.catalog {
            for entry in catalog.entries() {
                refs.insert(entry.image.clone());
            }
        }
        Ok(LocalSession::new(
            refs,
            debug_build,
            self.settings.deny_warnings,
        ))
    }
}

impl ToolchainFactory for InProcessToolchain {
    fn init(&mut self) -> Result<(), ToolchainError> {
        if self.catalog.is_some() {
            return Ok(());
        }
        let mut catalog = ReferenceCatalog::new(self.settings.probe_dirs.clone());
        catalog.resolve(&self.settings.references)?;
        tracing::info!(references = catalog.len(), "toolchain context initialized");
        self.catalog = Some(catalog);
        Ok(())
    }

    fn create(&mut self, debug_build: bool) -> Result<Box<dyn CompilationSession>, ToolchainError> {
        Ok(Box::new(self.create_local(debug_build)?))
    }

    fn dispose(&mut self) {
        if self.catalog.take().is_some() {
            tracing::debug!("toolchain context disposed");
        }
    }
}
