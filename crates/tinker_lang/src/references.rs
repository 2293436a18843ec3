//! The set of reference modules visible to one compilation.

use std::collections::BTreeMap;
use std::sync::Arc;

use tinker_module::{Export, ModuleImage, Visibility};

/// A reference module together with the access this build has to it.
#[derive(Clone, Debug)]
pub struct VisibleModule {
    /// The reference's image.
    pub image: Arc<ModuleImage>,
    /// Internal exports are callable, as if they were public.
    pub internals_visible: bool,
}

impl VisibleModule {
    /// Looks up an export this build is allowed to call.
    ///
    /// Returns `Err` with the export when it exists but is internal and not
    /// visible.
    pub fn accessible(&self, symbol: &str) -> Option<Result<&Export, &Export>> {
        let export = self.image.export(symbol)?;
        if export.visibility == Visibility::Public || self.internals_visible {
            Some(Ok(export))
        } else {
            Some(Err(export))
        }
    }
}

/// Reference modules keyed by name.
#[derive(Clone, Debug, Default)]
pub struct ReferenceSet {
    modules: BTreeMap<String, VisibleModule>,
}

impl ReferenceSet {
    /// Creates an empty reference set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reference under its module name, replacing any previous one.
    pub fn insert(&mut self, image: Arc<ModuleImage>) {
        self.modules.insert(
            image.name.clone(),
            VisibleModule {
                image,
                internals_visible: false,
            },
        );
    }

    /// Substitutes the internals-visible variant of `name`.
    ///
    /// Returns `false` if no such reference is in the set.
    pub fn publicize(&mut self, name: &str) -> bool {
        match self.modules.get_mut(name) {
            Some(module) => {
                module.internals_visible = true;
                true
            }
            None => false,
        }
    }

    /// Looks up a reference by name.
    pub fn get(&self, name: &str) -> Option<&VisibleModule> {
        self.modules.get(name)
    }

    /// Iterates over reference names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Returns the number of references.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_core() -> Arc<ModuleImage> {
        Arc::new(
            ModuleImage::new("host_core")
                .with_export("log", 1, Visibility::Public)
                .with_export("raw_handle", 0, Visibility::Internal),
        )
    }

    #[test]
    fn internal_hidden_until_publicized() {
        let mut set = ReferenceSet::new();
        set.insert(host_core());
        let module = set.get("host_core").unwrap();
        assert!(matches!(module.accessible("log"), Some(Ok(_))));
        assert!(matches!(module.accessible("raw_handle"), Some(Err(_))));
        assert!(module.accessible("missing").is_none());

        assert!(set.publicize("host_core"));
        let module = set.get("host_core").unwrap();
        assert!(matches!(module.accessible("raw_handle"), Some(Ok(_))));
    }

    #[test]
    fn publicize_unknown_reference() {
        let mut set = ReferenceSet::new();
        assert!(!set.publicize("host_core"));
    }

    #[test]
    fn publicize_is_per_set() {
        let mut base = ReferenceSet::new();
        base.insert(host_core());
        let mut build = base.clone();
        build.publicize("host_core");
        assert!(!base.get("host_core").unwrap().internals_visible);
        assert!(build.get("host_core").unwrap().internals_visible);
    }
}
