//! Generator configuration
//!
//! This module holds the knobs of a generator run and the fixed names of
//! the assemblies every run depends on. The companion input is handed over
//! already loaded; reading it from disk belongs to the caller.

use std::collections::HashSet;

use crate::{signature::SigAssembly, Error, Result};

/// Name of the interop runtime-support assembly.
pub const RUNTIME_ASSEMBLY: &str = "Il2CppInterop.Runtime";

/// Name of the native corlib after renaming.
pub const IL2CPP_CORLIB: &str = "Il2Cppmscorlib";

/// Name of the managed reference corlib.
pub const MONO_CORLIB: &str = "mscorlib";

/// Namespace of every type the generator synthesizes.
pub const GENERATED_NAMESPACE: &str = "Il2CppInterop.Generated";

/// Name of the assembly holding the global `Initialize()` entry point.
pub const INITIALIZER_ASSEMBLY: &str = "Il2CppInterop.Generated.Initializer";

/// Configuration for one generator run
///
/// The default runs every pass: bodies are translated where possible,
/// instance field stores use the write-barrier setter and the global
/// initializer is emitted. Companion assemblies are absent by default, in
/// which case the unstrip pass only warns.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct GeneratorConfig {
    /// Companion assemblies carrying stripped members and original bodies
    /// `None` means the input was not supplied at all
    pub companion_assemblies: Option<Vec<SigAssembly>>,

    /// Route instance field stores through the write-barrier setter
    /// When false, stores use the plain pointer setter
    pub write_barrier: bool,

    /// Attempt instruction-level translation of recovered bodies
    /// When false, every stripped method receives a bridge body
    pub translate_bodies: bool,

    /// Emit the assembly whose `Initialize()` runs every closed instantiation's
    /// initialization type
    pub eager_initialization: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            companion_assemblies: None,
            write_barrier: true,
            translate_bodies: true,
            eager_initialization: true,
        }
    }
}

impl GeneratorConfig {
    /// Creates a minimal configuration
    ///
    /// Every stripped method is bridged, no global initializer is emitted
    /// and field stores skip the write barrier.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            companion_assemblies: None,
            write_barrier: false,
            translate_bodies: false,
            eager_initialization: false,
        }
    }

    /// Creates a configuration with every feature enabled
    #[must_use]
    pub fn full() -> Self {
        Self::default()
    }

    /// Supplies the companion assemblies
    #[must_use]
    pub fn with_companions(mut self, assemblies: Vec<SigAssembly>) -> Self {
        self.companion_assemblies = Some(assemblies);
        self
    }

    /// Checks the configuration for inconsistencies
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a companion assembly has an empty name or
    /// two companion assemblies share a name.
    pub fn validate(&self) -> Result<()> {
        let Some(companions) = &self.companion_assemblies else {
            return Ok(());
        };
        let mut seen = HashSet::new();
        for assembly in companions {
            if assembly.name.is_empty() {
                return Err(Error::Config("companion assembly without a name".to_string()));
            }
            if !seen.insert(assembly.name.as_str()) {
                return Err(Error::Config(format!(
                    "companion assembly '{}' supplied twice",
                    assembly.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let full = GeneratorConfig::full();
        assert!(full.translate_bodies && full.eager_initialization && full.write_barrier);
        let minimal = GeneratorConfig::minimal();
        assert!(!minimal.translate_bodies && !minimal.eager_initialization);
        assert!(minimal.companion_assemblies.is_none());
    }

    #[test]
    fn validate_rejects_duplicates_and_empty_names() {
        assert!(GeneratorConfig::default().validate().is_ok());

        let dup = GeneratorConfig::default().with_companions(vec![
            SigAssembly::new("Assembly-CSharp"),
            SigAssembly::new("Assembly-CSharp"),
        ]);
        assert!(matches!(dup.validate(), Err(Error::Config(_))));

        let unnamed = GeneratorConfig::default().with_companions(vec![SigAssembly::new("")]);
        assert!(matches!(unnamed.validate(), Err(Error::Config(_))));

        let ok = GeneratorConfig::default()
            .with_companions(vec![SigAssembly::new("A"), SigAssembly::new("B")]);
        assert!(ok.validate().is_ok());
    }
}
