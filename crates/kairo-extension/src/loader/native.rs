//! Native extension loader using `libloading` (feature-gated).

#[cfg(feature = "dynamic")]
mod imp {
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;
    use libloading::Library;
    use tracing::info;

    use crate::api::HostApi;
    use crate::error::ExtensionError;
    use crate::guard::guarded_sync;
    use crate::loader::{ExtensionModule, ModuleLoader};
    use crate::manifest::Manifest;

    /// Symbol exported by [`declare_extension!`](crate::declare_extension).
    pub const ENTRY_SYMBOL: &[u8] = b"kairo_extension_entry";

    /// Signature of the exported entry point.
    pub type ExtensionEntryFn = fn() -> Box<dyn ExtensionModule>;

    /// A module together with the library that holds its code.
    ///
    /// Field order matters: the module is dropped before the library.
    struct NativeModule {
        module: Box<dyn ExtensionModule>,
        _library: Library,
    }

    #[async_trait]
    impl ExtensionModule for NativeModule {
        async fn initialize(&self, api: &HostApi) -> anyhow::Result<()> {
            self.module.initialize(api).await
        }

        async fn cleanup(&self, api: &HostApi) -> anyhow::Result<()> {
            self.module.cleanup(api).await
        }
    }

    /// Loads extensions built as shared libraries (.so / .dll / .dylib).
    ///
    /// Only load trusted extensions: the library runs with the full
    /// privileges of the host, and must be built with the same toolchain.
    #[derive(Debug, Default)]
    pub struct NativeModuleLoader;

    impl NativeModuleLoader {
        pub fn new() -> Self {
            Self
        }
    }

    #[async_trait]
    impl ModuleLoader for NativeModuleLoader {
        async fn load(
            &self,
            manifest: &Manifest,
            entry: &Path,
        ) -> Result<Arc<dyn ExtensionModule>, ExtensionError> {
            // SAFETY: loading a library runs its initialisers. The caller
            // opted into native extensions by enabling the `dynamic` feature.
            let library = unsafe { Library::new(entry) }.map_err(|e| {
                ExtensionError::load(
                    &manifest.id,
                    format!("failed to open library '{}': {e}", entry.display()),
                )
            })?;

            // SAFETY: the symbol is generated by `declare_extension!` with
            // the `ExtensionEntryFn` signature.
            let entry_fn: ExtensionEntryFn = unsafe {
                let symbol = library.get::<ExtensionEntryFn>(ENTRY_SYMBOL).map_err(|e| {
                    ExtensionError::load(
                        &manifest.id,
                        format!("missing 'kairo_extension_entry' symbol: {e}"),
                    )
                })?;
                *symbol
            };

            let module = guarded_sync(|| Ok(entry_fn()))
                .map_err(|failure| ExtensionError::load(&manifest.id, failure.to_string()))?;

            info!(extension_id = %manifest.id, path = %entry.display(), "Native extension loaded");

            Ok(Arc::new(NativeModule {
                module,
                _library: library,
            }))
        }
    }
}

/// Stub loader when the `dynamic` feature is not enabled.
#[cfg(not(feature = "dynamic"))]
mod imp {
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::error::ExtensionError;
    use crate::loader::{ExtensionModule, ModuleLoader};
    use crate::manifest::Manifest;

    /// Stub native loader. Every load fails.
    #[derive(Debug, Default)]
    pub struct NativeModuleLoader;

    impl NativeModuleLoader {
        pub fn new() -> Self {
            Self
        }
    }

    #[async_trait]
    impl ModuleLoader for NativeModuleLoader {
        async fn load(
            &self,
            manifest: &Manifest,
            _entry: &Path,
        ) -> Result<Arc<dyn ExtensionModule>, ExtensionError> {
            Err(ExtensionError::load(
                &manifest.id,
                "native extensions require the 'dynamic' feature",
            ))
        }
    }
}

pub use imp::*;
