//! lutra-hooks - run TypeScript and JSX modules without a build step.
//!
//! Two hook chains sit in front of the host's module system:
//!
//! - [`ResolverChain`]: [`TsResolveHook`] (tsconfig paths, typed siblings,
//!   extension and index lookup) followed by the host's [`NodeResolver`]
//! - [`LoaderChain`]: [`TsLoadHook`] (syntax transform, JSON modules, dynamic
//!   import interop, source maps) followed by the host's [`NodeLoader`]
//!
//! # Example
//!
//! ```no_run
//! use lutra_hooks::{HookContext, HooksConfig, InitializeData, LoadContext, ResolveContext};
//!
//! # async fn run() -> lutra_hooks::HookResult<()> {
//! let context = HookContext::initialize(Some(InitializeData::new(HooksConfig::from_env())))?;
//! let (resolver, loader) = lutra_hooks::chains(context);
//!
//! let resolved = resolver.resolve("./src/main", &ResolveContext::default())?;
//! let loaded = loader.load(&resolved.url, LoadContext::new(resolved.format)).await?;
//! println!("{:?}", loaded.source_text());
//! # Ok(())
//! # }
//! ```

pub mod candidates;
pub mod chain;
pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod host;
pub mod load;
pub mod reporter;
pub mod resolve;

use std::sync::Arc;

pub use candidates::ts_candidates;
pub use chain::{
    ImportKind, LoadContext, LoadResult, LoadStage, LoaderChain, ModuleSource, NextLoad,
    NextResolve, Resolution, ResolveContext, ResolveStage, ResolverChain,
};
pub use config::{HooksConfig, TsconfigSource};
pub use context::{HookContext, InitializeData};
pub use error::{HookError, HookResult, ResolveError, ResolveErrorKind};
pub use format::{ModuleFormat, infer_format};
pub use host::{NodeLoader, NodeResolver, is_builtin};
pub use load::TsLoadHook;
pub use reporter::{ChannelReporter, DependencyReporter, NoopReporter, WatchMessage};
pub use resolve::{TRIAL_EXTENSIONS, TsResolveHook};

/// The default hook chains for `context`.
pub fn chains(context: Arc<HookContext>) -> (ResolverChain, LoaderChain) {
    let resolver = ResolverChain::new(vec![
        Arc::new(TsResolveHook::new(Arc::clone(&context))),
        Arc::new(NodeResolver::new(context.config().cwd.clone())),
    ]);
    let loader = LoaderChain::new(vec![
        Arc::new(TsLoadHook::new(context)),
        Arc::new(NodeLoader),
    ]);
    (resolver, loader)
}
