//! lutra-transform - source transforms for the lutra module hooks.
//!
//! Everything in this crate works on source text and never touches the
//! module graph:
//!
//! - **Syntax transform**: TypeScript stripping, JSX lowering and optional
//!   ESM to CommonJS lowering on top of SWC ([`SwcTransformer`])
//! - **JSON modules**: JSON documents as ES modules with named exports
//! - **Interop rewriting**: `import()` call sites are chained through a
//!   runtime handler that unwraps doubly wrapped CommonJS namespaces
//! - **Source maps**: stitching maps across passes and remapping stack traces
//!   ([`SourceMapRegistry`])
//! - **tsconfig.json**: path mapping and per-file compiler options
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use lutra_transform::{ModuleKind, SwcTransformer, Transform, TransformOptions};
//!
//! let path = Path::new("src/main.ts");
//! let options = TransformOptions::for_path(path, ModuleKind::Esm);
//! let out = SwcTransformer.transform_sync("const n: number = 1;", path, &options).unwrap();
//! assert!(out.code.contains("const n = 1"));
//! ```

mod ast;
pub mod commonjs;
pub mod config;
pub mod error;
pub mod interop;
pub mod json;
mod jsx;
pub mod media;
pub mod source_map;
pub mod transpiler;
pub mod tsconfig;

pub use commonjs::has_module_syntax;
pub use config::TypeScriptConfig;
pub use error::{TransformError, TransformResult};
pub use interop::{INTEROP_HANDLER, InteropRewrite, rewrite_dynamic_imports};
pub use json::json_to_module;
pub use media::{DEPENDENCY_DIR, MediaType, is_dependency_path};
pub use source_map::{OriginalPosition, SourceMapRegistry, inline_source_map_comment};
pub use transpiler::{ModuleKind, SwcTransformer, Transform, TransformOptions, TransformOutput};
pub use tsconfig::{
    CompilerOptionsLookup, PathMappingRule, PathMatcher, TsConfigJson, TsconfigFileMatcher,
    TsconfigPaths, find_tsconfig,
};

/// Re-export the ECMAScript target enum used by [`TypeScriptConfig`].
pub use swc_ecma_ast::EsVersion;
