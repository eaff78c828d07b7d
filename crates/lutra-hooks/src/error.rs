//! Error types for lutra-hooks

use std::path::PathBuf;

use lutra_transform::TransformError;
use thiserror::Error;

/// Host-defined resolution failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveErrorKind {
    ModuleNotFound,
    UnsupportedDirectoryImport,
    PackagePathNotExported,
    PackageImportNotDefined,
    UnknownFileExtension,
    Other,
}

impl ResolveErrorKind {
    /// The host's error code for this kind.
    pub fn code(self) -> &'static str {
        match self {
            Self::ModuleNotFound => "ERR_MODULE_NOT_FOUND",
            Self::UnsupportedDirectoryImport => "ERR_UNSUPPORTED_DIR_IMPORT",
            Self::PackagePathNotExported => "ERR_PACKAGE_PATH_NOT_EXPORTED",
            Self::PackageImportNotDefined => "ERR_PACKAGE_IMPORT_NOT_DEFINED",
            Self::UnknownFileExtension => "ERR_UNKNOWN_FILE_EXTENSION",
            Self::Other => "ERR_LUTRA_RESOLVE",
        }
    }

    /// Kinds the resolution engine may recover from by trying another candidate.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            Self::ModuleNotFound
                | Self::UnsupportedDirectoryImport
                | Self::PackagePathNotExported
                | Self::PackageImportNotDefined
        )
    }
}

/// A resolution failure as the host reports it: a kind, a message and the
/// stack text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{}] {}", .kind.code(), .message)]
pub struct ResolveError {
    pub kind: ResolveErrorKind,
    pub message: String,
    pub stack: Option<String>,
}

impl ResolveError {
    pub fn new(kind: ResolveErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let stack = format!("Error [{}]: {}\n    at resolve (lutra)", kind.code(), message);
        Self {
            kind,
            message,
            stack: Some(stack),
        }
    }

    pub fn module_not_found(message: impl Into<String>) -> Self {
        Self::new(ResolveErrorKind::ModuleNotFound, message)
    }

    pub fn unsupported_directory_import(message: impl Into<String>) -> Self {
        Self::new(ResolveErrorKind::UnsupportedDirectoryImport, message)
    }

    pub fn package_path_not_exported(message: impl Into<String>) -> Self {
        Self::new(ResolveErrorKind::PackagePathNotExported, message)
    }

    pub fn package_import_not_defined(message: impl Into<String>) -> Self {
        Self::new(ResolveErrorKind::PackageImportNotDefined, message)
    }

    pub fn unknown_file_extension(message: impl Into<String>) -> Self {
        Self::new(ResolveErrorKind::UnknownFileExtension, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ResolveErrorKind::Other, message)
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn is(&self, kind: ResolveErrorKind) -> bool {
        self.kind == kind
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind.is_recoverable()
    }

    /// Remove `suffix` where it directly precedes a closing quote, in both the
    /// message and the stack: with suffix `.js`, `'./foo.js'` becomes `'./foo'`.
    pub fn strip_message_suffix(&mut self, suffix: &str) {
        if suffix.is_empty() {
            return;
        }
        let quoted = format!("{}'", suffix);
        self.message = self.message.replace(&quoted, "'");
        if let Some(stack) = &mut self.stack {
            *stack = stack.replace(&quoted, "'");
        }
    }
}

/// Errors surfaced by the hooks to the host.
#[derive(Debug, Error)]
pub enum HookError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The syntax transform failed. Always fatal for the module load.
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(
        "lutra hooks were activated without initialization data; register them through the host's preload/import mechanism"
    )]
    MissingInitializeData,

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid module URL: {0}")]
    InvalidUrl(String),

    #[error("Source of '{url}' is not valid UTF-8")]
    NotUtf8 {
        url: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("Watch message too large: {len} bytes (limit {limit})")]
    FrameTooLarge { len: usize, limit: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transform task failed: {0}")]
    Task(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HookError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The resolution error kind, if this is a resolution failure.
    pub fn resolve_kind(&self) -> Option<ResolveErrorKind> {
        match self {
            Self::Resolve(e) => Some(e.kind),
            _ => None,
        }
    }
}

/// Result type using HookError
pub type HookResult<T> = Result<T, HookError>;
