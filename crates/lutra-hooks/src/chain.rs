//! Resolver and loader chains.
//!
//! The host's hook contract is continuation based: every hook receives the
//! rest of the chain as `nextResolve`/`nextLoad`. Here a chain is an ordered
//! list of stages, and each stage gets a handle to the stages after it.
//!
//! ```text
//! ResolverChain [ TsResolveHook, NodeResolver ]
//!                      │  next.call(..)   ▲
//!                      └──────────────────┘
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use url::Url;

use crate::error::{HookError, HookResult, ResolveError};
use crate::format::ModuleFormat;

/// Which kind of import triggered the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportKind {
    /// `import` statements and `import()`.
    #[default]
    Import,
    /// `require()` calls.
    Require,
}

#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    pub parent_url: Option<Url>,
    /// Package `exports`/`imports` conditions. Empty means the defaults for
    /// `kind`.
    pub conditions: Vec<String>,
    pub kind: ImportKind,
}

impl ResolveContext {
    pub fn new(parent_url: Option<Url>) -> Self {
        Self {
            parent_url,
            ..Default::default()
        }
    }

    pub fn require(parent_url: Option<Url>) -> Self {
        Self {
            parent_url,
            kind: ImportKind::Require,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub url: Url,
    pub format: Option<ModuleFormat>,
    pub short_circuit: bool,
}

impl Resolution {
    pub fn new(url: Url, format: Option<ModuleFormat>) -> Self {
        Self {
            url,
            format,
            short_circuit: false,
        }
    }
}

/// One step of module resolution.
pub trait ResolveStage: Send + Sync {
    fn resolve(
        &self,
        specifier: &str,
        context: &ResolveContext,
        next: NextResolve<'_>,
    ) -> Result<Resolution, ResolveError>;
}

/// The stages after the current one.
#[derive(Clone, Copy)]
pub struct NextResolve<'a> {
    stages: &'a [Arc<dyn ResolveStage>],
}

impl<'a> NextResolve<'a> {
    pub fn new(stages: &'a [Arc<dyn ResolveStage>]) -> Self {
        Self { stages }
    }

    /// Run the rest of the chain. An exhausted chain resolves nothing.
    pub fn call(self, specifier: &str, context: &ResolveContext) -> Result<Resolution, ResolveError> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.resolve(specifier, context, NextResolve::new(rest)),
            None => Err(ResolveError::module_not_found(format!(
                "Cannot find module '{}'",
                specifier
            ))),
        }
    }
}

#[derive(Clone, Default)]
pub struct ResolverChain {
    stages: Vec<Arc<dyn ResolveStage>>,
}

impl ResolverChain {
    pub fn new(stages: Vec<Arc<dyn ResolveStage>>) -> Self {
        Self { stages }
    }

    pub fn push(&mut self, stage: Arc<dyn ResolveStage>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn resolve(&self, specifier: &str, context: &ResolveContext) -> Result<Resolution, ResolveError> {
        NextResolve::new(&self.stages).call(specifier, context)
    }
}

/// Module source as returned by a loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    Text(String),
    Binary(Vec<u8>),
}

impl ModuleSource {
    /// Source as UTF-8 text.
    pub fn into_text(self, url: &Url) -> HookResult<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Binary(bytes) => String::from_utf8(bytes).map_err(|source| HookError::NotUtf8 {
                url: url.to_string(),
                source,
            }),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadContext {
    /// Format declared by resolution.
    pub format: Option<ModuleFormat>,
    /// Import attributes (`with { type: "json" }`).
    pub import_attributes: BTreeMap<String, String>,
    pub kind: ImportKind,
}

impl LoadContext {
    pub fn new(format: Option<ModuleFormat>) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.import_attributes.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub format: ModuleFormat,
    /// `None` for built-ins, and for CommonJS when the host reads the file.
    pub source: Option<ModuleSource>,
    /// Source map JSON for `source`, when it was transformed.
    pub source_map: Option<String>,
    pub short_circuit: bool,
}

impl LoadResult {
    pub fn new(format: ModuleFormat, source: Option<ModuleSource>) -> Self {
        Self {
            format,
            source,
            source_map: None,
            short_circuit: false,
        }
    }

    /// Source as text, if present.
    pub fn source_text(&self) -> Option<std::borrow::Cow<'_, str>> {
        self.source
            .as_ref()
            .map(|source| String::from_utf8_lossy(source.as_bytes()))
    }
}

/// One step of module loading.
pub trait LoadStage: Send + Sync {
    fn load<'a>(
        &'a self,
        url: &'a Url,
        context: LoadContext,
        next: NextLoad<'a>,
    ) -> BoxFuture<'a, HookResult<LoadResult>>;
}

#[derive(Clone, Copy)]
pub struct NextLoad<'a> {
    stages: &'a [Arc<dyn LoadStage>],
}

impl<'a> NextLoad<'a> {
    pub fn new(stages: &'a [Arc<dyn LoadStage>]) -> Self {
        Self { stages }
    }

    pub fn call(self, url: &'a Url, context: LoadContext) -> BoxFuture<'a, HookResult<LoadResult>> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.load(url, context, NextLoad::new(rest)),
            None => Box::pin(async move {
                Err::<LoadResult, _>(HookError::from(ResolveError::module_not_found(format!(
                    "Cannot load module '{}'",
                    url
                ))))
            }),
        }
    }
}

#[derive(Clone, Default)]
pub struct LoaderChain {
    stages: Vec<Arc<dyn LoadStage>>,
}

impl LoaderChain {
    pub fn new(stages: Vec<Arc<dyn LoadStage>>) -> Self {
        Self { stages }
    }

    pub fn push(&mut self, stage: Arc<dyn LoadStage>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub async fn load(&self, url: &Url, context: LoadContext) -> HookResult<LoadResult> {
        NextLoad::new(&self.stages).call(url, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveErrorKind;

    struct Fixed(&'static str);

    impl ResolveStage for Fixed {
        fn resolve(
            &self,
            _specifier: &str,
            _context: &ResolveContext,
            _next: NextResolve<'_>,
        ) -> Result<Resolution, ResolveError> {
            Ok(Resolution::new(Url::parse(self.0).unwrap(), None))
        }
    }

    struct Prefix;

    impl ResolveStage for Prefix {
        fn resolve(
            &self,
            specifier: &str,
            context: &ResolveContext,
            next: NextResolve<'_>,
        ) -> Result<Resolution, ResolveError> {
            if specifier == "skip" {
                return Err(ResolveError::other("skipped"));
            }
            next.call(specifier, context)
        }
    }

    #[test]
    fn test_resolver_chain_order() {
        let chain = ResolverChain::new(vec![Arc::new(Prefix), Arc::new(Fixed("file:///a.js"))]);
        let res = chain.resolve("x", &ResolveContext::default()).unwrap();
        assert_eq!(res.url.as_str(), "file:///a.js");

        let err = chain.resolve("skip", &ResolveContext::default()).unwrap_err();
        assert_eq!(err.kind, ResolveErrorKind::Other);
    }

    #[test]
    fn test_exhausted_resolver_chain() {
        let chain = ResolverChain::new(vec![Arc::new(Prefix)]);
        let err = chain.resolve("./x", &ResolveContext::default()).unwrap_err();
        assert_eq!(err.kind, ResolveErrorKind::ModuleNotFound);
    }

    #[tokio::test]
    async fn test_exhausted_loader_chain() {
        let chain = LoaderChain::default();
        let url = Url::parse("file:///a.js").unwrap();
        let err = chain.load(&url, LoadContext::default()).await.unwrap_err();
        assert_eq!(err.resolve_kind(), Some(ResolveErrorKind::ModuleNotFound));
    }

    #[test]
    fn test_module_source_text() {
        let url = Url::parse("file:///a.js").unwrap();
        let text = ModuleSource::Binary(b"export {};".to_vec()).into_text(&url).unwrap();
        assert_eq!(text, "export {};");

        let err = ModuleSource::Binary(vec![0x66, 0xff, 0xfe])
            .into_text(&url)
            .unwrap_err();
        assert!(matches!(err, HookError::NotUtf8 { ref url, .. } if url == "file:///a.js"), "{:?}", err);
        assert!(err.to_string().contains("file:///a.js"));
    }

    #[test]
    fn test_load_context_attributes() {
        let ctx = LoadContext::new(Some(ModuleFormat::Json)).with_attribute("type", "json");
        assert_eq!(ctx.import_attributes.get("type").map(String::as_str), Some("json"));
    }
}
