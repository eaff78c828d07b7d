//! Process-wide source map registry.
//!
//! Every transformed module installs its final map here, keyed by module URL.
//! Stack traces of errors thrown by transformed code can then be rewritten to
//! point at the original source positions.

use std::fmt;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use oxc_sourcemap::{SourceMap, Token};
use regex::{Captures, Regex};
use url::Url;

use crate::error::{TransformError, TransformResult};

/// `<location>:<line>:<column>` inside a stack frame. Locations are either
/// `file://` URLs or absolute paths.
static FRAME_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"((?:file://)?/[^\s():]*?):(\d+):(\d+)").expect("valid regex")
});

/// A position in original source. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: Option<String>,
    pub line: u32,
    pub column: u32,
}

/// An installed map, indexed by generated line once so lookups from stack
/// traces don't rebuild it.
struct IndexedMap {
    sources: Vec<Arc<str>>,
    /// Tokens of each generated line, sorted by generated column.
    lines: Vec<Vec<Token>>,
}

impl IndexedMap {
    fn new(map: &SourceMap) -> Self {
        let mut lines: Vec<Vec<Token>> = Vec::new();
        for token in map.get_tokens() {
            let line = token.get_dst_line() as usize;
            if lines.len() <= line {
                lines.resize_with(line + 1, Vec::new);
            }
            lines[line].push(token);
        }
        for tokens in &mut lines {
            tokens.sort_by_key(|token| token.get_dst_col());
        }
        Self {
            sources: map.get_sources().cloned().collect(),
            lines,
        }
    }

    /// The last token at or before the 0-based (line, column).
    fn lookup(&self, line: u32, column: u32) -> Option<Token> {
        let tokens = self.lines.get(line as usize)?;
        let end = tokens.partition_point(|token| token.get_dst_col() <= column);
        tokens.get(end.checked_sub(1)?).copied()
    }
}

#[derive(Default)]
pub struct SourceMapRegistry {
    maps: DashMap<String, IndexedMap>,
}

impl fmt::Debug for SourceMapRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceMapRegistry")
            .field("maps", &self.maps.len())
            .finish()
    }
}

impl SourceMapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the map for `url`.
    pub fn install(&self, url: &str, map_json: &str) -> TransformResult<()> {
        let map = SourceMap::from_json_string(map_json)
            .map_err(|e| TransformError::SourceMap(format!("{}: {:?}", url, e)))?;
        self.maps.insert(url.to_string(), IndexedMap::new(&map));
        tracing::trace!(url, "installed source map");
        Ok(())
    }

    pub fn remove(&self, url: &str) -> bool {
        self.maps.remove(url).is_some()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.maps.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Map a 1-based generated position in `url` to its original position.
    pub fn remap_position(&self, url: &str, line: u32, column: u32) -> Option<OriginalPosition> {
        let map = self.maps.get(url)?;
        let token = map.lookup(line.checked_sub(1)?, column.saturating_sub(1))?;

        Some(OriginalPosition {
            source: token
                .get_source_id()
                .and_then(|id| map.sources.get(id as usize))
                .map(|source| source.to_string()),
            line: token.get_src_line() + 1,
            column: token.get_src_col() + 1,
        })
    }

    /// Rewrite every `location:line:column` in `stack` that belongs to a
    /// module with an installed map. Other frames are left untouched.
    pub fn remap_stack(&self, stack: &str) -> String {
        if self.maps.is_empty() {
            return stack.to_string();
        }

        FRAME_LOCATION
            .replace_all(stack, |caps: &Captures<'_>| {
                let location = &caps[1];
                let remapped = frame_key(location).and_then(|key| {
                    let line = caps[2].parse().ok()?;
                    let column = caps[3].parse().ok()?;
                    self.remap_position(&key, line, column)
                });
                match remapped {
                    Some(pos) => format!("{}:{}:{}", location, pos.line, pos.column),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// `//# sourceMappingURL=data:...` comment carrying `map_json` inline.
pub fn inline_source_map_comment(map_json: &str) -> TransformResult<String> {
    let map = SourceMap::from_json_string(map_json)
        .map_err(|e| TransformError::SourceMap(format!("{:?}", e)))?;
    Ok(format!("//# sourceMappingURL={}", map.to_data_url()))
}

fn frame_key(location: &str) -> Option<String> {
    if location.starts_with("file://") {
        Some(location.to_string())
    } else {
        Url::from_file_path(location).ok().map(|url| url.to_string())
    }
}
