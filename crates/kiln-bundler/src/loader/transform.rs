//! Transform capability and the registry of named implementations.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap;

/// A source-to-source transform.
///
/// Implementations must be pure: the same bytes and path always produce the
/// same output. The incremental cache relies on this to skip work for
/// modules whose content hash is unchanged.
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the transformed bytes, or a message describing why the input
    /// was rejected.
    fn transform(&self, source: &[u8], path: &Path) -> Result<Vec<u8>, String>;
}

impl fmt::Debug for dyn Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transform({})", self.name())
    }
}

/// Adapter turning a closure into a [`Transform`].
pub struct FnTransform<F> {
    name: String,
    f: F,
}

impl<F> FnTransform<F>
where
    F: Fn(&[u8], &Path) -> Result<Vec<u8>, String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(&[u8], &Path) -> Result<Vec<u8>, String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, source: &[u8], path: &Path) -> Result<Vec<u8>, String> {
        (self.f)(source, path)
    }
}

pub struct Passthrough;

impl Transform for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn transform(&self, source: &[u8], _path: &Path) -> Result<Vec<u8>, String> {
        Ok(source.to_vec())
    }
}

/// Removes a leading UTF-8 byte order mark.
pub struct StripBom;

impl Transform for StripBom {
    fn name(&self) -> &str {
        "strip-bom"
    }

    fn transform(&self, source: &[u8], _path: &Path) -> Result<Vec<u8>, String> {
        Ok(source
            .strip_prefix(b"\xEF\xBB\xBF")
            .unwrap_or(source)
            .to_vec())
    }
}

/// Validates JSON and exposes it as the module's default export.
pub struct JsonModule;

impl Transform for JsonModule {
    fn name(&self) -> &str {
        "json"
    }

    fn transform(&self, source: &[u8], _path: &Path) -> Result<Vec<u8>, String> {
        let value: serde_json::Value =
            serde_json::from_slice(source).map_err(|e| format!("invalid JSON: {e}"))?;
        let body = serde_json::to_string(&value).map_err(|e| e.to_string())?;
        Ok(format!("export default {body};\n").into_bytes())
    }
}

/// Exposes the file's text as a string default export.
pub struct TextModule;

impl Transform for TextModule {
    fn name(&self) -> &str {
        "text"
    }

    fn transform(&self, source: &[u8], _path: &Path) -> Result<Vec<u8>, String> {
        let text = std::str::from_utf8(source).map_err(|e| format!("not UTF-8: {e}"))?;
        let literal = serde_json::to_string(text).map_err(|e| e.to_string())?;
        Ok(format!("export default {literal};\n").into_bytes())
    }
}

/// Named transforms available to `module.rules`.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: FxHashMap<String, Arc<dyn Transform>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `passthrough`, `strip-bom`, `json` and `text`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Passthrough);
        registry.register(StripBom);
        registry.register(JsonModule);
        registry.register(TextModule);
        registry
    }

    /// Register under the transform's own name, replacing any previous one.
    pub fn register(&mut self, transform: impl Transform + 'static) -> &mut Self {
        let transform: Arc<dyn Transform> = Arc::new(transform);
        self.transforms
            .insert(transform.name().to_string(), transform);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transform>> {
        self.transforms.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.transforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("transforms", &self.names())
            .finish()
    }
}
