//! `compilerOptions.paths` and `baseUrl` read from a tsconfig file.
//!
//! Used when `resolve.paths` is empty so TypeScript projects resolve their
//! path aliases without repeating them in kiln's config. `extends` chains are
//! followed; options from the extending file win key by key.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use path_clean::PathClean;
use serde::Deserialize;

use crate::resolve::ResolutionError;

/// Maximum allowed size for a tsconfig file (1MB)
const MAX_TSCONFIG_SIZE: u64 = 1024 * 1024;

const MAX_EXTENDS_DEPTH: usize = 8;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTsConfig {
    #[serde(default)]
    extends: Option<Extends>,
    #[serde(default)]
    compiler_options: RawCompilerOptions,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Extends {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCompilerOptions {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    paths: Option<IndexMap<String, Vec<String>>>,
}

/// Path mappings after `extends` has been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TsPaths {
    /// Absolute `baseUrl`, if any file in the chain set one.
    pub base_url: Option<PathBuf>,
    pub paths: IndexMap<String, Vec<String>>,
    /// Directory `paths` targets are joined to: `baseUrl` when set,
    /// otherwise the directory of the file that declared `paths`.
    pub paths_base: PathBuf,
}

impl TsPaths {
    /// Load `path` and everything it extends.
    pub fn load(path: &Path) -> Result<Self, ResolutionError> {
        let mut base_url = None;
        let mut paths = None;
        collect(path, 0, &mut base_url, &mut paths)?;

        let (paths, declared_in) = paths.unwrap_or_default();
        let paths_base = base_url.clone().unwrap_or(declared_in);
        Ok(Self {
            base_url,
            paths,
            paths_base,
        })
    }

    /// `<root>/tsconfig.json`, when present.
    pub fn discover(root: &Path) -> Result<Option<Self>, ResolutionError> {
        let path = root.join("tsconfig.json");
        if !path.is_file() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }
}

/// Fill `base_url` and `paths` from `path`, then from its parents for
/// whatever is still unset. The first file to set a key owns it.
fn collect(
    path: &Path,
    depth: usize,
    base_url: &mut Option<PathBuf>,
    paths: &mut Option<(IndexMap<String, Vec<String>>, PathBuf)>,
) -> Result<(), ResolutionError> {
    let invalid = |message: String| ResolutionError::InvalidTsConfig {
        path: path.to_path_buf(),
        message,
    };
    if depth > MAX_EXTENDS_DEPTH {
        return Err(invalid("extends chain is too deep".to_string()));
    }

    let metadata = fs::metadata(path).map_err(|e| invalid(e.to_string()))?;
    if metadata.len() > MAX_TSCONFIG_SIZE {
        return Err(invalid(format!(
            "file exceeds maximum size of {}KB",
            MAX_TSCONFIG_SIZE / 1024
        )));
    }
    let content = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let raw: RawTsConfig =
        serde_json::from_str(&strip_jsonc(&content)).map_err(|e| invalid(e.to_string()))?;

    let dir = path.parent().unwrap_or(Path::new("")).to_path_buf();
    if base_url.is_none() {
        *base_url = raw
            .compiler_options
            .base_url
            .map(|base| dir.join(base).clean());
    }
    if paths.is_none() {
        *paths = raw.compiler_options.paths.map(|p| (p, dir.clone()));
    }

    let parents = match raw.extends {
        None => Vec::new(),
        Some(Extends::One(parent)) => vec![parent],
        // Later entries take precedence over earlier ones.
        Some(Extends::Many(list)) => list.into_iter().rev().collect(),
    };
    for parent in parents {
        let parent_path = locate_parent(&dir, &parent).ok_or_else(|| {
            invalid(format!("cannot find '{parent}' named in extends"))
        })?;
        collect(&parent_path, depth + 1, base_url, paths)?;
    }
    Ok(())
}

/// Relative and absolute `extends` are file paths; anything else is a
/// package under an ancestor `node_modules`.
fn locate_parent(dir: &Path, spec: &str) -> Option<PathBuf> {
    let with_json = |p: PathBuf| -> Option<PathBuf> {
        if p.is_file() {
            return Some(p);
        }
        let mut s = p.into_os_string();
        s.push(".json");
        let p = PathBuf::from(s);
        p.is_file().then_some(p)
    };

    if spec.starts_with("./") || spec.starts_with("../") || Path::new(spec).is_absolute() {
        return with_json(dir.join(spec).clean());
    }
    dir.ancestors().find_map(|ancestor| {
        let package = ancestor.join("node_modules").join(spec);
        if package.is_dir() {
            with_json(package.join("tsconfig.json"))
        } else {
            with_json(package)
        }
    })
}

/// Make tsconfig text parseable as JSON: drop `//` and `/* */` comments,
/// then commas that directly precede `}` or `]`. String contents are left
/// alone.
fn strip_jsonc(text: &str) -> String {
    remove_trailing_commas(&remove_comments(text))
}

/// Index just past the string literal starting at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() && bytes[i] != b'"' {
        if bytes[i] == b'\\' {
            i += 1;
        }
        i += 1;
    }
    (i + 1).min(bytes.len())
}

fn remove_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut plain = 0;
    let mut i = 0;
    while i < bytes.len() {
        match (bytes[i], bytes.get(i + 1)) {
            (b'"', _) => i = skip_string(bytes, i),
            (b'/', Some(b'/')) => {
                out.push_str(&text[plain..i]);
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                plain = i;
            }
            (b'/', Some(b'*')) => {
                out.push_str(&text[plain..i]);
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
                plain = i;
            }
            _ => i += 1,
        }
    }
    out.push_str(&text[plain..]);
    out
}

fn remove_trailing_commas(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut plain = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = skip_string(bytes, i),
            b',' => {
                let next = bytes[i + 1..].iter().find(|b| !b.is_ascii_whitespace());
                if matches!(next, Some(b'}' | b']')) {
                    out.push_str(&text[plain..i]);
                    plain = i + 1;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    out.push_str(&text[plain..]);
    out
}
