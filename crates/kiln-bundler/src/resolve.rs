//! Specifier resolution.
//!
//! Order of operations for one specifier:
//!
//! 1. alias and `paths` rewrites, repeated until no rule applies. Without a
//!    `paths` table, the one from tsconfig is used
//! 2. relative specifiers join the importer's directory
//! 3. bare specifiers search ancestor `node_modules` directories
//! 4. the literal path, then each extension, then `index.<ext>` inside a
//!    directory
//!
//! The resolver only reads the filesystem. A build pass treats what it sees
//! as a snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use kiln_config::ResolveOptions;
use kiln_graph::ModuleId;
use path_clean::PathClean;
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::tsconfig::TsPaths;

#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    #[error("cannot resolve '{specifier}' from {}", importer.display())]
    NotFound {
        specifier: String,
        importer: PathBuf,
        tried: Vec<PathBuf>,
    },

    #[error("extension '{extension}' appears more than once in resolve.extensions")]
    AmbiguousExtension { extension: String },

    #[error("alias cycle while resolving '{specifier}': {}", chain.join(" -> "))]
    AliasCycle {
        specifier: String,
        chain: Vec<String>,
    },

    #[error("invalid package.json at {}: {message}", path.display())]
    InvalidPackage { path: PathBuf, message: String },

    #[error("invalid tsconfig at {}: {message}", path.display())]
    InvalidTsConfig { path: PathBuf, message: String },
}

impl ResolutionError {
    pub fn specifier(&self) -> Option<&str> {
        match self {
            Self::NotFound { specifier, .. } | Self::AliasCycle { specifier, .. } => {
                Some(specifier)
            }
            _ => None,
        }
    }
}

type ResolveResult<T> = std::result::Result<T, ResolutionError>;

/// A tsconfig-style `paths` entry, split around its wildcard.
#[derive(Debug, Clone)]
struct PathMapping {
    prefix: String,
    suffix: Option<String>,
    targets: Vec<String>,
}

impl PathMapping {
    fn parse(key: &str, targets: &[String]) -> Self {
        let (prefix, suffix) = match key.split_once('*') {
            Some((pre, post)) => (pre.to_string(), Some(post.to_string())),
            None => (key.to_string(), None),
        };
        Self {
            prefix,
            suffix,
            targets: targets.to_vec(),
        }
    }

    /// Text captured by the wildcard, or `""` for an exact match.
    fn capture<'s>(&self, specifier: &'s str) -> Option<&'s str> {
        match &self.suffix {
            None => (specifier == self.prefix).then_some(""),
            Some(suffix) => specifier
                .strip_prefix(self.prefix.as_str())?
                .strip_suffix(suffix.as_str()),
        }
    }
}

/// Outcome of the rewrite stage.
enum Rewritten {
    Specifier(String),
    Candidates(Vec<PathBuf>),
}

#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
    extensions: Vec<String>,
    aliases: Vec<(String, String)>,
    paths: Vec<PathMapping>,
    base_url: PathBuf,
    modules: Vec<String>,
    main_fields: Vec<String>,
    main_files: Vec<String>,
}

impl Resolver {
    pub fn new(root: &Path, options: &ResolveOptions) -> ResolveResult<Self> {
        let mut seen = FxHashSet::default();
        for ext in &options.extensions {
            if !seen.insert(ext.as_str()) {
                return Err(ResolutionError::AmbiguousExtension {
                    extension: ext.clone(),
                });
            }
        }

        let root = root.clean();
        let mut base_url = match &options.base_url {
            Some(base) => root.join(base).clean(),
            None => root.clone(),
        };

        let mut paths: Vec<PathMapping> = options
            .paths
            .iter()
            .map(|(k, v)| PathMapping::parse(k, v))
            .collect();
        if paths.is_empty() {
            let ts = match &options.tsconfig {
                Some(file) => Some(TsPaths::load(&root.join(file).clean())?),
                None => TsPaths::discover(&root)?,
            };
            if let Some(ts) = ts.filter(|ts| !ts.paths.is_empty()) {
                tracing::debug!(mappings = ts.paths.len(), "using tsconfig paths");
                if options.base_url.is_none() {
                    base_url = ts.paths_base.clone();
                }
                paths = ts
                    .paths
                    .iter()
                    .map(|(k, v)| PathMapping::parse(k, v))
                    .collect();
            }
        }

        Ok(Self {
            extensions: options.extensions.clone(),
            aliases: options
                .alias
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            paths,
            base_url,
            modules: options.modules.clone(),
            main_fields: options.main_fields.clone(),
            main_files: options.main_files.clone(),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `specifier` as written in a file located in `importer_dir`.
    pub fn resolve(&self, importer_dir: &Path, specifier: &str) -> ResolveResult<ModuleId> {
        let mut tried = Vec::new();
        let found = match self.rewrite(specifier)? {
            Rewritten::Candidates(candidates) => candidates
                .into_iter()
                .find_map(|candidate| self.resolve_path(&candidate, &mut tried)),
            Rewritten::Specifier(spec) => {
                if is_relative(&spec) {
                    self.resolve_path(&importer_dir.join(&spec).clean(), &mut tried)
                } else if Path::new(&spec).is_absolute() {
                    self.resolve_path(&PathBuf::from(&spec).clean(), &mut tried)
                } else {
                    self.resolve_bare(importer_dir, &spec, &mut tried)?
                }
            }
        };

        let path = found.ok_or_else(|| ResolutionError::NotFound {
            specifier: specifier.to_string(),
            importer: importer_dir.to_path_buf(),
            tried,
        })?;

        ModuleId::new(&path).map_err(|e| ResolutionError::NotFound {
            specifier: specifier.to_string(),
            importer: importer_dir.to_path_buf(),
            tried: vec![PathBuf::from(e.to_string())],
        })
    }

    /// Apply alias rules until none match. `paths` entries end the loop
    /// because they map to concrete filesystem candidates.
    fn rewrite(&self, specifier: &str) -> ResolveResult<Rewritten> {
        let mut current = specifier.to_string();
        let mut applied: Vec<&str> = Vec::new();
        let mut chain = vec![current.clone()];

        loop {
            if let Some((key, target)) = self
                .aliases
                .iter()
                .find(|(key, _)| alias_matches(key, &current))
            {
                if applied.contains(&key.as_str()) {
                    return Err(ResolutionError::AliasCycle {
                        specifier: specifier.to_string(),
                        chain,
                    });
                }
                applied.push(key);

                let key = key.trim_end_matches('$');
                let rest = &current[key.len()..];
                current = if is_relative(target) {
                    format!("{}{rest}", self.root.join(target).clean().display())
                } else {
                    format!("{target}{rest}")
                };
                chain.push(current.clone());
                continue;
            }

            if let Some((mapping, captured)) = self
                .paths
                .iter()
                .find_map(|m| m.capture(&current).map(|c| (m, c)))
            {
                let candidates = mapping
                    .targets
                    .iter()
                    .map(|t| self.base_url.join(t.replacen('*', captured, 1)).clean())
                    .collect();
                return Ok(Rewritten::Candidates(candidates));
            }

            return Ok(Rewritten::Specifier(current));
        }
    }

    fn resolve_bare(
        &self,
        importer_dir: &Path,
        specifier: &str,
        tried: &mut Vec<PathBuf>,
    ) -> ResolveResult<Option<PathBuf>> {
        let (package, subpath) = split_package(specifier);

        for dir in importer_dir.ancestors() {
            for modules in &self.modules {
                let package_dir = dir.join(modules).join(package);
                if !package_dir.is_dir() {
                    tried.push(package_dir);
                    continue;
                }
                return match subpath {
                    Some(sub) => Ok(self.resolve_path(&package_dir.join(sub).clean(), tried)),
                    None => self.resolve_package(&package_dir, tried),
                };
            }
        }
        Ok(None)
    }

    fn resolve_package(
        &self,
        package_dir: &Path,
        tried: &mut Vec<PathBuf>,
    ) -> ResolveResult<Option<PathBuf>> {
        let manifest = package_dir.join("package.json");
        if let Ok(content) = fs::read_to_string(&manifest) {
            let parsed: serde_json::Value =
                serde_json::from_str(&content).map_err(|e| ResolutionError::InvalidPackage {
                    path: manifest.clone(),
                    message: e.to_string(),
                })?;
            for field in &self.main_fields {
                if let Some(main) = parsed.get(field).and_then(|v| v.as_str()) {
                    if let Some(found) = self.resolve_path(&package_dir.join(main).clean(), tried)
                    {
                        return Ok(Some(found));
                    }
                }
            }
        }
        Ok(self.resolve_index(package_dir, tried))
    }

    /// Literal file, then `base + ext`, then an index file inside `base`.
    fn resolve_path(&self, base: &Path, tried: &mut Vec<PathBuf>) -> Option<PathBuf> {
        if base.is_file() {
            return Some(base.to_path_buf());
        }
        tried.push(base.to_path_buf());

        for ext in &self.extensions {
            let candidate = with_suffix(base, ext);
            if candidate.is_file() {
                return Some(candidate);
            }
            tried.push(candidate);
        }

        if base.is_dir() {
            return self.resolve_index(base, tried);
        }
        None
    }

    fn resolve_index(&self, dir: &Path, tried: &mut Vec<PathBuf>) -> Option<PathBuf> {
        for stem in &self.main_files {
            for ext in &self.extensions {
                let candidate = dir.join(format!("{stem}{ext}"));
                if candidate.is_file() {
                    return Some(candidate);
                }
                tried.push(candidate);
            }
        }
        None
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../")
}

/// `key` matches `specifier` exactly or as a path prefix. A trailing `$`
/// restricts the key to exact matches.
fn alias_matches(key: &str, specifier: &str) -> bool {
    match key.strip_suffix('$') {
        Some(exact) => specifier == exact,
        None => {
            specifier == key
                || specifier
                    .strip_prefix(key)
                    .is_some_and(|rest| rest.starts_with('/'))
        }
    }
}

/// Split `@scope/pkg/sub/path` into (`@scope/pkg`, `sub/path`).
fn split_package(specifier: &str) -> (&str, Option<&str>) {
    let split_at = if specifier.starts_with('@') {
        specifier
            .match_indices('/')
            .nth(1)
            .map(|(i, _)| i)
    } else {
        specifier.find('/')
    };
    match split_at {
        Some(i) => (&specifier[..i], Some(&specifier[i + 1..])),
        None => (specifier, None),
    }
}

fn with_suffix(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(ext);
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn resolver(root: &Path, options: ResolveOptions) -> Resolver {
        Resolver::new(root, &options).unwrap()
    }

    fn rel(root: &Path, id: &ModuleId) -> String {
        let root = fs::canonicalize(root).unwrap();
        id.relative_to(&root)
    }

    #[test]
    fn literal_wins_over_extensions() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/util", "");
        touch(dir.path(), "src/util.ts", "");
        let r = resolver(dir.path(), ResolveOptions::default());

        let id = r.resolve(&dir.path().join("src"), "./util").unwrap();
        assert_eq!(rel(dir.path(), &id), "src/util");
    }

    #[test]
    fn extensions_follow_priority_order() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/a.js", "");
        touch(dir.path(), "src/a.tsx", "");
        let r = resolver(dir.path(), ResolveOptions::default());

        let id = r.resolve(&dir.path().join("src"), "./a").unwrap();
        assert_eq!(rel(dir.path(), &id), "src/a.tsx");
    }

    #[test]
    fn directory_resolves_to_index() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/components/index.jsx", "");
        let r = resolver(dir.path(), ResolveOptions::default());

        let id = r.resolve(&dir.path().join("src"), "./components").unwrap();
        assert_eq!(rel(dir.path(), &id), "src/components/index.jsx");
    }

    #[test]
    fn dotted_names_append_extension() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/api.service.ts", "");
        let r = resolver(dir.path(), ResolveOptions::default());

        let id = r.resolve(&dir.path().join("src"), "./api.service").unwrap();
        assert_eq!(rel(dir.path(), &id), "src/api.service.ts");
    }

    #[test]
    fn bare_specifier_searches_upward_and_reads_main() {
        let dir = TempDir::new().unwrap();
        touch(
            dir.path(),
            "node_modules/react/package.json",
            r#"{ "main": "cjs/react.js" }"#,
        );
        touch(dir.path(), "node_modules/react/cjs/react.js", "");
        touch(dir.path(), "node_modules/@scope/ui/button.js", "");
        let r = resolver(dir.path(), ResolveOptions::default());
        let deep = dir.path().join("src/app/pages");

        let react = r.resolve(&deep, "react").unwrap();
        assert_eq!(rel(dir.path(), &react), "node_modules/react/cjs/react.js");

        let button = r.resolve(&deep, "@scope/ui/button").unwrap();
        assert_eq!(rel(dir.path(), &button), "node_modules/@scope/ui/button.js");
    }

    #[test]
    fn module_field_preferred_over_main() {
        let dir = TempDir::new().unwrap();
        touch(
            dir.path(),
            "node_modules/lib/package.json",
            r#"{ "main": "lib.cjs.js", "module": "lib.esm.js" }"#,
        );
        touch(dir.path(), "node_modules/lib/lib.cjs.js", "");
        touch(dir.path(), "node_modules/lib/lib.esm.js", "");
        let r = resolver(dir.path(), ResolveOptions::default());

        let id = r.resolve(dir.path(), "lib").unwrap();
        assert_eq!(rel(dir.path(), &id), "node_modules/lib/lib.esm.js");
    }

    #[test]
    fn alias_rewrites_prefix() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "frontend/components/Button.tsx", "");
        let mut options = ResolveOptions::default();
        options.alias.insert("@components".into(), "./frontend/components".into());
        let r = resolver(dir.path(), options);

        let id = r.resolve(&dir.path().join("elsewhere"), "@components/Button").unwrap();
        assert_eq!(rel(dir.path(), &id), "frontend/components/Button.tsx");
        assert!(r.resolve(dir.path(), "@componentsX").is_err());
    }

    #[test]
    fn alias_cycle_is_detected() {
        let dir = TempDir::new().unwrap();
        let mut options = ResolveOptions::default();
        options.alias = IndexMap::from([
            ("a".to_string(), "b".to_string()),
            ("b".to_string(), "a".to_string()),
        ]);
        let r = resolver(dir.path(), options);

        match r.resolve(dir.path(), "a/x") {
            Err(ResolutionError::AliasCycle { chain, .. }) => {
                assert_eq!(chain, vec!["a/x", "b/x", "a/x"]);
            }
            other => panic!("expected alias cycle, got {other:?}"),
        }
    }

    #[test]
    fn paths_wildcard_tries_targets_in_order() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "shared/utils/date.ts", "");
        let mut options = ResolveOptions::default();
        options.paths.insert(
            "~/*".into(),
            vec!["frontend/*".into(), "shared/*".into()],
        );
        let r = resolver(dir.path(), options);

        let id = r.resolve(dir.path(), "~/utils/date").unwrap();
        assert_eq!(rel(dir.path(), &id), "shared/utils/date.ts");
    }

    #[test]
    fn not_found_lists_tried_paths() {
        let dir = TempDir::new().unwrap();
        let r = resolver(dir.path(), ResolveOptions::default());
        match r.resolve(dir.path(), "./missing") {
            Err(ResolutionError::NotFound { tried, specifier, .. }) => {
                assert_eq!(specifier, "./missing");
                assert_eq!(tried.len(), 6);
                assert!(tried[1].ends_with("missing.ts"));
            }
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_extensions_are_ambiguous() {
        let dir = TempDir::new().unwrap();
        let mut options = ResolveOptions::default();
        options.extensions.push(".js".into());
        assert!(matches!(
            Resolver::new(dir.path(), &options),
            Err(ResolutionError::AmbiguousExtension { .. })
        ));
    }

    #[test]
    fn tsconfig_paths_apply_without_config_paths() {
        let dir = TempDir::new().unwrap();
        touch(
            dir.path(),
            "tsconfig.base.json",
            r#"{
                // shared across packages
                "compilerOptions": {
                    "baseUrl": "./frontend",
                    "paths": { "@components/*": ["components/*"], },
                },
            }"#,
        );
        touch(dir.path(), "tsconfig.json", r#"{ "extends": "./tsconfig.base.json" }"#);
        touch(dir.path(), "frontend/components/Button.tsx", "");
        let r = resolver(dir.path(), ResolveOptions::default());

        let id = r
            .resolve(&dir.path().join("frontend/pages"), "@components/Button")
            .unwrap();
        assert_eq!(rel(dir.path(), &id), "frontend/components/Button.tsx");
    }

    #[test]
    fn config_paths_take_precedence_over_tsconfig() {
        let dir = TempDir::new().unwrap();
        touch(
            dir.path(),
            "tsconfig.json",
            r#"{ "compilerOptions": { "paths": { "@x": ["./from-ts"] } } }"#,
        );
        touch(dir.path(), "from-ts.ts", "");
        touch(dir.path(), "from-config.ts", "");
        let mut options = ResolveOptions::default();
        options
            .paths
            .insert("@x".into(), vec!["./from-config".into()]);
        let r = resolver(dir.path(), options);

        let id = r.resolve(dir.path(), "@x").unwrap();
        assert_eq!(rel(dir.path(), &id), "from-config.ts");
    }

    #[test]
    fn explicit_tsconfig_must_exist() {
        let dir = TempDir::new().unwrap();
        let options = ResolveOptions {
            tsconfig: Some(PathBuf::from("tsconfig.app.json")),
            ..ResolveOptions::default()
        };
        assert!(matches!(
            Resolver::new(dir.path(), &options),
            Err(ResolutionError::InvalidTsConfig { .. })
        ));
    }

    #[test]
    fn split_package_handles_scopes() {
        assert_eq!(split_package("react"), ("react", None));
        assert_eq!(split_package("react/jsx-runtime"), ("react", Some("jsx-runtime")));
        assert_eq!(split_package("@a/b"), ("@a/b", None));
        assert_eq!(split_package("@a/b/c/d"), ("@a/b", Some("c/d")));
    }
}
