use std::path::{Path, PathBuf};

use amd_config::{split_plugin_expr, AmdConfigJson};
use dashmap::DashMap;
use path_clean::PathClean;
use path_slash::PathExt;
use tsconfig_paths::TsconfigPathsJson;

use crate::resolver::{Resolution, Resolve, ResolveError, DATA_URL_NAMESPACE};

pub const DEFAULT_EXTENSIONS: &[&str] = &[".tsx", ".ts", ".jsx", ".js", ".json"];

#[derive(Debug, Default, Clone)]
pub struct FsResolverOptions {
    /// Probe order for extension-less imports (`--resolve-extensions=`).
    /// Empty means [`DEFAULT_EXTENSIONS`].
    pub extensions: Vec<String>,
    /// `--external:` patterns. A trailing `/*` makes a pattern match every
    /// subpath of the package.
    pub externals: Vec<String>,
    pub tsconfig: Option<(PathBuf, TsconfigPathsJson)>,
    pub amd: Option<(PathBuf, AmdConfigJson)>,
}

/// Filesystem resolver.
///
/// Policy, in order: `data:` URLs keep their own namespace; `--external:`
/// patterns win over everything; relative and absolute specifiers probe
/// the filesystem; bare specifiers go through tsconfig paths, then AMD
/// paths/map, and fall back to external (a bare import nothing maps is a
/// package the host must provide).
pub struct FsResolver {
    extensions: Vec<String>,
    externals: Vec<String>,
    tsconfig: Option<(PathBuf, TsconfigPathsJson)>,
    amd: Option<(PathBuf, AmdConfigJson)>,
    // stat() results, shared across the build
    file_cache: DashMap<PathBuf, bool>,
}

impl FsResolver {
    pub fn new(options: FsResolverOptions) -> Self {
        let extensions = if options.extensions.is_empty() {
            DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
        } else {
            options.extensions
        };
        Self {
            extensions,
            externals: options.externals,
            tsconfig: options.tsconfig,
            amd: options.amd,
            file_cache: DashMap::new(),
        }
    }

    fn is_file(&self, path: &Path) -> bool {
        if let Some(hit) = self.file_cache.get(path) {
            return *hit;
        }
        let result = path.is_file();
        self.file_cache.insert(path.to_path_buf(), result);
        result
    }

    fn is_external(&self, specifier: &str) -> bool {
        self.externals.iter().any(|pattern| {
            if let Some(prefix) = pattern.strip_suffix("/*") {
                specifier == prefix || specifier.starts_with(&format!("{}/", prefix))
            } else {
                specifier == pattern
            }
        })
    }

    /// Probes `candidate` the way an extension-less import is looked up:
    /// as-is, with each configured extension, then as a directory with an
    /// `index` file.
    fn probe(&self, candidate: &Path) -> Option<PathBuf> {
        let candidate = candidate.to_path_buf().clean();
        if self.is_file(&candidate) {
            return Some(candidate);
        }
        let as_str = candidate.to_slash_lossy().to_string();
        for ext in &self.extensions {
            let with_ext = PathBuf::from(format!("{}{}", as_str, ext));
            if self.is_file(&with_ext) {
                return Some(with_ext);
            }
        }
        for ext in &self.extensions {
            let index = candidate.join(format!("index{}", ext));
            if self.is_file(&index) {
                return Some(index);
            }
        }
        None
    }

    fn resolve_bare(&self, specifier: &str, importer: &Path) -> Option<PathBuf> {
        if let Some((base, tsconfig)) = &self.tsconfig {
            if let Some(targets) = tsconfig.map_specifier(specifier) {
                let base_url = tsconfig
                    .compiler_options
                    .base_url
                    .clone()
                    .unwrap_or_else(|| ".".to_string());
                for target in targets {
                    let candidate = base.join(&base_url).join(target);
                    if let Some(found) = self.probe(&candidate) {
                        return Some(found);
                    }
                }
            }
        }

        if let Some((base, amd)) = &self.amd {
            let importer_id = amd_module_id(base, importer);
            let mapped = amd.apply_map(&importer_id, specifier);
            let target = amd.apply_paths(&mapped).unwrap_or(mapped);
            let base_url = amd.base_url.clone().unwrap_or_else(|| ".".to_string());
            let candidate = base.join(base_url).join(target);
            if let Some(found) = self.probe(&candidate) {
                return Some(found);
            }
        }

        None
    }
}

/// AMD module id of a file: its slashed path relative to the config base,
/// without the extension.
fn amd_module_id(base: &Path, file: &Path) -> String {
    let relative = file
        .strip_prefix(base)
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|_| file.to_path_buf());
    let slashed = relative.to_slash_lossy().to_string();
    match slashed.rfind('.') {
        Some(dot) if !slashed[dot..].contains('/') => slashed[..dot].to_string(),
        _ => slashed,
    }
}

impl Resolve for FsResolver {
    fn resolve(
        &self,
        specifier: &str,
        importer: &Path,
        resolve_dir: &Path,
    ) -> Result<Resolution, ResolveError> {
        tracing::debug!("resolve {:?} from {}", specifier, importer.display());

        if specifier.starts_with("data:") {
            return Ok(Resolution::Path {
                path: PathBuf::from(specifier),
                namespace: DATA_URL_NAMESPACE.to_string(),
            });
        }

        if self.is_external(specifier) {
            return Ok(Resolution::External {
                specifier: specifier.to_string(),
            });
        }

        // AMD plugin expressions: resolve the resource, not the raw id
        if let Some(expr) = split_plugin_expr(specifier) {
            if let Some((base, amd)) = &self.amd {
                let resource = amd.plugin_resource_path(&expr).ok_or_else(|| {
                    ResolveError::UnknownAmdPlugin {
                        specifier: specifier.to_string(),
                        plugin: expr.plugin.to_string(),
                    }
                })?;
                let base_url = amd.base_url.clone().unwrap_or_else(|| ".".to_string());
                let candidate = base.join(base_url).join(resource);
                if let Some(found) = self.probe(&candidate) {
                    return Ok(Resolution::file(found));
                }
            }
            return Err(ResolveError::NotFound {
                specifier: specifier.to_string(),
                importer: importer.to_path_buf(),
            });
        }

        let is_relative = specifier.starts_with("./") || specifier.starts_with("../");
        if is_relative || Path::new(specifier).is_absolute() {
            let candidate = if Path::new(specifier).is_absolute() {
                PathBuf::from(specifier)
            } else {
                resolve_dir.join(specifier)
            };
            return match self.probe(&candidate) {
                Some(found) => Ok(Resolution::file(found)),
                None => Err(ResolveError::NotFound {
                    specifier: specifier.to_string(),
                    importer: importer.to_path_buf(),
                }),
            };
        }

        if let Some(found) = self.resolve_bare(specifier, importer) {
            return Ok(Resolution::file(found));
        }

        // bare package import nothing maps: leave it to the host
        Ok(Resolution::External {
            specifier: specifier.to_string(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_tmpdir::test_tmpdir;

    fn resolver_for(options: FsResolverOptions) -> FsResolver {
        FsResolver::new(options)
    }

    #[test]
    fn relative_import_probes_extensions() {
        let tmp = test_tmpdir!(
            "src/entry.ts" => "",
            "src/util.ts" => ""
        );
        let resolver = resolver_for(Default::default());
        let entry = tmp.root_join("src/entry.ts");
        let resolved = resolver
            .resolve("./util", &entry, &tmp.root_join("src"))
            .unwrap();
        assert_eq!(resolved, Resolution::file(tmp.root_join("src/util.ts")));
    }

    #[test]
    fn directory_import_finds_index() {
        let tmp = test_tmpdir!(
            "src/entry.ts" => "",
            "src/lib/index.ts" => ""
        );
        let resolver = resolver_for(Default::default());
        let entry = tmp.root_join("src/entry.ts");
        let resolved = resolver
            .resolve("./lib", &entry, &tmp.root_join("src"))
            .unwrap();
        assert_eq!(resolved, Resolution::file(tmp.root_join("src/lib/index.ts")));
    }

    #[test]
    fn bare_import_is_external() {
        let tmp = test_tmpdir!("src/entry.ts" => "");
        let resolver = resolver_for(Default::default());
        let entry = tmp.root_join("src/entry.ts");
        assert_eq!(
            resolver.resolve("react", &entry, &tmp.root_join("src")).unwrap(),
            Resolution::External {
                specifier: "react".to_string()
            }
        );
    }

    #[test]
    fn external_pattern_matches_subpaths() {
        let tmp = test_tmpdir!("src/entry.ts" => "", "src/vendored.ts" => "");
        let resolver = resolver_for(FsResolverOptions {
            externals: vec!["lodash/*".to_string()],
            ..Default::default()
        });
        let entry = tmp.root_join("src/entry.ts");
        assert_eq!(
            resolver
                .resolve("lodash/merge", &entry, &tmp.root_join("src"))
                .unwrap(),
            Resolution::External {
                specifier: "lodash/merge".to_string()
            }
        );
    }

    #[test]
    fn missing_relative_import_errors() {
        let tmp = test_tmpdir!("src/entry.ts" => "");
        let resolver = resolver_for(Default::default());
        let entry = tmp.root_join("src/entry.ts");
        assert!(resolver
            .resolve("./nope", &entry, &tmp.root_join("src"))
            .is_err());
    }

    #[test]
    fn tsconfig_paths_map_bare_imports() {
        let tmp = test_tmpdir!(
            "src/entry.ts" => "",
            "src/core/api.ts" => ""
        );
        let tsconfig: TsconfigPathsJson = serde_json::from_str(
            r#"{"compilerOptions": {"baseUrl": ".", "paths": {"@core/*": ["src/core/*"]}}}"#,
        )
        .unwrap();
        let resolver = resolver_for(FsResolverOptions {
            tsconfig: Some((tmp.root().to_path_buf(), tsconfig)),
            ..Default::default()
        });
        let entry = tmp.root_join("src/entry.ts");
        assert_eq!(
            resolver
                .resolve("@core/api", &entry, &tmp.root_join("src"))
                .unwrap(),
            Resolution::file(tmp.root_join("src/core/api.ts"))
        );
    }

    #[test]
    fn data_url_gets_its_own_namespace() {
        let tmp = test_tmpdir!("src/entry.ts" => "");
        let resolver = resolver_for(Default::default());
        let entry = tmp.root_join("src/entry.ts");
        let resolved = resolver
            .resolve("data:text/javascript,export default 1", &entry, tmp.root())
            .unwrap();
        match resolved {
            Resolution::Path { namespace, .. } => assert_eq!(namespace, "data-url"),
            other => panic!("expected data-url resolution, got {:?}", other),
        }
    }
}
