//! `tsconfig.json` path-mapping support for the resolver (`--tsconfig=`).
//!
//! Only `compilerOptions.baseUrl` and `compilerOptions.paths` matter to
//! module resolution; the rest of the file is ignored.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum OpenTsConfigError {
    #[error("Serde deserialization error: {0}")]
    SerdeError(serde_json::Error),
    #[error("Disk I/O Error: {0}")]
    IOError(std::io::Error),
}

#[derive(Debug, Deserialize, PartialEq, Eq, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TsconfigPathsJson {
    #[serde(default)]
    pub compiler_options: TsconfigPathsCompilerOptions,
}

#[derive(Debug, Deserialize, PartialEq, Eq, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TsconfigPathsCompilerOptions {
    pub base_url: Option<String>,
    #[serde(default)]
    pub paths: HashMap<String, Vec<String>>,
}

impl TsconfigPathsJson {
    pub fn from_path(tsconfig_path: impl AsRef<Path>) -> Result<Self, OpenTsConfigError> {
        let file = File::open(tsconfig_path.as_ref()).map_err(OpenTsConfigError::IOError)?;
        let buf_reader = BufReader::new(file);
        serde_json::from_reader(buf_reader).map_err(OpenTsConfigError::SerdeError)
    }

    /// Applies `compilerOptions.paths` to a specifier. Returns the mapped
    /// targets (relative to `baseUrl`) for the longest matching pattern.
    ///
    /// Patterns either match exactly, or carry a single trailing `*` that
    /// captures the specifier's suffix.
    pub fn map_specifier(&self, specifier: &str) -> Option<Vec<String>> {
        let paths = &self.compiler_options.paths;
        if let Some(targets) = paths.get(specifier) {
            return Some(targets.clone());
        }

        let mut best: Option<(&str, &Vec<String>)> = None;
        for (pattern, targets) in paths.iter() {
            let Some(prefix) = pattern.strip_suffix('*') else {
                continue;
            };
            if !specifier.starts_with(prefix) {
                continue;
            }
            match best {
                Some((prev, _)) if prev.len() >= prefix.len() => {}
                _ => best = Some((prefix, targets)),
            }
        }

        let (prefix, targets) = best?;
        let captured = &specifier[prefix.len()..];
        Some(
            targets
                .iter()
                .map(|target| target.replace('*', captured))
                .collect(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(pairs: &[(&str, &[&str])]) -> TsconfigPathsJson {
        TsconfigPathsJson {
            compiler_options: TsconfigPathsCompilerOptions {
                base_url: Some(".".to_string()),
                paths: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                    .collect(),
            },
        }
    }

    #[test]
    fn exact_match_wins() {
        let cfg = config(&[("app/core", &["src/core/index.ts"]), ("app/*", &["src/*"])]);
        assert_eq!(
            cfg.map_specifier("app/core"),
            Some(vec!["src/core/index.ts".to_string()])
        );
    }

    #[test]
    fn longest_star_prefix_wins() {
        let cfg = config(&[("app/*", &["src/*"]), ("app/deep/*", &["src/deep/impl/*"])]);
        assert_eq!(
            cfg.map_specifier("app/deep/widget"),
            Some(vec!["src/deep/impl/widget".to_string()])
        );
    }

    #[test]
    fn unmatched_specifier_passes_through() {
        let cfg = config(&[("app/*", &["src/*"])]);
        assert_eq!(cfg.map_specifier("lodash"), None);
    }
}
