//! AMD configuration file support (`--amdconfig=`).
//!
//! The file mirrors a RequireJS config: `paths` rewrite module-id prefixes,
//! `map` rewrites ids per importing scope, and `plugins` describe
//! `plugin!resource` expressions. Prefixes match on whole `/`-separated
//! segments, and the longest match wins.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum OpenAmdConfigError {
    #[error("Serde deserialization error: {0}")]
    SerdeError(serde_json::Error),
    #[error("Disk I/O Error: {0}")]
    IOError(std::io::Error),
}

#[derive(Debug, Deserialize, PartialEq, Eq, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AmdConfigJson {
    pub base_url: Option<String>,
    #[serde(default)]
    pub paths: HashMap<String, String>,
    /// scope -> { id prefix -> replacement }. The `"*"` scope applies to
    /// every importer.
    #[serde(default)]
    pub map: HashMap<String, HashMap<String, String>>,
    pub namespace: Option<String>,
    #[serde(default)]
    pub plugins: HashMap<String, AmdPluginConfig>,
}

#[derive(Debug, Deserialize, PartialEq, Eq, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AmdPluginConfig {
    #[serde(default)]
    pub file_extensions: Vec<String>,
    pub append_file_extension: Option<String>,
    pub load_script: Option<AmdLoadScript>,
}

#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AmdLoadScript {
    pub replacement_pattern: String,
    pub replacement_value: String,
}

/// A specifier of the form `plugin!resource`.
#[derive(Debug, PartialEq, Eq)]
pub struct PluginExpr<'a> {
    pub plugin: &'a str,
    pub resource: &'a str,
}

/// Splits a plugin expression at the first `!`. Specifiers without `!`
/// are ordinary module ids.
pub fn split_plugin_expr(specifier: &str) -> Option<PluginExpr<'_>> {
    let bang = specifier.find('!')?;
    Some(PluginExpr {
        plugin: &specifier[..bang],
        resource: &specifier[bang + 1..],
    })
}

/// True when `prefix` matches `id` on whole path segments.
fn segment_prefix_matches(id: &str, prefix: &str) -> bool {
    match id.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}

impl AmdConfigJson {
    pub fn from_path(config_path: impl AsRef<Path>) -> Result<Self, OpenAmdConfigError> {
        let file = File::open(config_path.as_ref()).map_err(OpenAmdConfigError::IOError)?;
        serde_json::from_reader(BufReader::new(file)).map_err(OpenAmdConfigError::SerdeError)
    }

    /// Applies `map` for an importer: the most specific matching scope is
    /// consulted first, falling back to `"*"`; within a scope the longest
    /// matching id prefix is replaced.
    pub fn apply_map<'a>(&self, importer_id: &str, specifier: &'a str) -> String {
        let mut scopes: Vec<(&String, &HashMap<String, String>)> = self
            .map
            .iter()
            .filter(|(scope, _)| {
                scope.as_str() == "*" || segment_prefix_matches(importer_id, scope)
            })
            .collect();
        // most specific scope first; "*" sorts last
        scopes.sort_by(|(a, _), (b, _)| match (a.as_str(), b.as_str()) {
            ("*", "*") => std::cmp::Ordering::Equal,
            ("*", _) => std::cmp::Ordering::Greater,
            (_, "*") => std::cmp::Ordering::Less,
            (a, b) => b.len().cmp(&a.len()),
        });

        for (_, replacements) in scopes {
            let mut best: Option<(&str, &str)> = None;
            for (prefix, replacement) in replacements {
                if !segment_prefix_matches(specifier, prefix) {
                    continue;
                }
                match best {
                    Some((prev, _)) if prev.len() >= prefix.len() => {}
                    _ => best = Some((prefix, replacement)),
                }
            }
            if let Some((prefix, replacement)) = best {
                return format!("{}{}", replacement, &specifier[prefix.len()..]);
            }
        }
        specifier.to_string()
    }

    /// Applies `paths`, replacing the longest matching id prefix. Returns
    /// `None` when no entry matches.
    pub fn apply_paths(&self, specifier: &str) -> Option<String> {
        let mut best: Option<(&str, &str)> = None;
        for (prefix, target) in &self.paths {
            if !segment_prefix_matches(specifier, prefix) {
                continue;
            }
            match best {
                Some((prev, _)) if prev.len() >= prefix.len() => {}
                _ => best = Some((prefix, target)),
            }
        }
        let (prefix, target) = best?;
        Some(format!("{}{}", target, &specifier[prefix.len()..]))
    }

    /// Rewrites the resource of a plugin expression per the plugin's
    /// configuration (extension appending).
    pub fn plugin_resource_path(&self, expr: &PluginExpr<'_>) -> Option<String> {
        let plugin = self.plugins.get(expr.plugin)?;
        let mut resource = expr.resource.to_string();
        if let Some(ext) = &plugin.append_file_extension {
            if !plugin
                .file_extensions
                .iter()
                .any(|known| resource.ends_with(known.as_str()))
            {
                resource.push_str(ext);
            }
        }
        Some(resource)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(json: &str) -> AmdConfigJson {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn paths_longest_prefix_wins_on_segments() {
        let cfg = parse(
            r#"{"paths": {"ui": "vendor/ui", "ui/grid": "vendor/grid-v2"}}"#,
        );
        assert_eq!(
            cfg.apply_paths("ui/grid/row"),
            Some("vendor/grid-v2/row".to_string())
        );
        assert_eq!(cfg.apply_paths("ui/button"), Some("vendor/ui/button".to_string()));
        // "uikit" must not match the "ui" prefix
        assert_eq!(cfg.apply_paths("uikit"), None);
    }

    #[test]
    fn star_scope_applies_universally() {
        let cfg = parse(r#"{"map": {"*": {"legacy": "modern"}}}"#);
        assert_eq!(cfg.apply_map("any/module", "legacy/api"), "modern/api");
    }

    #[test]
    fn scoped_map_beats_star_scope() {
        let cfg = parse(
            r#"{"map": {
                "*": {"dep": "dep-v2"},
                "old/app": {"dep": "dep-v1"}
            }}"#,
        );
        assert_eq!(cfg.apply_map("old/app/main", "dep/util"), "dep-v1/util");
        assert_eq!(cfg.apply_map("new/app/main", "dep/util"), "dep-v2/util");
    }

    #[test]
    fn plugin_expression_splits_at_first_bang() {
        let expr = split_plugin_expr("text!templates/row.html!strip").unwrap();
        assert_eq!(expr.plugin, "text");
        assert_eq!(expr.resource, "templates/row.html!strip");
        assert_eq!(split_plugin_expr("plain/module"), None);
    }

    #[test]
    fn plugin_appends_configured_extension() {
        let cfg = parse(
            r#"{"plugins": {"text": {"fileExtensions": [".html"], "appendFileExtension": ".html"}}}"#,
        );
        let expr = split_plugin_expr("text!templates/row").unwrap();
        assert_eq!(
            cfg.plugin_resource_path(&expr),
            Some("templates/row.html".to_string())
        );
        let already = split_plugin_expr("text!templates/row.html").unwrap();
        assert_eq!(
            cfg.plugin_resource_path(&already),
            Some("templates/row.html".to_string())
        );
    }
}
