//! Build options: the user-facing JSON proxy, the internal options
//! struct, and the pre-flight validation that rejects invalid flag
//! combinations before any file work starts.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use chunk_emit::OutputFormat;
use schemars::JsonSchema;
use serde::Deserialize;
use swc_utils_parse::LoaderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    #[default]
    Browser,
    Node,
    Neutral,
}

impl FromStr for Platform {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "browser" => Ok(Platform::Browser),
            "node" => Ok(Platform::Node),
            "neutral" => Ok(Platform::Neutral),
            other => Err(format!("invalid platform: {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceMapMode {
    #[default]
    None,
    Inline,
    External,
    Both,
}

impl FromStr for SourceMapMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inline" => Ok(SourceMapMode::Inline),
            "external" => Ok(SourceMapMode::External),
            "both" => Ok(SourceMapMode::Both),
            other => Err(format!("invalid sourcemap mode: {:?}", other)),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Cannot use both \"outfile\" and \"outdir\"")]
    OutfileAndOutdir,
    #[error("Cannot use \"outfile\" with more than one entry point")]
    OutfileWithManyEntries,
    #[error("Splitting is only supported with the \"esm\" format")]
    SplittingRequiresEsm,
    #[error("An external source map requires \"outfile\" or \"outdir\"")]
    SourceMapRequiresOutput,
    #[error("\"globalName\" is only supported with the \"iife\" and \"umd\" formats")]
    GlobalNameFormat,
    #[error("At least one entry point is required")]
    NoEntryPoints,
    #[error("Invalid define: {0}")]
    InvalidDefine(String),
    #[error("Invalid loader mapping: {0}")]
    InvalidLoader(String),
    #[error("{0}")]
    Invalid(String),
}

/// Internal, validated build options. CLI flags and the JSON config both
/// funnel into this.
#[derive(Debug, Clone)]
pub struct BundleOptions {
    pub entries: Vec<PathBuf>,
    pub bundle: bool,
    pub splitting: bool,
    pub format: OutputFormat,
    pub platform: Platform,
    /// Accepted and threaded to the lowering boundary; the linker itself
    /// is target-agnostic.
    pub target: Option<String>,
    pub sourcemap: SourceMapMode,
    pub minify_syntax: bool,
    pub minify_whitespace: bool,
    pub minify_identifiers: bool,
    pub externals: Vec<String>,
    pub defines: Vec<(String, String)>,
    pub pure_fns: Vec<String>,
    /// extension (with dot) -> loader kind
    pub loader_overrides: HashMap<String, LoaderKind>,
    /// output extension mapping (`.js` -> `.mjs`)
    pub out_extension: Vec<(String, String)>,
    pub outfile: Option<PathBuf>,
    pub outdir: Option<PathBuf>,
    pub outbase: Option<PathBuf>,
    pub metafile: Option<PathBuf>,
    pub tsconfig: Option<PathBuf>,
    pub amdconfig: Option<PathBuf>,
    pub jsx_factory: Option<String>,
    pub jsx_fragment: Option<String>,
    pub global_name: Option<String>,
    pub main_fields: Vec<String>,
    pub resolve_extensions: Vec<String>,
    pub banner: Option<String>,
    pub footer: Option<String>,
    pub inject: Vec<PathBuf>,
    pub public_path: String,
    pub keep_names: bool,
    pub avoid_tdz: bool,
    pub error_limit: usize,
    /// Write outputs to disk; when false they are only returned.
    pub write: bool,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            bundle: true,
            splitting: false,
            format: OutputFormat::Iife,
            platform: Platform::default(),
            target: None,
            sourcemap: SourceMapMode::None,
            minify_syntax: false,
            minify_whitespace: false,
            minify_identifiers: false,
            externals: Vec::new(),
            defines: Vec::new(),
            pure_fns: Vec::new(),
            loader_overrides: HashMap::new(),
            out_extension: Vec::new(),
            outfile: None,
            outdir: None,
            outbase: None,
            metafile: None,
            tsconfig: None,
            amdconfig: None,
            jsx_factory: None,
            jsx_fragment: None,
            global_name: None,
            main_fields: Vec::new(),
            resolve_extensions: Vec::new(),
            banner: None,
            footer: None,
            inject: Vec::new(),
            public_path: String::new(),
            keep_names: false,
            avoid_tdz: false,
            error_limit: 10,
            write: true,
        }
    }
}

impl BundleOptions {
    /// Checks flag combinations before any file work (config errors in
    /// the error taxonomy).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entries.is_empty() {
            return Err(ConfigError::NoEntryPoints);
        }
        if self.outfile.is_some() && self.outdir.is_some() {
            return Err(ConfigError::OutfileAndOutdir);
        }
        if self.outfile.is_some() && self.entries.len() > 1 {
            return Err(ConfigError::OutfileWithManyEntries);
        }
        if self.splitting && self.format != OutputFormat::Esm {
            return Err(ConfigError::SplittingRequiresEsm);
        }
        if matches!(self.sourcemap, SourceMapMode::External | SourceMapMode::Both)
            && self.write
            && self.outfile.is_none()
            && self.outdir.is_none()
        {
            return Err(ConfigError::SourceMapRequiresOutput);
        }
        if self.global_name.is_some()
            && !matches!(self.format, OutputFormat::Iife | OutputFormat::Umd)
        {
            return Err(ConfigError::GlobalNameFormat);
        }
        Ok(())
    }
}

/// JSON configuration proxy, deserialized from a config file or the API
/// bridge, then converted (with validation) to [`BundleOptions`].
#[derive(Debug, Default, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BundleJSONConfig {
    pub entry_points: Vec<String>,
    #[serde(default)]
    pub bundle: Option<bool>,
    #[serde(default)]
    pub splitting: bool,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub sourcemap: Option<String>,
    #[serde(default)]
    pub minify: bool,
    #[serde(default)]
    pub minify_syntax: bool,
    #[serde(default)]
    pub minify_whitespace: bool,
    #[serde(default)]
    pub minify_identifiers: bool,
    #[serde(default)]
    pub external: Vec<String>,
    /// `{"process.env.NODE_ENV": "\"production\""}`
    #[serde(default)]
    pub define: HashMap<String, String>,
    #[serde(default)]
    pub pure: Vec<String>,
    /// `{".svg": "file"}`
    #[serde(default)]
    pub loader: HashMap<String, String>,
    #[serde(default)]
    pub out_extension: HashMap<String, String>,
    #[serde(default)]
    pub outfile: Option<String>,
    #[serde(default)]
    pub outdir: Option<String>,
    #[serde(default)]
    pub outbase: Option<String>,
    #[serde(default)]
    pub metafile: Option<String>,
    #[serde(default)]
    pub tsconfig: Option<String>,
    #[serde(default)]
    pub amdconfig: Option<String>,
    #[serde(default)]
    pub jsx_factory: Option<String>,
    #[serde(default)]
    pub jsx_fragment: Option<String>,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub main_fields: Vec<String>,
    #[serde(default)]
    pub resolve_extensions: Vec<String>,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default)]
    pub footer: Option<String>,
    #[serde(default)]
    pub inject: Vec<String>,
    #[serde(default)]
    pub public_path: Option<String>,
    #[serde(default)]
    pub keep_names: bool,
    #[serde(default)]
    pub avoid_tdz: bool,
    #[serde(default)]
    pub error_limit: Option<usize>,
}

impl TryFrom<BundleJSONConfig> for BundleOptions {
    type Error = ConfigError;

    fn try_from(json: BundleJSONConfig) -> Result<Self, Self::Error> {
        let mut options = BundleOptions {
            entries: json.entry_points.iter().map(PathBuf::from).collect(),
            bundle: json.bundle.unwrap_or(true),
            splitting: json.splitting,
            target: json.target,
            minify_syntax: json.minify || json.minify_syntax,
            minify_whitespace: json.minify || json.minify_whitespace,
            minify_identifiers: json.minify || json.minify_identifiers,
            externals: json.external,
            defines: {
                let mut defines: Vec<(String, String)> = json.define.into_iter().collect();
                defines.sort();
                defines
            },
            pure_fns: json.pure,
            out_extension: {
                let mut mapping: Vec<(String, String)> = json.out_extension.into_iter().collect();
                mapping.sort();
                mapping
            },
            outfile: json.outfile.map(PathBuf::from),
            outdir: json.outdir.map(PathBuf::from),
            outbase: json.outbase.map(PathBuf::from),
            metafile: json.metafile.map(PathBuf::from),
            tsconfig: json.tsconfig.map(PathBuf::from),
            amdconfig: json.amdconfig.map(PathBuf::from),
            jsx_factory: json.jsx_factory,
            jsx_fragment: json.jsx_fragment,
            global_name: json.global_name,
            main_fields: json.main_fields,
            resolve_extensions: json.resolve_extensions,
            banner: json.banner,
            footer: json.footer,
            inject: json.inject.iter().map(PathBuf::from).collect(),
            public_path: json.public_path.unwrap_or_default(),
            keep_names: json.keep_names,
            avoid_tdz: json.avoid_tdz,
            error_limit: json.error_limit.unwrap_or(10),
            ..Default::default()
        };
        if let Some(format) = &json.format {
            options.format = format.parse().map_err(ConfigError::Invalid)?;
        }
        if let Some(platform) = &json.platform {
            options.platform = platform.parse().map_err(ConfigError::Invalid)?;
        }
        if let Some(mode) = &json.sourcemap {
            options.sourcemap = mode.parse().map_err(ConfigError::Invalid)?;
        }
        for (ext, loader) in json.loader {
            let kind: LoaderKind = loader
                .parse()
                .map_err(|e: String| ConfigError::InvalidLoader(e))?;
            options.loader_overrides.insert(ext, kind);
        }
        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base() -> BundleOptions {
        BundleOptions {
            entries: vec![PathBuf::from("/src/entry.ts")],
            ..Default::default()
        }
    }

    #[test]
    fn outfile_and_outdir_conflict() {
        let options = BundleOptions {
            outfile: Some(PathBuf::from("/dist/out.js")),
            outdir: Some(PathBuf::from("/dist")),
            ..base()
        };
        assert_eq!(options.validate(), Err(ConfigError::OutfileAndOutdir));
    }

    #[test]
    fn splitting_requires_esm() {
        let options = BundleOptions {
            splitting: true,
            format: OutputFormat::Iife,
            ..base()
        };
        assert_eq!(options.validate(), Err(ConfigError::SplittingRequiresEsm));
        let esm = BundleOptions {
            splitting: true,
            format: OutputFormat::Esm,
            write: false,
            ..base()
        };
        assert_eq!(esm.validate(), Ok(()));
    }

    #[test]
    fn external_sourcemap_needs_an_output_path() {
        let options = BundleOptions {
            sourcemap: SourceMapMode::External,
            ..base()
        };
        assert_eq!(options.validate(), Err(ConfigError::SourceMapRequiresOutput));
        let in_memory = BundleOptions {
            sourcemap: SourceMapMode::External,
            write: false,
            ..base()
        };
        assert_eq!(in_memory.validate(), Ok(()));
    }

    #[test]
    fn global_name_is_iife_umd_only() {
        let options = BundleOptions {
            global_name: Some("Lib".to_string()),
            format: OutputFormat::Esm,
            ..base()
        };
        assert_eq!(options.validate(), Err(ConfigError::GlobalNameFormat));
    }

    #[test]
    fn json_config_round_trips() {
        let json: BundleJSONConfig = serde_json::from_str(
            r#"{
                "entryPoints": ["src/app.ts"],
                "format": "esm",
                "minify": true,
                "loader": {".svg": "file"},
                "define": {"DEBUG": "false"}
            }"#,
        )
        .unwrap();
        let options = BundleOptions::try_from(json).unwrap();
        assert_eq!(options.format, OutputFormat::Esm);
        assert!(options.minify_identifiers && options.minify_whitespace);
        assert_eq!(
            options.loader_overrides.get(".svg"),
            Some(&LoaderKind::File)
        );
        assert_eq!(
            options.defines,
            vec![("DEBUG".to_string(), "false".to_string())]
        );
    }
}
