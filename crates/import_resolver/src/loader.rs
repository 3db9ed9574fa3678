use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use swc_utils_parse::LoaderKind;

use crate::resolver::DATA_URL_NAMESPACE;

/// One loaded source unit, before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    pub bytes: Vec<u8>,
    pub loader: LoaderKind,
}

/// Loader contract: `(resolved_path, namespace)` to source bytes plus the
/// loader kind that interprets them.
pub trait Load: Send + Sync {
    fn load(&self, path: &Path, namespace: &str) -> anyhow::Result<LoadedSource>;
}

impl<T: Load + ?Sized> Load for &T {
    fn load(&self, path: &Path, namespace: &str) -> anyhow::Result<LoadedSource> {
        (*self).load(path, namespace)
    }
}

/// Filesystem loader. Picks the loader kind from the file extension,
/// after `--loader:` overrides; decodes `data:` URLs inline.
#[derive(Debug, Default)]
pub struct FsLoader {
    /// extension (with dot, e.g. `.svg`) -> loader kind
    pub overrides: HashMap<String, LoaderKind>,
}

impl FsLoader {
    pub fn new(overrides: HashMap<String, LoaderKind>) -> Self {
        Self { overrides }
    }

    fn kind_for(&self, path: &Path) -> LoaderKind {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if let Some(kind) = self.overrides.get(&format!(".{}", ext)) {
            return *kind;
        }
        LoaderKind::from_extension(ext)
    }
}

impl Load for FsLoader {
    fn load(&self, path: &Path, namespace: &str) -> anyhow::Result<LoadedSource> {
        if namespace == DATA_URL_NAMESPACE {
            return load_data_url(&path.to_string_lossy());
        }

        let bytes = std::fs::read(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(LoadedSource {
            bytes,
            loader: self.kind_for(path),
        })
    }
}

/// Decodes a `data:[<mediatype>][;base64],<data>` URL into a source unit.
/// JavaScript media types parse as code; anything else is text.
fn load_data_url(url: &str) -> anyhow::Result<LoadedSource> {
    let rest = url
        .strip_prefix("data:")
        .context("data URL missing prefix")?;
    let (meta, data) = rest
        .split_once(',')
        .context("data URL missing \",\" separator")?;

    let is_base64 = meta.ends_with(";base64");
    let mediatype = meta.strip_suffix(";base64").unwrap_or(meta);

    let bytes = if is_base64 {
        data_encoding::BASE64
            .decode(data.as_bytes())
            .context("invalid base64 in data URL")?
    } else {
        percent_decode(data)
    };

    let loader = match mediatype {
        "text/javascript" | "application/javascript" => LoaderKind::Js,
        "application/json" => LoaderKind::Json,
        _ => LoaderKind::Text,
    };
    Ok(LoadedSource { bytes, loader })
}

fn percent_decode(data: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut bytes = data.bytes();
    while let Some(b) = bytes.next() {
        if b == b'%' {
            let hi = bytes.next();
            let lo = bytes.next();
            if let (Some(hi), Some(lo)) = (hi, lo) {
                let hex = [hi, lo];
                if let Ok(hex_str) = std::str::from_utf8(&hex) {
                    if let Ok(decoded) = u8::from_str_radix(hex_str, 16) {
                        out.push(decoded);
                        continue;
                    }
                }
            }
            out.push(b);
        } else {
            out.push(b);
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_tmpdir::test_tmpdir;

    #[test]
    fn picks_loader_from_extension() {
        let tmp = test_tmpdir!("a/data.json" => "{}");
        let loader = FsLoader::default();
        let loaded = loader.load(&tmp.root_join("a/data.json"), "file").unwrap();
        assert_eq!(loaded.loader, LoaderKind::Json);
    }

    #[test]
    fn loader_override_beats_extension() {
        let tmp = test_tmpdir!("a/data.json" => "{}");
        let loader = FsLoader::new(
            [(".json".to_string(), LoaderKind::Text)]
                .into_iter()
                .collect(),
        );
        let loaded = loader.load(&tmp.root_join("a/data.json"), "file").unwrap();
        assert_eq!(loaded.loader, LoaderKind::Text);
    }

    #[test]
    fn decodes_plain_data_url() {
        let loaded = load_data_url("data:text/javascript,export%20default%201").unwrap();
        assert_eq!(loaded.loader, LoaderKind::Js);
        assert_eq!(loaded.bytes, b"export default 1".to_vec());
    }

    #[test]
    fn decodes_base64_data_url() {
        let loaded = load_data_url("data:text/javascript;base64,ZXhwb3J0IGRlZmF1bHQgMQ==").unwrap();
        assert_eq!(loaded.bytes, b"export default 1".to_vec());
    }
}
