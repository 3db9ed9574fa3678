use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use path_clean::PathClean;
use path_slash::PathExt;
use relative_path::RelativePathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Base path is not absolute: {0}")]
    BasePathNotAbsolute(PathBuf),
    #[error("Path {child} is not below outbase {outbase}")]
    OutsideOutbase { child: PathBuf, outbase: PathBuf },
}

/// Joins `path` onto the absolute `base` and normalizes away `.`/`..`
/// segments without touching the filesystem.
pub fn join_abspath(base: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf, Error> {
    let base = base.as_ref();
    let path = path.as_ref();
    if !base.is_absolute() {
        return Err(Error::BasePathNotAbsolute(base.to_path_buf()));
    }

    let absolute_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
    .clean();

    Ok(absolute_path)
}

pub fn as_relative_slash_path<P: AsRef<Path>>(p: P) -> Result<RelativePathBuf> {
    let pref = p.as_ref();
    let rel: RelativePathBuf = RelativePathBuf::from_path(pref).with_context(|| {
        format!(
            "failed to convert path to relative-path: \"{}\"",
            pref.to_string_lossy()
        )
    })?;
    Ok(rel)
}

/// Forward-slashed rendering of a path, for output and metafile keys.
pub fn to_slash_string(p: impl AsRef<Path>) -> String {
    p.as_ref().to_slash_lossy().to_string()
}

/// Computes the output location for an input file: the input's path relative
/// to `outbase`, re-rooted under `outdir`.
pub fn rebase_output_path(
    input: &Path,
    outbase: &Path,
    outdir: &Path,
) -> Result<PathBuf, Error> {
    let relative = match pathdiff::diff_paths(input, outbase) {
        Some(rel) if !rel.starts_with("..") => rel,
        _ => {
            return Err(Error::OutsideOutbase {
                child: input.to_path_buf(),
                outbase: outbase.to_path_buf(),
            })
        }
    };
    Ok(outdir.join(relative).clean())
}

/// Applies an `--out-extension:` style mapping (`.js` -> `.mjs`) to the
/// file name of `path`. Unmapped extensions pass through.
pub fn swap_out_extension(path: &Path, mapping: &[(String, String)]) -> PathBuf {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return path.to_path_buf();
    };
    for (from, to) in mapping {
        if let Some(stem) = name.strip_suffix(from.as_str()) {
            return path.with_file_name(format!("{}{}", stem, to));
        }
    }
    path.to_path_buf()
}

/// Longest common ancestor directory of a set of absolute paths. This is
/// the default `outbase` when none is configured.
pub fn common_ancestor<'a>(paths: impl Iterator<Item = &'a Path>) -> Option<PathBuf> {
    let mut ancestor: Option<PathBuf> = None;
    for path in paths {
        let dir = path.parent()?;
        ancestor = Some(match ancestor {
            None => dir.to_path_buf(),
            Some(prev) => {
                let mut common = PathBuf::new();
                for (a, b) in prev.components().zip(dir.components()) {
                    if a != b {
                        break;
                    }
                    common.push(a);
                }
                common
            }
        });
    }
    ancestor
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn join_abspath_cleans_dotdots() {
        assert_eq!(
            join_abspath("/repo/src", "../lib/util.ts").unwrap(),
            PathBuf::from("/repo/lib/util.ts")
        );
    }

    #[test]
    fn join_abspath_rejects_relative_base() {
        assert!(join_abspath("repo/src", "./x.ts").is_err());
    }

    #[test]
    fn rebase_under_outdir() {
        assert_eq!(
            rebase_output_path(
                Path::new("/repo/src/pages/home.ts"),
                Path::new("/repo/src"),
                Path::new("/repo/dist"),
            )
            .unwrap(),
            PathBuf::from("/repo/dist/pages/home.ts")
        );
    }

    #[test]
    fn out_extension_swap() {
        let mapping = vec![(".js".to_string(), ".mjs".to_string())];
        assert_eq!(
            swap_out_extension(Path::new("/dist/app.js"), &mapping),
            PathBuf::from("/dist/app.mjs")
        );
        assert_eq!(
            swap_out_extension(Path::new("/dist/app.css"), &mapping),
            PathBuf::from("/dist/app.css")
        );
    }

    #[test]
    fn common_ancestor_of_entries() {
        let a = PathBuf::from("/repo/src/a/entry.ts");
        let b = PathBuf::from("/repo/src/b/entry.ts");
        assert_eq!(
            common_ancestor([a.as_path(), b.as_path()].into_iter()),
            Some(PathBuf::from("/repo/src"))
        );
    }
}
