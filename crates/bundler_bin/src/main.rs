extern crate bundler;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use bundler::{analyse, build, transform, BundleOptions, SourceMapMode};
use clap::{Parser, Subcommand, ValueEnum};
use logger::{Logger, StdioLogger};

#[derive(Parser, Debug)]
#[command(name = "bundle", about = "JavaScript/TypeScript bundler", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bundle entry points and their transitive imports
    Build(BuildArgs),
    /// Transform one file without resolving its imports
    Transform(BuildArgs),
    /// Emit build metadata JSON without writing outputs
    Analyse(BuildArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Parser, Debug)]
struct BuildArgs {
    /// Entry point files
    #[arg(required = true)]
    entries: Vec<String>,

    #[arg(long, default_value_t = true)]
    bundle: bool,
    #[arg(long, default_value_t = false)]
    splitting: bool,
    #[arg(long, default_value = "iife")]
    format: String,
    #[arg(long, default_value = "browser")]
    platform: String,
    #[arg(long)]
    target: Option<String>,
    /// inline, external or both
    #[arg(long, num_args = 0..=1, default_missing_value = "external")]
    sourcemap: Option<String>,
    #[arg(long, default_value_t = false)]
    minify: bool,
    #[arg(long = "minify-syntax", default_value_t = false)]
    minify_syntax: bool,
    #[arg(long = "minify-whitespace", default_value_t = false)]
    minify_whitespace: bool,
    #[arg(long = "minify-identifiers", default_value_t = false)]
    minify_identifiers: bool,
    /// Mark a package or path as external (repeatable)
    #[arg(long = "external")]
    external: Vec<String>,
    /// k=v substitution applied before linking (repeatable)
    #[arg(long = "define")]
    define: Vec<String>,
    /// Call name with no side effects (repeatable)
    #[arg(long = "pure")]
    pure: Vec<String>,
    /// .ext=kind loader mapping (repeatable)
    #[arg(long = "loader")]
    loader: Vec<String>,
    /// .in=.out output extension mapping (repeatable)
    #[arg(long = "out-extension")]
    out_extension: Vec<String>,
    #[arg(long)]
    outfile: Option<String>,
    #[arg(long)]
    outdir: Option<String>,
    #[arg(long)]
    outbase: Option<String>,
    #[arg(long)]
    metafile: Option<String>,
    #[arg(long)]
    tsconfig: Option<String>,
    #[arg(long)]
    amdconfig: Option<String>,
    #[arg(long = "jsx-factory")]
    jsx_factory: Option<String>,
    #[arg(long = "jsx-fragment")]
    jsx_fragment: Option<String>,
    #[arg(long = "global-name")]
    global_name: Option<String>,
    #[arg(long = "main-fields", value_delimiter = ',')]
    main_fields: Vec<String>,
    #[arg(long = "resolve-extensions", value_delimiter = ',')]
    resolve_extensions: Vec<String>,
    #[arg(long)]
    banner: Option<String>,
    #[arg(long)]
    footer: Option<String>,
    /// Module loaded before the entry points (repeatable)
    #[arg(long = "inject")]
    inject: Vec<String>,
    #[arg(long = "public-path")]
    public_path: Option<String>,
    #[arg(long = "keep-names", default_value_t = false)]
    keep_names: bool,
    #[arg(long = "avoid-tdz", default_value_t = false)]
    avoid_tdz: bool,
    #[arg(long = "error-limit", default_value_t = 10)]
    error_limit: usize,
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    color: ColorMode,
    /// Print a table of written files and sizes
    #[arg(long, default_value_t = false)]
    summary: bool,
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

/// Accepts the `--flag:value` spelling for the repeatable flags
/// (`--define:k=v`, `--external:pkg`, ...), rewriting it to the
/// `--flag value` form before clap parses.
fn expand_colon_flags(args: impl Iterator<Item = String>) -> Vec<String> {
    const COLON_FLAGS: &[&str] = &[
        "--external",
        "--define",
        "--pure",
        "--loader",
        "--out-extension",
        "--inject",
    ];
    let mut out = Vec::new();
    for arg in args {
        let mut matched = false;
        for flag in COLON_FLAGS {
            if let Some(value) = arg.strip_prefix(&format!("{}:", flag)) {
                out.push(flag.to_string());
                out.push(value.to_string());
                matched = true;
                break;
            }
        }
        if !matched {
            // `--flag=value` with an inner `=` also works unmodified
            out.push(arg);
        }
    }
    out
}

fn split_pair(raw: &str, flag: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("{} expects key=value, got {:?}", flag, raw)),
    }
}

fn into_options(args: &BuildArgs) -> Result<BundleOptions, String> {
    let mut loader_overrides = HashMap::new();
    for raw in &args.loader {
        let (ext, kind) = split_pair(raw, "--loader")?;
        loader_overrides.insert(ext, kind.parse()?);
    }
    let mut defines = Vec::new();
    for raw in &args.define {
        defines.push(split_pair(raw, "--define")?);
    }
    let mut out_extension = Vec::new();
    for raw in &args.out_extension {
        out_extension.push(split_pair(raw, "--out-extension")?);
    }

    let cwd = std::env::current_dir().map_err(|e| e.to_string())?;
    let abs = |p: &String| -> PathBuf {
        let path = PathBuf::from(p);
        if path.is_absolute() {
            path
        } else {
            cwd.join(path)
        }
    };

    let options = BundleOptions {
        entries: args.entries.iter().map(&abs).collect(),
        bundle: args.bundle,
        splitting: args.splitting,
        format: args.format.parse()?,
        platform: args.platform.parse()?,
        target: args.target.clone(),
        sourcemap: match &args.sourcemap {
            Some(mode) => mode.parse()?,
            None => SourceMapMode::None,
        },
        minify_syntax: args.minify || args.minify_syntax,
        minify_whitespace: args.minify || args.minify_whitespace,
        minify_identifiers: args.minify || args.minify_identifiers,
        externals: args.external.clone(),
        defines,
        pure_fns: args.pure.clone(),
        loader_overrides,
        out_extension,
        outfile: args.outfile.as_ref().map(&abs),
        outdir: args.outdir.as_ref().map(&abs),
        outbase: args.outbase.as_ref().map(&abs),
        metafile: args.metafile.as_ref().map(&abs),
        tsconfig: args.tsconfig.as_ref().map(&abs),
        amdconfig: args.amdconfig.as_ref().map(&abs),
        jsx_factory: args.jsx_factory.clone(),
        jsx_fragment: args.jsx_fragment.clone(),
        global_name: args.global_name.clone(),
        main_fields: args.main_fields.clone(),
        resolve_extensions: args.resolve_extensions.clone(),
        banner: args.banner.clone(),
        footer: args.footer.clone(),
        inject: args.inject.iter().map(&abs).collect(),
        public_path: args.public_path.clone().unwrap_or_default(),
        keep_names: args.keep_names,
        avoid_tdz: args.avoid_tdz,
        error_limit: args.error_limit,
        write: true,
    };
    Ok(options)
}

fn use_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::env::var_os("NO_COLOR").is_none(),
    }
}

fn main() -> ExitCode {
    let args = expand_colon_flags(std::env::args());
    let cli = Cli::parse_from(args);

    let (command_args, run): (&BuildArgs, fn(&BundleOptions, &StdioLogger) -> bundler::BuildResult) =
        match &cli.command {
            Command::Build(args) => (args, |o, l| build(o, l)),
            Command::Transform(args) => (args, |o, l| transform(o, l)),
            Command::Analyse(args) => (args, |o, l| analyse(o, l)),
        };

    let logger = StdioLogger::new();
    if command_args.verbose {
        std::env::set_var("BUNDLE_LOG_DEBUG", "1");
    }

    let options = match into_options(command_args) {
        Ok(options) => options,
        Err(message) => {
            (&logger).error(message);
            return ExitCode::from(1);
        }
    };

    let result = run(&options, &logger);

    let color = use_color(command_args.color);
    if !result.diagnostics.is_empty() {
        eprintln!("{}", result.diagnostics.render_all(color));
    }
    if result.has_errors() {
        return ExitCode::from(1);
    }

    if let Some(metafile) = &result.metafile {
        if matches!(cli.command, Command::Analyse(_)) {
            println!("{}", metafile);
        }
    }
    if command_args.summary {
        eprintln!("{}", bundler::driver::summarize_outputs(&result.outputs));
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn colon_flags_expand() {
        let args = vec![
            "bundle".to_string(),
            "build".to_string(),
            "--define:DEBUG=false".to_string(),
            "--external:react".to_string(),
            "entry.ts".to_string(),
        ];
        assert_eq!(
            expand_colon_flags(args.into_iter()),
            vec![
                "bundle",
                "build",
                "--define",
                "DEBUG=false",
                "--external",
                "react",
                "entry.ts",
            ]
        );
    }

    #[test]
    fn pair_splitting_validates() {
        assert!(split_pair("k=v", "--define").is_ok());
        assert!(split_pair("novalue", "--define").is_err());
        assert!(split_pair("=v", "--define").is_err());
    }
}
