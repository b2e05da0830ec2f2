//! rwix: link, bind and decompile installer packages.
//!
//! Usage:
//!   rwix build -o product.msi -b media=assets product.wixobj files.wixobj
//!   rwix link -o linked.wixobj product.wixobj files.wixobj
//!   rwix lib -o common.wixlib files.wixobj
//!   rwix decompile -o product.wixobj -x extracted product.msi
//!
//! Options come from `rwix.json` (or `-c FILE`); flags override it.

use clap::{Args, Parser as ClapParser, Subcommand};
use miette::{miette, IntoDiagnostic, WrapErr};
use rwix_backend::CompressionLevel;
use rwix_diagnostics::{Diagnostic, DiagnosticCollection};
use rwix_options::{BindPathSpec, ToolsetOptions};
use rwix_toolset::{Toolset, ToolsetError};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

#[derive(ClapParser, Debug)]
#[command(name = "rwix", version, about = "rwix - link, bind and decompile installer databases")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to an rwix.json configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Worker thread count.
    #[arg(short = 't', long, global = true)]
    threads: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable colored output.
    #[arg(long = "no-color", global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Link intermediates into one resolved intermediate.
    Link(LinkArgs),
    /// Link intermediates and bind them into an artifact.
    Build(BuildArgs),
    /// Combine intermediates into a library.
    Lib(LinkArgs),
    /// Reconstruct an intermediate from an artifact and extract its files.
    Decompile(DecompileArgs),
}

#[derive(Args, Debug)]
struct LinkArgs {
    /// Intermediate files.
    #[arg(value_name = "FILE")]
    inputs: Vec<PathBuf>,

    /// Output file.
    #[arg(short = 'o', long = "out")]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct BuildArgs {
    #[command(flatten)]
    link: LinkArgs,

    /// Output kind (msi, msm, ...); inferred from the output extension when omitted.
    #[arg(short = 'k', long = "kind")]
    kind: Option<String>,

    /// Bind path, `path` or `name=path`. May be repeated.
    #[arg(short = 'b', long = "bindpath", value_name = "BINDPATH")]
    bind_paths: Vec<String>,

    /// Compression level for containers that do not declare one.
    #[arg(long = "compression")]
    compression: Option<CompressionLevel>,
}

#[derive(Args, Debug)]
struct DecompileArgs {
    /// The artifact to decompile.
    #[arg(value_name = "ARTIFACT")]
    artifact: PathBuf,

    /// Where to write the reconstructed intermediate.
    #[arg(short = 'o', long = "out")]
    output: Option<PathBuf>,

    /// Directory extracted files are written under.
    #[arg(short = 'x', long = "extract")]
    extract: Option<PathBuf>,

    /// Input kind; inferred from the artifact extension when omitted.
    #[arg(short = 'k', long = "kind")]
    kind: Option<String>,
}

// ANSI color codes
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const GRAY: &str = "\x1b[90m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let use_color = !cli.no_color && std::io::stderr().is_terminal();

    match run(&cli, use_color) {
        Ok(code) => process::exit(code),
        Err(report) => {
            eprintln!("{:?}", report);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(cli: &Cli, use_color: bool) -> miette::Result<i32> {
    let start = Instant::now();
    let options = resolve_options(cli)?;
    if !matches!(cli.command, Command::Decompile(_)) && inputs(&options).is_empty() {
        return Err(miette!("no input files; pass intermediates or list them in rwix.json"));
    }
    let toolset = Toolset::new(&options)
        .into_diagnostic()
        .wrap_err("failed to set up the toolset")?;

    let outcome = match cli.command {
        Command::Link(_) => run_link(&toolset, &options),
        Command::Build(_) => run_build(&toolset, &options, use_color),
        Command::Lib(_) => run_lib(&toolset, &options),
        Command::Decompile(ref args) => run_decompile(&toolset, &options, args, use_color),
    };

    match outcome {
        Ok(()) => {
            if use_color {
                eprintln!("{}Completed in {:.2}s.{}", GRAY, start.elapsed().as_secs_f64(), RESET);
            }
            Ok(0)
        }
        Err(e) => match e.diagnostics() {
            Some(diagnostics) => {
                print_diagnostics(diagnostics, use_color);
                let count = diagnostics.error_count();
                let summary = format!("Found {} error{}.", count, if count == 1 { "" } else { "s" });
                if use_color {
                    eprintln!("\n{}{}{}", RED, summary, RESET);
                } else {
                    eprintln!("\n{}", summary);
                }
                Ok(2)
            }
            None => Err(e).into_diagnostic(),
        },
    }
}

/// File options first, then flags on top.
fn resolve_options(cli: &Cli) -> miette::Result<ToolsetOptions> {
    let file = match cli.config {
        Some(ref path) => Some(ToolsetOptions::load(path).into_diagnostic()?),
        None => {
            let cwd = std::env::current_dir().into_diagnostic()?;
            ToolsetOptions::discover(&cwd).into_diagnostic()?
        }
    };

    let mut flags = ToolsetOptions {
        threads: cli.threads,
        ..Default::default()
    };
    let (inputs, output) = match cli.command {
        Command::Link(ref a) | Command::Lib(ref a) => (&a.inputs, &a.output),
        Command::Build(ref a) => {
            flags.output_kind = a.kind.clone();
            flags.default_compression = a.compression;
            if !a.bind_paths.is_empty() {
                flags.bind_paths = Some(a.bind_paths.iter().cloned().map(BindPathSpec::Text).collect());
            }
            (&a.link.inputs, &a.link.output)
        }
        Command::Decompile(ref a) => {
            flags.output_kind = a.kind.clone();
            flags.extract_directory = a.extract.clone();
            flags.output = a.output.clone();
            // A configured output names the build artifact, not the document.
            let mut options = file.unwrap_or_default();
            options.output = None;
            return Ok(options.merge(flags));
        }
    };
    if !inputs.is_empty() {
        flags.intermediates = Some(inputs.clone());
    }
    flags.output = output.clone();

    // Inputs on the command line replace the configured ones.
    let mut options = file.unwrap_or_default();
    if flags.intermediates.is_some() {
        options.intermediates = None;
    }
    Ok(options.merge(flags))
}

fn inputs(options: &ToolsetOptions) -> &[PathBuf] {
    options.intermediates.as_deref().unwrap_or(&[])
}

fn output_or(options: &ToolsetOptions, default: &str) -> PathBuf {
    options.output.clone().unwrap_or_else(|| PathBuf::from(default))
}

fn run_link(toolset: &Toolset, options: &ToolsetOptions) -> Result<(), ToolsetError> {
    let intermediates = toolset.load_intermediates(inputs(options))?;
    let output = output_or(options, "linked.wixobj");
    let resolved = toolset.link(&intermediates)?;
    let id = file_stem(&output);
    resolved.to_intermediate(id).save(&output)?;
    println!("{} ({} rows)", output.display(), resolved.row_count());
    Ok(())
}

fn run_lib(toolset: &Toolset, options: &ToolsetOptions) -> Result<(), ToolsetError> {
    let intermediates = toolset.load_intermediates(inputs(options))?;
    let output = output_or(options, "library.wixlib");
    let library = toolset.emit_library(&intermediates, "", &output)?;
    println!("{} ({} sections)", output.display(), library.sections.len());
    Ok(())
}

fn run_build(toolset: &Toolset, options: &ToolsetOptions, use_color: bool) -> Result<(), ToolsetError> {
    let intermediates = toolset.load_intermediates(inputs(options))?;
    let output = output_or(options, "product.msi");
    let kind = options.output_kind.as_deref().unwrap_or("");
    let result = toolset.build(&intermediates, kind, &output)?;

    print_diagnostics(&result.diagnostics, use_color);
    println!("{}", result.artifact_path.display());
    for container in &result.containers {
        log::info!(
            "container {} ({} members, {}{})",
            container.name,
            container.members.len(),
            container.compression,
            if container.embedded { ", embedded" } else { "" }
        );
    }
    for cost in &result.disk_costs {
        println!("  {}: {} bytes ({} temporary)", cost.volume, cost.cost, cost.temp_cost);
    }
    Ok(())
}

fn run_decompile(
    toolset: &Toolset,
    options: &ToolsetOptions,
    args: &DecompileArgs,
    use_color: bool,
) -> Result<(), ToolsetError> {
    let artifact = &args.artifact;
    let stem = file_stem(artifact);
    let base = artifact.parent().unwrap_or_else(|| Path::new(""));
    let destination = options
        .extract_directory
        .clone()
        .unwrap_or_else(|| base.join(&stem));
    let output = options
        .output
        .clone()
        .unwrap_or_else(|| base.join(format!("{}.wixobj", stem)));
    let kind = options.output_kind.as_deref().unwrap_or("");

    let result = toolset.decompile(artifact, kind, &destination)?;
    print_diagnostics(&result.diagnostics, use_color);
    result.document.save(&output)?;
    println!(
        "{} ({} rows, {} files extracted to {})",
        output.display(),
        result.document.row_count(),
        result.extracted_files.len(),
        destination.display()
    );
    if result.platform.is_none() {
        log::info!("{} does not declare a platform", artifact.display());
    }
    match result.extraction_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn print_diagnostics(diagnostics: &DiagnosticCollection, use_color: bool) {
    for diag in diagnostics.iter() {
        print_diagnostic(diag, use_color);
        for related in &diag.related_information {
            print_diagnostic(related, use_color);
        }
    }
}

fn print_diagnostic(diag: &Diagnostic, use_color: bool) {
    if use_color {
        let color = if diag.is_error() { RED } else { YELLOW };
        if let Some(ref provenance) = diag.provenance {
            eprint!("{}{}{}: ", CYAN, provenance, RESET);
        }
        eprintln!(
            "{}{}{}{} {}RWX{:04}{}: {}",
            BOLD, color, diag.category, RESET, CYAN, diag.code, RESET, diag.message_text
        );
    } else {
        eprintln!("{}", diag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_flags() {
        let cli = Cli::try_parse_from([
            "rwix", "build", "-o", "out/product.msi", "-b", "media=assets", "-b", "src",
            "--compression", "high", "-vv", "a.wixobj", "b.wixobj",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Build(ref args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.link.inputs, vec![PathBuf::from("a.wixobj"), PathBuf::from("b.wixobj")]);
        assert_eq!(args.bind_paths, vec!["media=assets", "src"]);
        assert_eq!(args.compression, Some(CompressionLevel::High));
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = dir.path().join("rwix.json");
        std::fs::write(&config, r#"{ "outputKind": "msm", "threads": 3, "bindPaths": ["a"] }"#).unwrap();

        let cli = Cli::try_parse_from([
            "rwix", "build", "-c", config.to_str().unwrap(), "-k", "msi", "-b", "b", "x.wixobj",
        ])
        .unwrap();
        let options = resolve_options(&cli).unwrap();

        assert_eq!(options.output_kind.as_deref(), Some("msi"));
        assert_eq!(options.threads, Some(3));
        assert_eq!(options.bind_paths().unwrap().len(), 2);
        assert_eq!(options.intermediates, Some(vec![PathBuf::from("x.wixobj")]));
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let cli = Cli::try_parse_from(["rwix", "decompile", "-c", "/nonexistent/rwix.json", "a.msi"]).unwrap();
        assert!(resolve_options(&cli).is_err());
    }
}
