//! `chirp-cli` – command-line host for the behaviour compiler.
//!
//! ```text
//! chirp compile dance.xml              # → ./dance/dance.ino
//! chirp compile dance.xml --stdout     # print the sketch instead
//! chirp expression blink.xml -o blink.ino
//! chirp sensors                        # sensor catalog with native ranges
//! chirp config                         # effective settings
//! ```
//!
//! Settings come from `~/.chirp/config.toml` (see [`config`]), `CHIRP_*`
//! environment variables, then command-line flags.  Exit codes: `0` success,
//! `1` failure, `2` compilation cancelled at a missing-document prompt.

mod config;
mod prompt;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chirp_codegen::{
    FsLoader, MissingReferenceHandler, ProgramAssembler, sketch_path, write_sketch,
};
use chirp_hal::SENSOR_CATALOG;
use chirp_types::{ChirpError, Decision};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::debug;

use config::{Config, MissingPolicy};
use prompt::PromptHandler;

#[derive(Parser)]
#[command(name = "chirp")]
#[command(about = "Compile robot behaviour documents into Hummingbird sketches")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a sequence and everything it references into one sketch.
    Compile(CompileArgs),
    /// Compile a single expression into a sketch that repeats it.
    Expression(ExpressionArgs),
    /// List the supported sensors and their native ranges.
    Sensors,
    /// Show the effective configuration.
    Config {
        /// Write the default configuration file if none exists.
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args)]
struct CompileArgs {
    /// Root sequence document.
    sequence: PathBuf,

    /// Output path (defaults to a sketch folder under the output directory).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// What to do when a referenced document is missing.
    #[arg(long, value_enum)]
    on_missing: Option<MissingPolicy>,

    /// Directory holding expression documents.
    #[arg(long)]
    expressions_dir: Option<PathBuf>,

    /// Print the sketch instead of writing it.
    #[arg(long)]
    stdout: bool,
}

#[derive(Args)]
struct ExpressionArgs {
    /// Expression document.
    expression: PathBuf,

    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    stdout: bool,
}

/// How a successful command ended.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Done,
    Cancelled,
}

fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "info"); CHIRP_LOG_FORMAT=json
    // emits newline-delimited JSON.  Logs go to stderr so `--stdout` output
    // stays clean.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("CHIRP_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .init();
    }

    let cli = Cli::parse();

    let cfg = match config::load_or_default() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            eprintln!("  Using default configuration.");
            Config::default()
        }
    };

    let result = match cli.command {
        Command::Compile(args) => run_compile(args, &cfg),
        Command::Expression(args) => run_expression(args, &cfg),
        Command::Sensors => {
            print_sensors();
            Ok(Outcome::Done)
        }
        Command::Config { init } => show_config(&cfg, init),
    };

    match result {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::Cancelled) => {
            eprintln!(
                "  {} Compilation cancelled; no sketch was written.",
                "⚠".yellow().bold()
            );
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn run_compile(args: CompileArgs, cfg: &Config) -> Result<Outcome, String> {
    let (base_dir, root_file) = split_document_path(&args.sequence)?;
    let policy = args.on_missing.unwrap_or(cfg.on_missing);
    let expressions_dir = match args.expressions_dir {
        Some(dir) => Some(dir),
        None => resolve_expressions_dir(&cfg.expressions_dir, &base_dir),
    };
    debug!(?policy, ?expressions_dir, root = %root_file, "compiling sequence");

    let loader = FsLoader;
    let mut assembler = ProgramAssembler::new(&loader);
    if let Some(dir) = expressions_dir {
        assembler = assembler.with_expressions_dir(dir);
    }

    let stdin = std::io::stdin();
    let mut prompt;
    let mut fixed;
    let handler: &mut dyn MissingReferenceHandler = match policy {
        MissingPolicy::Prompt => {
            prompt = PromptHandler::new(stdin.lock(), std::io::stderr());
            &mut prompt
        }
        MissingPolicy::Skip => {
            fixed = Decision::Continue;
            &mut fixed
        }
        MissingPolicy::Abort => {
            fixed = Decision::Abort;
            &mut fixed
        }
    };

    if args.stdout {
        let program = assembler
            .compile_sequence_to_arduino(&root_file, &base_dir, handler)
            .map_err(|e| e.to_string())?;
        if program.was_cancelled {
            return Ok(Outcome::Cancelled);
        }
        print!("{}", program.source);
        return Ok(Outcome::Done);
    }

    let out = args
        .output
        .unwrap_or_else(|| sketch_path(&cfg.output_dir, &root_file, cfg.sketch_folders));
    let program = assembler
        .compile_sequence_to_file(&root_file, &base_dir, handler, &out)
        .map_err(|e| e.to_string())?;
    if program.was_cancelled {
        return Ok(Outcome::Cancelled);
    }
    println!(
        "  {} Wrote {} ({} subroutine(s))",
        "✓".green().bold(),
        out.display().to_string().bold(),
        program.methods.len()
    );
    Ok(Outcome::Done)
}

fn run_expression(args: ExpressionArgs, cfg: &Config) -> Result<Outcome, String> {
    let (_, file) = split_document_path(&args.expression)?;
    let loader = FsLoader;
    let source = ProgramAssembler::new(&loader)
        .compile_expression_to_arduino(&args.expression)
        .map_err(|e| e.to_string())?;

    if args.stdout {
        print!("{source}");
        return Ok(Outcome::Done);
    }
    let out = args
        .output
        .unwrap_or_else(|| sketch_path(&cfg.output_dir, &file, cfg.sketch_folders));
    write_sketch(&source, &out).map_err(|e| e.to_string())?;
    println!(
        "  {} Wrote {}",
        "✓".green().bold(),
        out.display().to_string().bold()
    );
    Ok(Outcome::Done)
}

fn print_sensors() {
    println!(
        "  {:<14} {:<20} {:>10}  {}",
        "sensor".bold(),
        "aliases".bold(),
        "range".bold(),
        "inverted".bold()
    );
    for profile in SENSOR_CATALOG {
        println!(
            "  {:<14} {:<20} {:>10}  {}",
            profile.name,
            profile.aliases.join(", "),
            format!("{}–{}", profile.native_min(), profile.native_max()),
            if profile.invert_comparison { "yes" } else { "no" }
        );
    }
}

fn show_config(cfg: &Config, init: bool) -> Result<Outcome, String> {
    let path = config::config_path();
    if init {
        if path.exists() {
            println!("  Config already exists at {}", path.display().to_string().bold());
        } else {
            config::save(&Config::default())?;
            println!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            );
        }
    }
    println!("  # {}", path.display().to_string().dimmed());
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    for line in raw.lines() {
        println!("  {line}");
    }
    Ok(Outcome::Done)
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Split a document path into its directory and file name.
fn split_document_path(path: &Path) -> Result<(PathBuf, String), String> {
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ChirpError::MissingReference {
                file: path.display().to_string(),
                enclosing: ".".to_string(),
            }
            .to_string()
        })?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, file))
}

/// Locate the expressions directory for a project.
///
/// An absolute `configured` path is used as given.  A relative one is looked
/// up next to the sequence, then one level up (sequences commonly live in a
/// sibling `sequences/` folder).  `None` means expressions resolve relative to
/// each referencing sequence.
fn resolve_expressions_dir(configured: &Path, sequence_dir: &Path) -> Option<PathBuf> {
    if configured.is_absolute() {
        return Some(configured.to_path_buf());
    }
    let beside = sequence_dir.join(configured);
    let above = sequence_dir.parent().map(|p| p.join(configured));
    std::iter::once(beside)
        .chain(above)
        .find(|candidate| candidate.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn cli_parses_compile_flags() {
        let cli = Cli::try_parse_from([
            "chirp",
            "compile",
            "dance.xml",
            "--on-missing",
            "skip",
            "--stdout",
        ])
        .unwrap();
        let Command::Compile(args) = cli.command else {
            panic!("expected compile");
        };
        assert_eq!(args.sequence, PathBuf::from("dance.xml"));
        assert_eq!(args.on_missing, Some(MissingPolicy::Skip));
        assert!(args.stdout);
    }

    #[test]
    fn split_document_path_defaults_to_current_dir() {
        let (dir, file) = split_document_path(Path::new("dance.xml")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(file, "dance.xml");

        let (dir, file) = split_document_path(Path::new("proj/seq/dance.xml")).unwrap();
        assert_eq!(dir, PathBuf::from("proj/seq"));
        assert_eq!(file, "dance.xml");
    }

    #[test]
    fn expressions_dir_found_beside_or_above_sequence() {
        let root = tempfile::tempdir().expect("tmp dir");
        let seq_dir = root.path().join("sequences");
        fs::create_dir_all(&seq_dir).unwrap();
        assert_eq!(resolve_expressions_dir(Path::new("expressions"), &seq_dir), None);

        fs::create_dir_all(root.path().join("expressions")).unwrap();
        assert_eq!(
            resolve_expressions_dir(Path::new("expressions"), &seq_dir),
            Some(root.path().join("expressions"))
        );

        fs::create_dir_all(seq_dir.join("expressions")).unwrap();
        assert_eq!(
            resolve_expressions_dir(Path::new("expressions"), &seq_dir),
            Some(seq_dir.join("expressions"))
        );
    }

    #[test]
    fn compile_writes_sketch_folder() {
        let root = tempfile::tempdir().expect("tmp dir");
        fs::write(
            root.path().join("wave.xml"),
            r#"<sequence><expression file="arm.xml" delay-millis="250"/></sequence>"#,
        )
        .unwrap();
        fs::write(
            root.path().join("arm.xml"),
            r#"<expression><services><service type="ServoService">
                 <operation name="setPosition"><device id="1">
                   <parameter name="position">0</parameter>
                 </device></operation></service></services></expression>"#,
        )
        .unwrap();
        let cfg = Config {
            output_dir: root.path().join("out"),
            on_missing: MissingPolicy::Abort,
            ..Config::default()
        };
        let args = CompileArgs {
            sequence: root.path().join("wave.xml"),
            output: None,
            on_missing: None,
            expressions_dir: None,
            stdout: false,
        };
        assert_eq!(run_compile(args, &cfg), Ok(Outcome::Done));
        let sketch = fs::read_to_string(root.path().join("out/wave/wave.ino")).unwrap();
        assert!(sketch.contains("   arm();\n   delay(250);\n"));
        assert!(sketch.contains("hummingbird.setServo(2, 0);"));
    }

    #[test]
    fn skipped_missing_expression_still_writes() {
        let root = tempfile::tempdir().expect("tmp dir");
        fs::write(
            root.path().join("main.xml"),
            r#"<sequence><expression file="gone.xml"/></sequence>"#,
        )
        .unwrap();
        let out = root.path().join("main.ino");
        let args = CompileArgs {
            sequence: root.path().join("main.xml"),
            output: Some(out.clone()),
            on_missing: Some(MissingPolicy::Skip),
            expressions_dir: None,
            stdout: false,
        };
        assert_eq!(run_compile(args, &Config::default()), Ok(Outcome::Done));
        assert!(fs::read_to_string(&out).unwrap().contains("void loop() {\n}\n"));
    }

    #[test]
    fn aborted_compile_reports_cancelled_and_writes_nothing() {
        let root = tempfile::tempdir().expect("tmp dir");
        fs::write(
            root.path().join("main.xml"),
            r#"<sequence><saved-sequence file="gone.xml"/></sequence>"#,
        )
        .unwrap();
        let out = root.path().join("main.ino");
        let args = CompileArgs {
            sequence: root.path().join("main.xml"),
            output: Some(out.clone()),
            on_missing: Some(MissingPolicy::Abort),
            expressions_dir: None,
            stdout: false,
        };
        assert_eq!(run_compile(args, &Config::default()), Ok(Outcome::Cancelled));
        assert!(!out.exists());
    }
}
