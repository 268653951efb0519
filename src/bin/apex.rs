//! APEX CLI
//!
//! The thin operator-facing surface over the GrammarValidator and its
//! dependency analyzer (§6): `validate`, `validate-folder`, `validate-project`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use apex_engine::validator::dependency::{analyze, LoadedFile};
use apex_engine::registry::loader::load_file;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "apex")]
#[command(about = "APEX — configuration validation CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a single configuration file and everything it transitively references
    Validate {
        file: PathBuf,
    },
    /// Validate every YAML file directly under a directory (non-recursive)
    ValidateFolder {
        dir: PathBuf,
        /// Write a markdown report alongside the directory
        #[arg(long)]
        report: bool,
    },
    /// Recursively validate the current project, walking up to find its root
    ValidateProject,
}

fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"))
}

/// Loads every YAML file directly inside `dir` (no recursion, no
/// `data-source-refs` following) keyed by file name.
fn load_directory(dir: &Path) -> HashMap<String, LoadedFile> {
    let mut files = HashMap::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && is_yaml(&path) {
            match load_file(&path) {
                Ok(document) => {
                    let key = path.file_name().unwrap().to_string_lossy().to_string();
                    files.insert(key, LoadedFile { document, is_yaml_ext: true });
                }
                Err(e) => error!("{} {}: {e}", "skipped".red(), path.display()),
            }
        }
    }
    files
}

/// Recursively collects every YAML file under `dir`.
fn load_recursive(dir: &Path, out: &mut HashMap<String, LoadedFile>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            load_recursive(&path, out);
        } else if is_yaml(&path) {
            match load_file(&path) {
                Ok(document) => {
                    out.insert(path.to_string_lossy().to_string(), LoadedFile { document, is_yaml_ext: true });
                }
                Err(e) => error!("{} {}: {e}", "skipped".red(), path.display()),
            }
        }
    }
}

/// Walks upward from the current directory until it finds one containing
/// at least one YAML file, treating that as the project root (§6
/// "validate-project: recursive walk from CWD upward").
fn find_project_root() -> PathBuf {
    let mut dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    loop {
        let has_yaml = std::fs::read_dir(&dir)
            .map(|entries| entries.flatten().any(|e| is_yaml(&e.path())))
            .unwrap_or(false);
        if has_yaml {
            return dir;
        }
        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => return std::env::current_dir().unwrap_or(dir),
        }
    }
}

fn print_report(root: &str, files: &HashMap<String, LoadedFile>) -> bool {
    let report = analyze(files, root);

    println!("\n{}", "Dependency graph".bold());
    for (path, deps) in &report.dependencies {
        if deps.is_empty() {
            println!("  {path}");
        } else {
            println!("  {path} -> {}", deps.join(", "));
        }
    }

    if report.circular_dependencies.is_empty() {
        println!("\n{}", "No circular dependencies".green());
    } else {
        println!("\n{}", "Circular dependencies".red().bold());
        for cycle in &report.circular_dependencies {
            println!("  {}", cycle.join(" -> ").red());
        }
    }

    if report.root_causes.is_empty() {
        println!("\n{}", "No root causes".green());
    } else {
        println!("\n{}", "Root causes".red().bold());
        for cause in &report.root_causes {
            println!("  {}", cause.red());
        }
    }

    println!("\n{}", "Per-file results".bold());
    for (path, result) in &report.file_results {
        let label = if result.valid { "valid".green() } else { "invalid".red() };
        println!("  {path}: {label}");
        for issue in &result.issues {
            println!("    - {}: {}", issue.path, issue.message);
        }
    }

    if report.is_valid {
        println!("\n{} configuration is valid", "✓".green());
    } else {
        println!("\n{} configuration is invalid", "✗".red());
    }

    report.is_valid
}

fn write_markdown_report(dir: &Path, files: &HashMap<String, LoadedFile>) -> std::io::Result<()> {
    let report = analyze(files, &dir.to_string_lossy());
    let mut out = String::new();
    out.push_str("# Validation report\n\n");
    out.push_str(&format!("Overall: **{}**\n\n", if report.is_valid { "valid" } else { "invalid" }));
    out.push_str("## Per-file results\n\n");
    for (path, result) in &report.file_results {
        out.push_str(&format!("- `{path}`: {}\n", if result.valid { "valid" } else { "invalid" }));
        for issue in &result.issues {
            out.push_str(&format!("  - {}: {}\n", issue.path, issue.message));
        }
    }
    if !report.circular_dependencies.is_empty() {
        out.push_str("\n## Circular dependencies\n\n");
        for cycle in &report.circular_dependencies {
            out.push_str(&format!("- {}\n", cycle.join(" -> ")));
        }
    }
    std::fs::write(dir.join("validation-report.md"), out)
}

fn main() {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let valid = match cli.command {
        Commands::Validate { file } => {
            info!("validating {}", file.display());
            match apex_engine::registry::loader::load_transitive(&file) {
                Ok((root, files)) => print_report(&root, &files),
                Err(e) => {
                    error!("{e}");
                    false
                }
            }
        }
        Commands::ValidateFolder { dir, report } => {
            info!("validating folder {}", dir.display());
            let files = load_directory(&dir);
            let valid = print_report(&dir.to_string_lossy(), &files);
            if report {
                if let Err(e) = write_markdown_report(&dir, &files) {
                    error!("failed writing report: {e}");
                }
            }
            valid
        }
        Commands::ValidateProject => {
            let root = find_project_root();
            info!("validating project rooted at {}", root.display());
            let mut files = HashMap::new();
            load_recursive(&root, &mut files);
            print_report(&root.to_string_lossy(), &files)
        }
    };

    if !valid {
        std::process::exit(1);
    }
}
