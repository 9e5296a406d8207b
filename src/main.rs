//! Mallard - VBA module parser
//!
//! Command-line front end: parses exported modules through both passes and
//! reports what each module produced.

use clap::{Parser, ValueEnum};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mallard::host::{FileSystemHost, HostTextProvider, ProjectConstants};
use mallard::lexer::{Channel, TokenKind, tokenize};
use mallard::module::QualifiedModuleName;
use mallard::pipeline::{Collaborators, ParseCoordinator, TaskResult};
use mallard::preprocessor::{ConstValue, ConstantTable, PredefinedConstants, VbaVersion};

/// Mallard - parses VBA modules the way the IDE sees them
#[derive(Parser, Debug)]
#[command(name = "mallard")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Project directories or exported module files (.bas, .cls, .frm)
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,

    /// Conditional compilation constant, as NAME=VALUE (repeatable)
    #[arg(long = "const", value_name = "NAME=VALUE", value_parser = parse_constant)]
    constants: Vec<(String, ConstValue)>,

    /// Host language version for the VBA6/VBA7 constants
    #[arg(long, value_enum, default_value = "7")]
    vba_version: VersionArg,

    /// Define Win64 as true
    #[arg(long)]
    win64: bool,

    /// Define Mac as true
    #[arg(long)]
    mac: bool,

    /// Number of parser threads (default: one per CPU)
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Only run the lexer and print tokens (for debugging)
    #[arg(long)]
    tokens: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VersionArg {
    #[value(name = "6")]
    Vba6,
    #[value(name = "7")]
    Vba7,
}

fn parse_constant(arg: &str) -> Result<(String, ConstValue), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", arg))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing constant name in '{}'", arg));
    }
    Ok((name.to_string(), ConstValue::parse_literal(value)))
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let projects = match collect_projects(&args.paths) {
        Ok(projects) => projects,
        Err(message) => {
            eprintln!("Error: {}", message);
            std::process::exit(1);
        }
    };

    if args.tokens {
        print_tokens(&projects, args.verbose);
        return;
    }

    let predefined = PredefinedConstants {
        version: match args.vba_version {
            VersionArg::Vba6 => VbaVersion::Vba6,
            VersionArg::Vba7 => VbaVersion::Vba7,
        },
        win64: args.win64,
        mac: args.mac,
    };
    let mut declared = ConstantTable::new();
    for (name, value) in &args.constants {
        declared.define(name.clone(), value.clone());
    }
    let constants = Arc::new(ProjectConstants::new(predefined, declared));

    let mut failures = 0;
    for (host, modules) in projects {
        let collaborators = Collaborators::new(Arc::new(host.clone()), constants.clone());
        let coordinator = match ParseCoordinator::new(collaborators, args.threads) {
            Ok(coordinator) => coordinator,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        };

        if args.verbose {
            println!("Project: {} ({} modules)", host.root().display(), modules.len());
        }
        for (module, result) in modules.iter().zip(coordinator.parse_modules(&modules)) {
            if !report(module, &result, args.verbose) {
                failures += 1;
            }
        }
    }

    if failures > 0 {
        eprintln!("{} module(s) failed to parse", failures);
        std::process::exit(1);
    }
}

/// Groups the given paths into one host per project directory.
fn collect_projects(paths: &[PathBuf]) -> Result<Vec<(FileSystemHost, Vec<QualifiedModuleName>)>, String> {
    let mut projects: BTreeMap<PathBuf, Vec<QualifiedModuleName>> = BTreeMap::new();
    for path in paths {
        if path.is_dir() {
            let host = FileSystemHost::new(path.clone());
            let modules = host.modules().map_err(|e| e.to_string())?;
            projects.entry(path.clone()).or_default().extend(modules);
        } else if path.is_file() {
            let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
            let module = FileSystemHost::new(root.clone())
                .module_for(path)
                .ok_or_else(|| format!("'{}' is not a module file", path.display()))?;
            projects.entry(root).or_default().push(module);
        } else {
            return Err(format!("'{}' does not exist", path.display()));
        }
    }

    Ok(projects
        .into_iter()
        .map(|(root, mut modules)| {
            modules.sort();
            modules.dedup();
            (FileSystemHost::new(root), modules)
        })
        .collect())
}

/// Prints one module's result; returns false if the module failed.
fn report(module: &QualifiedModuleName, result: &TaskResult, verbose: bool) -> bool {
    match result {
        TaskResult::Completed(completion) => {
            println!(
                "OK      {}: {} members, {} comments, {} annotations",
                module,
                completion.code_tree.members().count(),
                completion.comments.len(),
                completion.annotations.len()
            );
            if let Some(failure) = &completion.attributes_failure {
                println!("        attributes not available: {}", failure);
            }
            if verbose {
                for annotation in &completion.annotations {
                    println!("        @{} {:?} at {}", annotation.name, annotation.args, annotation.selection);
                }
                if let Some(attributes) = &completion.attributes {
                    for (name, kind, scope) in attributes.iter() {
                        for attribute in scope.iter() {
                            println!("        {} ({:?}): {}", name, kind, attribute);
                        }
                    }
                }
            }
            true
        }
        TaskResult::Failed(failure) => {
            println!("FAILED  {}: {}", module, failure.cause);
            false
        }
        TaskResult::Cancelled => {
            println!("SKIPPED {}: cancelled", module);
            true
        }
    }
}

fn print_tokens(projects: &[(FileSystemHost, Vec<QualifiedModuleName>)], verbose: bool) {
    for (host, modules) in projects {
        for module in modules {
            let path = host.root().join(module.component_name());
            let source = match host.attributes_text(module) {
                Ok(source) => source,
                Err(e) => {
                    eprintln!("Error reading '{}': {}", path.display(), e);
                    continue;
                }
            };

            println!("Tokens for {}:", module);
            println!("{:-<60}", "");
            for token in tokenize(&source).iter() {
                // Skip newlines and hidden tokens unless verbose
                if !verbose && (token.kind == TokenKind::Newline || token.channel != Channel::Default) {
                    continue;
                }
                println!(
                    "{:4}:{:<4} {:20} {:?}",
                    token.line,
                    token.column,
                    format!("{:?}", token.kind),
                    token.text
                );
            }
        }
    }
}
