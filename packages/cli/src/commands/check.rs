use anyhow::Result;
use clap::Args;
use colored::Colorize;
use formset_parser::format_error;
use formset_runtime::{Diagnostic, Formset, FormsetSchema, Problem};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Formset schema (JSON) or a directory of schemas
    pub input: PathBuf,

    /// Also list schemas without problems
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

/// Problems found in one schema file
#[derive(Debug, Default)]
struct FileReport {
    /// Schema could not be built at all
    fatal: Option<String>,
    diagnostics: Vec<Diagnostic>,
}

impl FileReport {
    fn error_count(&self) -> usize {
        self.diagnostics.len() + usize::from(self.fatal.is_some())
    }
}

pub fn check(args: CheckArgs) -> Result<()> {
    let files = if args.input.is_file() {
        vec![args.input.clone()]
    } else if args.input.is_dir() {
        find_schema_files(&args.input)
    } else {
        return Err(anyhow::anyhow!(
            "Input path does not exist: {}",
            args.input.display()
        ));
    };

    let json_output = args.format == "json";
    let mut total_errors = 0;
    let mut results = Vec::new();

    for file in &files {
        let report = check_file(file)?;
        total_errors += report.error_count();

        if json_output {
            results.push(report_json(file, &report));
        } else {
            print_report(file, &report, args.verbose);
        }
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!();
        println!("   Schemas checked: {}", files.len());
        if total_errors > 0 {
            println!("   {} {}", "Errors:".red(), total_errors);
        } else {
            println!("   {} No issues found!", "✓".green());
        }
    }

    if total_errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn check_file(path: &Path) -> Result<FileReport> {
    let source = fs::read_to_string(path)?;

    let built = FormsetSchema::from_json(&source).and_then(|schema| Formset::new(&schema));
    Ok(match built {
        Ok(formset) => FileReport {
            fatal: None,
            diagnostics: formset.diagnostics().to_vec(),
        },
        Err(err) => FileReport {
            fatal: Some(err.to_string()),
            diagnostics: Vec::new(),
        },
    })
}

fn print_report(path: &Path, report: &FileReport, verbose: bool) {
    if report.error_count() == 0 {
        if verbose {
            println!("{} {}", "✓".green(), path.display());
        }
        return;
    }

    println!("{} {}", "✗".red(), path.display());
    if let Some(fatal) = &report.fatal {
        println!("   {}", fatal);
    }

    for diagnostic in &report.diagnostics {
        match &diagnostic.problem {
            Problem::Parse(err) => {
                let origin = format!("{} [{}]", diagnostic.origin, diagnostic.attribute);
                eprint!("{}", format_error(&diagnostic.text, &origin, err));
            }
            Problem::Circular(_) => println!("   {}", diagnostic),
        }
    }
}

fn report_json(path: &Path, report: &FileReport) -> serde_json::Value {
    let diagnostics: Vec<_> = report
        .diagnostics
        .iter()
        .map(|d| {
            let span = match &d.problem {
                Problem::Parse(err) => err.span(),
                Problem::Circular(_) => None,
            };
            json!({
                "origin": d.origin,
                "attribute": d.attribute,
                "text": d.text,
                "message": d.problem.to_string(),
                "span": span.map(|s| [s.start, s.end]),
            })
        })
        .collect();

    json!({
        "file": path.display().to_string(),
        "fatal": report.fatal,
        "diagnostics": diagnostics,
    })
}

fn find_schema_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension().map_or(false, |ext| ext == "json")
                && p.file_name().map_or(true, |n| n != formset_client::DEFAULT_CONFIG_NAME)
        })
        .collect();
    files.sort();
    files
}
