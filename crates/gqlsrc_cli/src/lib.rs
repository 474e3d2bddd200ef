//! Command-line interface for gqlsrc.
//!
//! # Usage
//!
//! ```bash
//! # Source every entity type into a JSON lines file
//! gqlsrc source --url https://cms.example/graphql -l EN -l ES --output nodes.jsonl
//!
//! # Only compile the queries and print them
//! gqlsrc compile --config gqlsrc.json
//!
//! # Check fragment files
//! gqlsrc check fragments/*.graphql
//! ```

pub mod output;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use gqlsrc_core::DiagnosticSeverity;
use gqlsrc_source::executor::DEFAULT_MAX_IN_FLIGHT;
use gqlsrc_source::{HttpExecutor, Sourcer, SourcingConfig, SourcingReport, TypeOutcome};
use gqlsrc_syntax::parse;
use output::JsonLinesSink;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Exit code of a run where some type was not fully sourced.
pub const EXIT_INCOMPLETE: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "gqlsrc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by the commands that talk to the remote API.
///
/// Flags override the environment, which overrides the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Remote GraphQL endpoint
    #[arg(long, env = "DRUPAL_GRAPHQL_URL")]
    pub url: Option<String>,

    /// Language to source (repeatable)
    #[arg(short, long = "language")]
    pub languages: Vec<String>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Fragment cache directory
    #[arg(long)]
    pub fragments_dir: Option<PathBuf>,

    /// Directory receiving compiled queries
    #[arg(long)]
    pub debug_dir: Option<PathBuf>,

    /// Entities per page
    #[arg(long)]
    pub page_size: Option<u64>,

    /// Entity types sourced at the same time
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Extra HTTP header, as `Name: value` (repeatable)
    #[arg(long = "header")]
    pub headers: Vec<String>,
}

impl ConfigArgs {
    /// Builds the sourcing configuration. It is validated later, by the
    /// sourcer.
    pub fn load(&self) -> Result<SourcingConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => SourcingConfig::from_json_str(&std::fs::read_to_string(path)?)?,
            None => SourcingConfig::default(),
        };

        if let Some(url) = &self.url {
            config.url = Some(url.clone());
        }
        if !self.languages.is_empty() {
            config.languages.clone_from(&self.languages);
        }
        if let Some(dir) = &self.fragments_dir {
            config.fragments_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.debug_dir {
            config.debug_dir = Some(dir.clone());
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        for header in &self.headers {
            let (name, value) = header
                .split_once(':')
                .ok_or_else(|| format!("header `{header}` is not `Name: value`"))?;
            config
                .headers
                .insert(name.trim().to_string(), value.trim().to_string());
        }

        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Source every entity type and write nodes as JSON lines
    Source {
        #[command(flatten)]
        config: ConfigArgs,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Introspect and compile the listing queries without fetching entities
    Compile {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Check fragment files for syntax errors
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print version information
    Version,
}

pub async fn run(cli: Cli) -> Result<i32, Box<dyn Error>> {
    match cli.command {
        Commands::Source { config, output } => source(&config, output, cli.quiet).await,
        Commands::Compile { config } => compile(&config, cli.quiet).await,
        Commands::Check { files } => check_files(&files, cli.verbose),
        Commands::Version => {
            println!("gqlsrc {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
    }
}

fn sourcer(args: &ConfigArgs) -> Result<Sourcer, Box<dyn Error>> {
    let config = args.load()?;
    config.validate()?;
    let executor = HttpExecutor::builder(config.endpoint()?)
        .headers(&config.headers)
        .max_in_flight(config.concurrency.max(DEFAULT_MAX_IN_FLIGHT))
        .build()?;
    Ok(Sourcer::new(config, Arc::new(executor))?)
}

async fn source(args: &ConfigArgs, output: Option<PathBuf>, quiet: bool) -> Result<i32, Box<dyn Error>> {
    let sourcer = sourcer(args)?;

    let cancel = sourcer.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing current pages");
            cancel.cancel();
        }
    });

    let writer: Box<dyn Write + Send> = match output {
        Some(path) => Box::new(std::io::BufWriter::new(std::fs::File::create(path)?)),
        None => Box::new(std::io::BufWriter::new(std::io::stdout())),
    };
    let sink = JsonLinesSink::new(writer);
    let report = sourcer.run(&sink).await?;
    sink.flush().await?;

    if !quiet {
        print_report(&report);
    }
    Ok(if report.is_complete() { 0 } else { EXIT_INCOMPLETE })
}

async fn compile(args: &ConfigArgs, quiet: bool) -> Result<i32, Box<dyn Error>> {
    let sourcer = sourcer(args)?;
    let prepared = sourcer.prepare().await?;

    if sourcer.config().debug_dir.is_none() {
        for document in prepared.documents.values() {
            println!("# {}\n{}\n", document.remote_type_name, document.query);
        }
    }
    if !quiet {
        for (type_name, error) in &prepared.skipped {
            eprintln!("{} {type_name}: {error}", "skipped".yellow().bold());
        }
        eprintln!(
            "{} {} document(s) compiled",
            "Success:".green().bold(),
            prepared.documents.len()
        );
    }
    Ok(if prepared.skipped.is_empty() { 0 } else { EXIT_INCOMPLETE })
}

/// One line per type, on stderr.
pub fn print_report(report: &SourcingReport) {
    let width = report.outcomes.keys().map(String::len).max().unwrap_or(0);
    for (type_name, outcome) in &report.outcomes {
        let label = match outcome {
            TypeOutcome::Complete { .. } => outcome.label().green(),
            TypeOutcome::Partial { .. } => outcome.label().yellow(),
            TypeOutcome::Skipped { .. } => outcome.label().red(),
            TypeOutcome::Cancelled { .. } => outcome.label().dimmed(),
        };
        let detail = match outcome {
            TypeOutcome::Partial { language, error, .. } => format!("  ({language}: {error})"),
            TypeOutcome::Skipped { error } => format!("  ({error})"),
            TypeOutcome::Complete { .. } | TypeOutcome::Cancelled { .. } => String::new(),
        };
        eprintln!(
            "  {label:<9} {type_name:<width$} {:>6}{detail}",
            outcome.emitted()
        );
    }
    eprintln!(
        "{} {} node(s) from {} type(s)",
        "Sourced".bold(),
        report.emitted_total(),
        report.outcomes.len()
    );
}

fn check_files(files: &[PathBuf], verbose: bool) -> Result<i32, Box<dyn Error>> {
    let mut has_errors = false;

    for file in files {
        if verbose {
            println!("{} {}", "Checking".blue(), file.display());
        }

        let source = std::fs::read_to_string(file)?;
        let result = parse(&source);

        for diagnostic in result.diagnostics.iter() {
            let severity = match diagnostic.severity {
                DiagnosticSeverity::Error => "error".red().bold(),
                DiagnosticSeverity::Warning => "warning".yellow().bold(),
            };
            eprintln!(
                "{severity} {}:{}",
                file.display(),
                diagnostic.render_line(&source)
            );
        }

        if result.has_errors() {
            has_errors = true;
            if let Some(error) = result
                .diagnostics
                .to_syntax_error(&file.display().to_string(), &source)
            {
                eprintln!("{:?}", miette::Report::new(error));
            }
        } else if verbose {
            let fragments = result.document.fragments().count();
            println!("{} {} ({fragments} fragment(s))", "OK".green(), file.display());
        }
    }

    if has_errors {
        Ok(1)
    } else {
        println!(
            "{} {} file(s) checked",
            "Success:".green().bold(),
            files.len()
        );
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gqlsrc.json");
        std::fs::write(
            &path,
            r#"{"url": "https://file.example/graphql", "languages": ["EN"], "pageSize": 25}"#,
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "gqlsrc",
            "compile",
            "--config",
            path.to_str().unwrap(),
            "--url",
            "https://flag.example/graphql",
            "-l",
            "EN",
            "-l",
            "ES",
            "--header",
            "Authorization: Bearer abc",
        ])
        .unwrap();
        let Commands::Compile { config } = cli.command else {
            panic!("expected compile");
        };

        let config = config.load().unwrap();
        assert_eq!(config.url.as_deref(), Some("https://flag.example/graphql"));
        assert_eq!(config.languages, vec!["EN", "ES"]);
        assert_eq!(config.page_size, 25);
        assert_eq!(config.headers["Authorization"], "Bearer abc");
    }

    #[test]
    fn test_malformed_header() {
        let args = ConfigArgs {
            headers: vec!["no-colon".to_string()],
            ..ConfigArgs::default()
        };
        assert!(args.load().unwrap_err().to_string().contains("no-colon"));
    }

    #[test]
    fn test_check_reports_syntax_errors() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("Good.graphql");
        let bad = dir.path().join("Bad.graphql");
        std::fs::write(&good, "fragment Good on Good { id }").unwrap();
        std::fs::write(&bad, "fragment Bad on Bad { id").unwrap();

        assert_eq!(check_files(&[good.clone()], false).unwrap(), 0);
        assert_eq!(check_files(&[good, bad], false).unwrap(), 1);
    }
}
