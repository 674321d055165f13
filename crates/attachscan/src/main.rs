use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use attachscan_core::analyze::{AuditOptions, AuditProgress, run_audit};
use attachscan_core::client::{ConfluenceClient, ConfluenceClientConfig};
use attachscan_core::config::{
    AuditConfig, CredentialOverrides, DEFAULT_CONFIG_FILENAME, load_config,
};
use attachscan_core::detect::find_reference;
use attachscan_core::labels::Locale;
use attachscan_core::model::{SiteUrls, bytes_to_mib};
use attachscan_core::report::{FsReportWriter, ReportOptions, create_run_dir, run_timestamp};
use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "attachscan",
    version,
    about = "Audit attachment storage across Confluence spaces and flag unreferenced files"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    config: PathBuf,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            config: cli
                .config
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME)),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Analyze every space and write CSV/HTML reports")]
    Run(RunArgs),
    #[command(about = "Check titles against a local storage-markup file")]
    Check(CheckArgs),
    #[command(about = "Print the resolved configuration")]
    Config,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long, value_name = "URL", help = "Site base URL, e.g. https://example.atlassian.net/wiki")]
    base_url: Option<String>,
    #[arg(long, value_name = "ACCOUNT", help = "Account used for basic auth")]
    user: Option<String>,
    #[arg(long, value_name = "TOKEN", help = "API token used for basic auth")]
    token: Option<String>,
    #[arg(long, value_name = "PATH", help = "Directory that receives the run folder")]
    output_dir: Option<PathBuf>,
    #[arg(long, value_name = "en|de", help = "Report label language")]
    labels: Option<String>,
    #[arg(long, value_name = "N", help = "Rows shown in each HTML report")]
    top: Option<usize>,
    #[arg(long = "space", value_name = "KEY", help = "Only analyze this space (repeatable)")]
    spaces: Vec<String>,
    #[arg(short, long, help = "Log progress at info level")]
    verbose: bool,
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[arg(long, value_name = "FILE", help = "Storage-format markup to search")]
    markup: PathBuf,
    #[arg(required = true, value_name = "TITLE")]
    titles: Vec<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Run(args)) => run_scan(&runtime, args),
        Some(Commands::Check(args)) => run_check(&runtime, args),
        Some(Commands::Config) => run_config(&runtime),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn run_scan(runtime: &RuntimeOptions, args: RunArgs) -> Result<()> {
    init_tracing(args.verbose);
    let config = load_config(&runtime.config)?;
    let credentials = config.credentials(&CredentialOverrides {
        base_url: args.base_url,
        user: args.user,
        api_token: args.token,
    })?;
    let locale = match args.labels.as_deref() {
        Some(value) => Locale::parse(value)?,
        None => config.locale()?,
    };
    let top_rows = args.top.unwrap_or_else(|| config.top_rows());
    let output_dir = args.output_dir.unwrap_or_else(|| config.output_dir());

    let site = SiteUrls::new(&credentials.base_url);
    let mut client =
        ConfluenceClient::new(ConfluenceClientConfig::from_config(&config, credentials))?;

    let timestamp = run_timestamp();
    let run_dir = create_run_dir(&output_dir, &timestamp)?;
    let mut writer = FsReportWriter::new(
        run_dir.clone(),
        ReportOptions {
            locale,
            top_rows,
            run_label: timestamp,
        },
    );

    println!("attachment audit");
    println!("base_url: {}", site.base_url());
    println!("run_dir: {}", normalize_path(&run_dir));
    println!("labels: {}", locale.as_str());
    if runtime.diagnostics {
        print_diagnostics(runtime, &config);
    }

    let options = AuditOptions {
        workspace_keys: args.spaces,
    };
    let report = run_audit(&mut client, &site, &mut writer, &options, &mut print_progress)?;

    println!("workspaces: {}", report.results.len());
    println!("files: {}", report.file_count);
    println!("unreferenced: {}", report.unreferenced_count);
    println!("total_mib: {:.2}", bytes_to_mib(report.total_size));
    println!("requests: {}", report.request_count);
    println!("index: {}", normalize_path(&report.index_path));
    Ok(())
}

fn print_progress(event: AuditProgress) {
    match event {
        AuditProgress::WorkspacesListed { total, selected } => {
            println!("spaces_found: {total}");
            println!("spaces_selected: {selected}");
        }
        AuditProgress::WorkspaceStarted {
            key,
            name,
            position,
            total,
        } => println!("[{position}/{total}] {name} ({key})"),
        AuditProgress::PagesEnumerated { pages, .. } => println!("  pages: {pages}"),
        AuditProgress::WorkspaceFinished {
            files,
            unreferenced,
            ..
        } => {
            println!("  files: {files}");
            println!("  unreferenced: {unreferenced}");
        }
    }
}

fn run_check(runtime: &RuntimeOptions, args: CheckArgs) -> Result<()> {
    init_tracing(false);
    let markup = fs::read_to_string(&args.markup)
        .with_context(|| format!("failed to read {}", args.markup.display()))?;

    println!("markup: {}", normalize_path(&args.markup));
    println!("titles: {}", args.titles.join(", "));
    match find_reference(&markup, &args.titles) {
        Some(found) => {
            println!("referenced: yes");
            println!("title: {}", found.title);
            println!("strategy: {}", found.strategy.as_str());
            println!("candidate: {}", found.candidate);
        }
        None => println!("referenced: no"),
    }
    if runtime.diagnostics {
        println!("\n[diagnostics]\nconfig_path: {}", normalize_path(&runtime.config));
    }
    Ok(())
}

fn run_config(runtime: &RuntimeOptions) -> Result<()> {
    let config = load_config(&runtime.config)?;
    println!("config_path: {}", normalize_path(&runtime.config));
    println!("config_exists: {}", format_flag(runtime.config.exists()));
    println!("base_url: {}", config.base_url().as_deref().unwrap_or("<unset>"));
    println!("user: {}", config.user().as_deref().unwrap_or("<unset>"));
    println!(
        "api_token: {}",
        if config.api_token().is_some() {
            "<redacted>"
        } else {
            "<unset>"
        }
    );
    println!("labels: {}", config.locale()?.as_str());
    println!("top_rows: {}", config.top_rows());
    println!("output_dir: {}", normalize_path(&config.output_dir()));
    println!("timeout_ms: {}", config.timeout_ms());
    println!("user_agent: {}", config.user_agent());
    if runtime.diagnostics {
        print_diagnostics(runtime, &config);
    }
    Ok(())
}

fn print_diagnostics(runtime: &RuntimeOptions, config: &AuditConfig) {
    println!("\n[diagnostics]");
    println!("config_path: {}", normalize_path(&runtime.config));
    println!("config_exists: {}", format_flag(runtime.config.exists()));
    println!("dotenv_present: {}", format_flag(Path::new(".env").exists()));
    println!("timeout_ms: {}", config.timeout_ms());
    println!("user_agent: {}", config.user_agent());
    println!(
        "rust_log: {}",
        std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string())
    );
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
