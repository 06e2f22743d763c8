use std::time::Duration;

use clap::{error::ErrorKind, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::catalog::Catalog;
use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::output::{self, OutputError, OutputFormat};
use crate::probe::{TransportConfig, Verdict, DEFAULT_TIMEOUT_SECONDS, DEFAULT_USER_AGENT};
use crate::scanner::{
    ProgressEvent, ScanError, ScanOptions, ScanReport, Scanner, DEFAULT_CONCURRENCY,
};
use crate::utils;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 130;

const RULE_WIDTH: usize = 60;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("scan interrupted by user ({completed}/{total} paths checked)")]
    Interrupted { completed: usize, total: usize },

    #[error("{0}")]
    Failed(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Interrupted { .. } => EXIT_INTERRUPTED,
            CliError::Failed(_) => EXIT_FAILURE,
        }
    }
}

impl From<String> for CliError {
    fn from(message: String) -> Self {
        CliError::Failed(message)
    }
}

impl From<ScanError> for CliError {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::Interrupted {
                completed, total, ..
            } => CliError::Interrupted { completed, total },
            other => CliError::Failed(other.to_string()),
        }
    }
}

impl From<OutputError> for CliError {
    fn from(e: OutputError) -> Self {
        CliError::Failed(e.to_string())
    }
}

fn print_banner() {
    const BANNER: &str = r#"
                 __                ____               __
   __  ______   / /___  ____ _____/ / /_  __  _______/ /____  _____
  / / / / __ \ / / __ \/ __ `/ __  / __ \/ / / / ___/ __/ _ \/ ___/
 / /_/ / /_/ // / /_/ / /_/ / /_/ / /_/ / /_/ (__  ) /_/  __/ /
 \__,_/ .___//_/\____/\__,_/\__,_/_.___/\__,_/____/\__/\___/_/
     /_/
       v0.1.0 - upload endpoint discovery tool
    "#;
    print!("{}", BANNER);
    println!();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<12}: {}", label, value);
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn format_event(event: &ProgressEvent) -> String {
    let status = event
        .status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    let label = event.verdict.label();
    match event.verdict {
        Verdict::Found => format!("[+] {}: {} (Status: {})", label, event.url, status)
            .green()
            .to_string(),
        Verdict::Possible => format!("[?] {}: {} (Status: {})", label, event.url, status)
            .yellow()
            .to_string(),
        Verdict::NotFound => format!("[-] {}: {}", label, event.url).red().to_string(),
    }
}

async fn render_progress(pb: ProgressBar, mut rx: mpsc::Receiver<ProgressEvent>, quiet: bool) {
    while let Some(event) = rx.recv().await {
        pb.set_position(event.completed as u64);
        if quiet && !event.verdict.is_reportable() {
            continue;
        }
        pb.println(format_event(&event));
    }
}

// returns false when the renderer died before draining its channel
async fn join_renderer(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "progress renderer stopped early");
            false
        }
    }
}

fn format_completion(report: &ScanReport) -> String {
    format!(
        ":: Completed :: {} probed, scan took {}s ::",
        report.probed(),
        report.elapsed.as_secs()
    )
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("uploadbuster={level}")));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

async fn wait_for_ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        // no signal handler, so never interrupt
        std::future::pending::<()>().await;
    }
}

#[derive(Clone, Debug)]
struct RunConfig {
    target: String,
    concurrency: usize,
    timeout: u64,
    workers: usize,
    output: Option<String>,
    output_format: OutputFormat,
    proxy: Option<String>,
    header: Option<String>,
    user_agent: String,
    paths_file: Option<String>,
    follow_redirects: bool,
    no_color: bool,
    quiet: bool,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let target = utils::normalize_target(&args.url)?;

    let no_color = if args.color {
        false
    } else {
        args.no_color || cfg.no_color.unwrap_or(false)
    };
    let quiet = args.quiet || cfg.quiet.unwrap_or(false);

    let concurrency = args
        .concurrency
        .or(cfg.concurrency)
        .unwrap_or(DEFAULT_CONCURRENCY);
    if concurrency == 0 {
        return Err("invalid concurrency, expected positive integer".to_string());
    }
    let timeout = args
        .timeout
        .or(cfg.timeout)
        .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
    if timeout == 0 {
        return Err("invalid timeout, expected positive number of seconds".to_string());
    }
    let workers = args.workers.or(cfg.workers).unwrap_or(10).max(1);

    let follow_redirects = if args.no_redirects {
        false
    } else {
        cfg.follow_redirects.unwrap_or(true)
    };

    let proxy = args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty());
    let header = args.header.or(cfg.header).filter(|h| !h.trim().is_empty());
    let user_agent = args
        .user_agent
        .or(cfg.user_agent)
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
    let paths_file = args
        .paths_file
        .or(cfg.paths_file)
        .filter(|p| !p.trim().is_empty())
        .map(|p| config::expand_tilde_string(&p));

    let output = args
        .output
        .or(cfg.output)
        .filter(|p| !p.trim().is_empty())
        .map(|p| config::expand_tilde_string(&p));
    let output_format = match args.output_format.or(cfg.output_format) {
        Some(raw) => OutputFormat::parse(&raw)
            .ok_or_else(|| format!("invalid output format '{raw}', expected text or json"))?,
        None => output
            .as_deref()
            .and_then(output::infer_format_from_path)
            .unwrap_or(OutputFormat::Text),
    };

    Ok(RunConfig {
        target,
        concurrency,
        timeout,
        workers,
        output,
        output_format,
        proxy,
        header,
        user_agent,
        paths_file,
        follow_redirects,
        no_color,
        quiet,
    })
}

async fn run_async(run: RunConfig) -> Result<(), CliError> {
    if run.no_color {
        colored::control::set_override(false);
    }
    print_banner();

    let mut catalog = Catalog::builtin();
    if let Some(path) = run.paths_file.as_deref() {
        let added = catalog
            .extend_from_file(path)
            .await
            .map_err(ScanError::from)?;
        info!(path, added, "loaded extra candidate paths");
    }

    let transport = TransportConfig {
        timeout: Duration::from_secs(run.timeout),
        user_agent: run.user_agent.clone(),
        follow_redirects: run.follow_redirects,
        header: run.header.clone(),
        proxy: run.proxy.clone(),
    };
    let scanner = Scanner::with_http(
        &transport,
        catalog,
        ScanOptions {
            concurrency: run.concurrency,
        },
    )?;
    let total = scanner.catalog().len();

    println!("{}", "=".repeat(RULE_WIDTH));
    format_kv_line("Target", &run.target);
    format_kv_line("Paths", &total.to_string());
    format_kv_line("Concurrency", &run.concurrency.to_string());
    format_kv_line("Timeout", &format!("{}s", run.timeout));
    format_kv_line("Redirects", format_bool(run.follow_redirects));
    if let Some(proxy) = run.proxy.as_deref() {
        format_kv_line("Proxy", proxy);
    }
    if let Some(path) = run.output.as_deref() {
        format_kv_line("Output", path);
    }
    println!("{}", "=".repeat(RULE_WIDTH));
    println!(
        "{}",
        format!("[*] Scanning {} for upload paths...", run.target).blue()
    );

    let pb = ProgressBar::new(total as u64);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(200));
    pb.set_style(
        ProgressStyle::with_template(
            ":: Progress: [{pos}/{len}] :: {per_sec} :: Duration: [{elapsed_precise}] ::",
        )
        .map_err(|e| format!("failed to build progress bar style: {e}"))?,
    );

    let (event_tx, event_rx) = mpsc::channel::<ProgressEvent>(1024);
    let render_handle = tokio::spawn(render_progress(pb.clone(), event_rx, run.quiet));

    let scanned = scanner
        .scan_until(&run.target, Some(event_tx), wait_for_ctrl_c())
        .await;
    join_renderer(render_handle).await;
    pb.finish_and_clear();

    let report = match scanned {
        Ok(report) => report,
        Err(e) => {
            if let ScanError::Interrupted { found, .. } = &e {
                println!(
                    "\n{}",
                    format!("[!] Scan interrupted by user ({found} results discarded)").red()
                );
            }
            return Err(e.into());
        }
    };

    println!();
    println!("{}", "=".repeat(RULE_WIDTH));
    if report.results.is_empty() {
        println!(
            "{}",
            "[!] No upload paths found. Try adding more paths with --paths-file.".yellow()
        );
    } else {
        println!(
            "{}",
            format!(
                "[+] Found {} potential upload paths:",
                report.results.len()
            )
            .green()
        );
        for url in report.results.iter() {
            println!("    {}", url);
        }
    }

    if let Some(path) = run.output.as_deref() {
        let rendered = output::render(&report, run.output_format)?;
        output::write_results(path, &rendered).await?;
        println!("\n{}", format!("[*] Results saved to {}", path).blue());
    }
    println!("{}", "=".repeat(RULE_WIDTH));

    println!();
    println!("{}", format_completion(&report));

    Ok(())
}

pub fn run_cli() -> Result<(), CliError> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = e.print();
                return Ok(());
            }
            _ => return Err(CliError::Failed(e.to_string())),
        },
    };

    init_tracing(args.verbose);

    let cfg = match args.config.as_deref() {
        Some(path) => config::load_config(&config::expand_tilde(path), false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(run.workers)
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
