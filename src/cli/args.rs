use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "uploadbuster",
    version,
    about = "upload endpoint discovery tool",
    long_about = "Uploadbuster probes a web host for well-known file-upload paths and reports the ones that look reachable.\n\nExamples:\n  uploadbuster https://target.tld\n  uploadbuster target.tld -o found.txt\n  uploadbuster https://target.tld -t 20 -T 8 --paths-file ./extra-paths.txt\n\nTip: Use --config to persist scan settings and keep CLI invocations short."
)]
pub struct CliArgs {
    #[arg(
        value_name = "URL",
        help = "Target website URL (http:// is assumed when no scheme is given)."
    )]
    pub url: String,

    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Save discovered URLs to a file (one per line)."
    )]
    pub output: Option<String>,

    #[arg(
        long = "of",
        visible_alias = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output file format: text or json (inferred from the file extension when omitted)."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'c',
        long = "clr",
        visible_alias = "color",
        help_heading = "Output",
        help = "Enable colored output (overrides --no-color)."
    )]
    pub color: bool,

    #[arg(
        short = 'n',
        long = "nc",
        visible_alias = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'q',
        long = "qt",
        visible_alias = "quiet",
        help_heading = "Output",
        help = "Only print FOUND and POSSIBLE lines."
    )]
    pub quiet: bool,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.uploadbuster/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'P',
        long = "pf",
        visible_alias = "paths-file",
        value_name = "FILE",
        help_heading = "Input",
        help = "Extra candidate paths to probe after the built-in list (one per line)."
    )]
    pub paths_file: Option<String>,

    #[arg(
        short = 't',
        long = "cnc",
        visible_alias = "concurrency",
        value_name = "N",
        help_heading = "Performance",
        help = "Max in-flight probes during scanning."
    )]
    pub concurrency: Option<usize>,

    #[arg(
        short = 'w',
        long = "wrk",
        visible_alias = "workers",
        value_name = "N",
        help_heading = "Performance",
        help = "Number of runtime worker threads."
    )]
    pub workers: Option<usize>,

    #[arg(
        short = 'T',
        long = "to",
        visible_alias = "timeout",
        value_name = "SECONDS",
        help_heading = "HTTP",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'p',
        long = "px",
        visible_alias = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "HTTP proxy URL (e.g. http://127.0.0.1:8080)."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 'H',
        long = "hdr",
        visible_alias = "header",
        value_name = "HEADER",
        help_heading = "HTTP",
        help = "Add a header to all requests (format: 'Key: Value')."
    )]
    pub header: Option<String>,

    #[arg(
        short = 'A',
        long = "ua",
        visible_alias = "user-agent",
        value_name = "AGENT",
        help_heading = "HTTP",
        help = "Override the browser-like User-Agent."
    )]
    pub user_agent: Option<String>,

    #[arg(
        long = "nr",
        visible_alias = "no-redirects",
        help_heading = "HTTP",
        help = "Do not follow HTTP redirects."
    )]
    pub no_redirects: bool,
}
