use std::process::exit;

use colored::Colorize;

use uploadbuster::app::{self, CliError};

fn main() {
    if let Err(e) = app::run_cli() {
        match &e {
            CliError::Interrupted { .. } => eprintln!("{} {}", "[!]".bold().red(), e),
            CliError::Failed(message) => {
                eprintln!("{} {}", "[!] Error:".bold().red(), message)
            }
        }
        exit(e.exit_code());
    }
}
