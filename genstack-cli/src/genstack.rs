//! Thin wrapper binary that delegates to genstack-cli.
//!
//! `cargo install` produces both `genstack` and `genstack-cli`, so the
//! short name works in agents and subshells without shell aliases.

use std::env;
use std::process::{Command, exit};

fn main() {
    let Ok(current_exe) = env::current_exe() else {
        eprintln!("Failed to determine current executable path");
        exit(1);
    };
    let Some(bin_dir) = current_exe.parent() else {
        eprintln!("Failed to determine installation directory");
        exit(1);
    };

    let cli_path = bin_dir.join(if cfg!(windows) {
        "genstack-cli.exe"
    } else {
        "genstack-cli"
    });

    let args: Vec<String> = env::args().skip(1).collect();
    let status = Command::new(&cli_path).args(&args).status();

    match status {
        Ok(status) => exit(status.code().unwrap_or(1)),
        Err(err) => {
            eprintln!("Failed to execute genstack-cli: {err}");
            eprintln!("Expected at: {}", cli_path.display());
            exit(1);
        }
    }
}
