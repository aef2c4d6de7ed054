#![forbid(unsafe_code)]

//! Command-line argument parsing for the demo showcase.
//!
//! Parses args manually to keep the binary lean.
//! Supports environment variable overrides via `PAINEL_DEMO_*` prefix.

use std::env;
use std::process;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
Painel Demo Showcase: scripted admin-dashboard sessions

USAGE:
    painel-demo-showcase [OPTIONS]

OPTIONS:
    --screen=N           Run only screen N, 1-indexed (default: all)
    --page-size=N        Rows per page on list screens (default: 10)
    --log=FILTER         Log filter when RUST_LOG is unset (default: info)
    --help, -h           Show this help message
    --version, -V        Show version

SCREENS:
    1  Cuisines           Search, status filter, pagination, stale reloads
    2  Additive item      Conditional quantity rules, save, edit, not found
    3  Registration       Password confirmation and duplicate e-mail

ENVIRONMENT VARIABLES:
    PAINEL_DEMO_SCREEN        Override --screen
    PAINEL_DEMO_PAGE_SIZE     Override --page-size
    RUST_LOG                  Log filter (takes precedence over --log)";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    /// Screen to run (1-indexed); 0 runs every screen.
    pub screen: u16,
    /// Rows per page on list screens.
    pub page_size: usize,
    /// Fallback log filter.
    pub log_filter: String,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            screen: 0,
            page_size: 10,
            log_filter: "info".into(),
        }
    }
}

impl Opts {
    /// Parse command-line arguments and environment variables.
    ///
    /// Environment variables take precedence over defaults but are overridden
    /// by explicit command-line flags.
    pub fn parse() -> Self {
        let mut opts = Self::default();

        if let Ok(val) = env::var("PAINEL_DEMO_SCREEN")
            && let Ok(n) = val.parse()
        {
            opts.screen = n;
        }
        if let Ok(val) = env::var("PAINEL_DEMO_PAGE_SIZE")
            && let Ok(n) = val.parse()
        {
            opts.page_size = n;
        }

        let args: Vec<String> = env::args().skip(1).collect();
        match opts.apply_args(&args) {
            Ok(Some(exit)) => {
                println!("{exit}");
                process::exit(0);
            }
            Ok(None) => opts,
            Err(message) => {
                eprintln!("{message}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    /// Apply `args` on top of the current values.
    ///
    /// Returns `Ok(Some(text))` when the program should print `text` and
    /// exit, `Err` on invalid input.
    pub fn apply_args(&mut self, args: &[String]) -> Result<Option<String>, String> {
        for arg in args {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Some(HELP_TEXT.to_string())),
                "--version" | "-V" => {
                    return Ok(Some(format!("painel-demo-showcase {VERSION}")));
                }
                other => {
                    if let Some(val) = other.strip_prefix("--screen=") {
                        self.screen = val
                            .parse()
                            .map_err(|_| format!("Invalid --screen value: {val}"))?;
                    } else if let Some(val) = other.strip_prefix("--page-size=") {
                        self.page_size = val
                            .parse()
                            .ok()
                            .filter(|n| *n > 0)
                            .ok_or_else(|| format!("Invalid --page-size value: {val}"))?;
                    } else if let Some(val) = other.strip_prefix("--log=") {
                        self.log_filter = val.to_string();
                    } else {
                        return Err(format!("Unknown argument: {other}"));
                    }
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_opts() {
        let opts = Opts::default();
        assert_eq!(opts.screen, 0);
        assert_eq!(opts.page_size, 10);
        assert_eq!(opts.log_filter, "info");
    }

    #[test]
    fn flags_override_values() {
        let mut opts = Opts::default();
        let exit = opts
            .apply_args(&args(&["--screen=2", "--page-size=5", "--log=debug"]))
            .unwrap();
        assert_eq!(exit, None);
        assert_eq!(opts.screen, 2);
        assert_eq!(opts.page_size, 5);
        assert_eq!(opts.log_filter, "debug");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut opts = Opts::default();
        assert!(opts.apply_args(&args(&["--page-size=0"])).is_err());
        assert!(opts.apply_args(&args(&["--screen=x"])).is_err());
        assert!(opts.apply_args(&args(&["--bogus"])).is_err());
    }

    #[test]
    fn help_and_version_exit() {
        let mut opts = Opts::default();
        let help = opts.apply_args(&args(&["-h"])).unwrap().unwrap();
        assert!(help.contains("PAINEL_DEMO_SCREEN"));
        let version = opts.apply_args(&args(&["-V"])).unwrap().unwrap();
        assert!(version.ends_with(VERSION));
    }

    #[test]
    fn help_screen_count_matches_all() {
        let screen_count = HELP_TEXT
            .lines()
            .filter(|line| {
                let trimmed = line.trim();
                trimmed
                    .split_whitespace()
                    .next()
                    .is_some_and(|tok| tok.parse::<u16>().is_ok())
                    && trimmed.len() > 5
            })
            .count();
        assert_eq!(screen_count, crate::app::ScreenId::ALL.len());
    }
}
