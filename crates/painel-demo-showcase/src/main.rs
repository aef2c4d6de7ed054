#![forbid(unsafe_code)]

//! Painel Demo Showcase binary entry point.

use painel_demo_showcase::app::{self, ScenarioConfig, ScreenId};
use painel_demo_showcase::cli;
use tracing_subscriber::EnvFilter;

fn main() {
    let opts = cli::Opts::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&opts.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let screens: Vec<ScreenId> = if opts.screen == 0 {
        ScreenId::ALL.to_vec()
    } else {
        match ScreenId::from_number(opts.screen) {
            Some(id) => vec![id],
            None => {
                eprintln!("No screen {}; see --help.", opts.screen);
                std::process::exit(1);
            }
        }
    };

    let config = ScenarioConfig {
        page_size: opts.page_size,
    };
    for id in screens {
        match app::run(id, &config) {
            Ok(transcript) => {
                println!("######## {}", id.title());
                for line in transcript.lines() {
                    println!("{line}");
                }
                println!();
            }
            Err(e) => {
                eprintln!("Scenario {} failed: {e}", id.title());
                std::process::exit(1);
            }
        }
    }
}
