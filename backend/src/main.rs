use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use leafdoc::{AppConfig, DiagnosisContext};

fn usage() {
    eprintln!("Usage: leafdoc [--lang <code>] <image>...");
}

fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let mut locale: Option<String> = None;
    let mut images: Vec<PathBuf> = Vec::new();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--lang" | "-l" => match args.next() {
                Some(code) => locale = Some(code),
                None => {
                    usage();
                    return ExitCode::from(2);
                }
            },
            "--help" | "-h" => {
                usage();
                return ExitCode::SUCCESS;
            }
            _ => images.push(PathBuf::from(arg)),
        }
    }
    if images.is_empty() {
        usage();
        return ExitCode::from(2);
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    log::info!("Model: {}", config.model.path.display());

    let context = match DiagnosisContext::from_config(&config) {
        Ok(context) => context,
        Err(e) => {
            log::error!("Failed to load diagnosis context at startup: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut failures = 0usize;
    for path in &images {
        let body = match std::fs::read(path) {
            Ok(bytes) => match context.diagnose_bytes(&bytes, locale.as_deref()) {
                Ok(diagnosis) => serde_json::to_string_pretty(&diagnosis.to_response()),
                Err(e) => {
                    failures += 1;
                    serde_json::to_string_pretty(&e.to_response())
                }
            },
            Err(e) => {
                log::error!("Failed to read {}: {}", path.display(), e);
                failures += 1;
                serde_json::to_string_pretty(&leafdoc::ErrorResponse::new("No image provided"))
            }
        };
        match body {
            Ok(json) => println!("{}", json),
            Err(e) => log::error!("Failed to serialize response for {}: {}", path.display(), e),
        }
    }

    if failures == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
