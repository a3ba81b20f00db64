//! Scorecard report CLI
//!
//! ```text
//! scorecard <dataset.json> <advisor|store|market> <scopeId> <YYYY-MM>
//! scorecard <dataset.json> advisor <advisorId> <YYYY-MM> --breakdown
//! scorecard <dataset.json> --unmapped <YYYY-MM>
//! ```
//!
//! Results are printed to stdout as pretty JSON; logs go to stderr.

use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use dotenvy::dotenv;
use scorecard::config::ServerConfig;
use scorecard::logging;
use scorecard::models::{CanonicalId, Period, Scope};
use scorecard::reconcile::ScorecardEngine;
use scorecard::services::InMemoryStore;
use tracing::info;

const USAGE: &str = "usage:
  scorecard <dataset.json> <advisor|store|market> <scopeId> <YYYY-MM>
  scorecard <dataset.json> advisor <advisorId> <YYYY-MM> --breakdown
  scorecard <dataset.json> --unmapped <YYYY-MM>";

#[derive(Debug)]
enum Command {
    Scorecard {
        scope: Scope,
        scope_id: CanonicalId,
        period: Period,
    },
    Breakdown {
        advisor_id: CanonicalId,
        period: Period,
    },
    Unmapped {
        period: Period,
    },
}

#[derive(Debug)]
struct CliArgs {
    dataset: PathBuf,
    command: Command,
}

fn parse_args(args: &[String]) -> Result<CliArgs, Box<dyn std::error::Error>> {
    let breakdown = args.iter().any(|a| a == "--breakdown");
    let unmapped = args.iter().any(|a| a == "--unmapped");
    let positional: Vec<&str> = args
        .iter()
        .filter(|a| !a.starts_with("--"))
        .map(String::as_str)
        .collect();

    let dataset = positional.first().ok_or(USAGE)?;

    let command = if unmapped {
        let period = positional.last().filter(|_| positional.len() >= 2).ok_or(USAGE)?;
        Command::Unmapped {
            period: period.parse()?,
        }
    } else {
        let [_, scope, scope_id, period] = positional.as_slice() else {
            return Err(USAGE.into());
        };
        let scope: Scope = scope.parse()?;
        let scope_id = CanonicalId::new(*scope_id);
        let period: Period = period.parse()?;
        if breakdown {
            if scope != Scope::Advisor {
                return Err("--breakdown requires advisor scope".into());
            }
            Command::Breakdown {
                advisor_id: scope_id,
                period,
            }
        } else {
            Command::Scorecard {
                scope,
                scope_id,
                period,
            }
        }
    };

    Ok(CliArgs {
        dataset: PathBuf::from(*dataset),
        command,
    })
}

fn run(args: CliArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env();
    let field_map = config.load_field_map()?;
    let store = Arc::new(InMemoryStore::from_path(&args.dataset)?);
    let engine = ScorecardEngine::new(store.clone(), store.clone(), store, &field_map);

    let output = match args.command {
        Command::Scorecard {
            scope,
            scope_id,
            period,
        } => {
            info!(scope = %scope, scope_id = %scope_id, period = %period, "Computing scorecard");
            serde_json::to_string_pretty(&engine.get_scorecard(scope, &scope_id, &period)?)?
        }
        Command::Breakdown { advisor_id, period } => {
            info!(advisor_id = %advisor_id, period = %period, "Computing multi-store breakdown");
            serde_json::to_string_pretty(&engine.get_multi_store_breakdown(&advisor_id, &period)?)?
        }
        Command::Unmapped { period } => {
            serde_json::to_string_pretty(&engine.unmapped_report(&period)?)?
        }
    };
    Ok(output)
}

fn main() {
    dotenv().ok();
    logging::init_cli_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let result = parse_args(&args).and_then(run);

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    }
}
