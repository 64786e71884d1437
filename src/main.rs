use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;

use ability_engine::cli::Console;
use ability_engine::core::{AbilityResult, EngineConfig};
use ability_engine::logging;
use ability_engine::permissions::{encode, Ability, AbilityBuilder, Action, ParametrizedAction};

/// Exit code when the rule source is rejected
const EXIT_REJECTED: u8 = 2;

/// Evaluate a permission query against a JSON rule set
#[derive(Debug, Parser)]
#[command(name = "ability-check", version)]
struct Args {
    /// JSON file containing an array of permission rules
    #[arg(long)]
    rules: PathBuf,

    /// Action name
    #[arg(long)]
    action: String,

    /// Action parameter as key=value (value parsed as JSON when possible)
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, Value)>,

    /// Subject (resource type)
    #[arg(long)]
    subject: String,

    /// Restrict the query to one field
    #[arg(long)]
    field: Option<String>,

    /// JSON file with a record to evaluate rule conditions against
    #[arg(long)]
    record: Option<PathBuf>,

    /// Engine configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Write logs to this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{}`", raw))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Build the ability for a parsed rule source
fn build_ability(source: &Value, config: &EngineConfig) -> AbilityResult<Ability> {
    let mut builder = AbilityBuilder::with_config(config)?;
    builder.extend_from_json(source)?;
    Ok(builder.build())
}

/// Plain action without parameters, parametrized otherwise
fn query_action(name: &str, params: &[(String, Value)]) -> Action {
    if params.is_empty() {
        return Action::Plain(name.to_string());
    }
    let mut action = ParametrizedAction::new(name);
    for (key, value) in params {
        action = action.with_param(key.clone(), value.clone());
    }
    Action::Parametrized(action)
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::new(),
    };
    if args.json_logs {
        config.logging.json = true;
    }
    if let Some(dir) = &args.log_dir {
        config.logging.directory = Some(dir.clone());
    }
    let _guard = logging::init_logging(&config.logging)?;

    let console = Console::new();

    let source = fs::read_to_string(&args.rules)
        .with_context(|| format!("reading rules {}", args.rules.display()))?;
    let source: Value = serde_json::from_str(&source).context("parsing rules")?;
    let ability = match build_ability(&source, &config) {
        Ok(ability) => ability,
        Err(err) => {
            console.print_error(&err.to_string());
            return Ok(ExitCode::from(EXIT_REJECTED));
        }
    };
    tracing::info!(rules = ability.len(), "loaded rule set");

    let action = query_action(&args.action, &args.params);
    let field = args.field.as_deref();

    console.print_query(&encode(&action), &args.subject, field);
    console.print_separator();

    let allowed = match &args.record {
        Some(path) => {
            let record = fs::read_to_string(path)
                .with_context(|| format!("reading record {}", path.display()))?;
            let record: Value = serde_json::from_str(&record).context("parsing record")?;
            console.print_rule(ability.relevant_rule_for_record(&action, &args.subject, &record));
            ability.can_on_record(&action, &args.subject, &record, field)
        }
        None => {
            console.print_rule(ability.relevant_rule_for(&action, &args.subject));
            ability.can(&action, &args.subject, field)
        }
    };

    console.print_decision(allowed);

    Ok(if allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
