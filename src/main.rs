use clap::{Arg, ArgAction, ArgMatches, Command};
use formpilot::core::{Config, SessionProvider};
use formpilot::launcher::{self, RemoteRunner};
use formpilot::server::{create_router, ServerState};
use formpilot::RunPlan;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let plan_arg = Arg::new("plan")
        .long("plan")
        .value_name("FILE")
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
        .help("JSON run plan listing the forms to fill");

    let config_arg = Arg::new("config")
        .long("config")
        .value_name("FILE")
        .global(true)
        .value_parser(clap::value_parser!(PathBuf))
        .help("Optional JSON configuration file; environment variables override it");

    Command::new("formpilot")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Fills and submits web forms with a direct, act and agent fallback chain")
        .subcommand_required(true)
        .arg(config_arg)
        .subcommand(
            Command::new("run")
                .about("Run a plan once and print the results as JSON")
                .arg(plan_arg.clone())
                .arg(
                    Arg::new("headless")
                        .long("headless")
                        .help("Run the local browser in headless mode")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("serve")
                .about("Serve the dashboard API")
                .arg(plan_arg)
                .arg(
                    Arg::new("bind")
                        .long("bind")
                        .value_name("ADDR")
                        .default_value("127.0.0.1:3000")
                        .help("Address to listen on"),
                ),
        )
        .subcommand(Command::new("config").about("Print the runtime summary"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("formpilot=info")),
        )
        .init();

    let matches = cli().get_matches();
    let Some((command, sub)) = matches.subcommand() else {
        return Ok(());
    };
    let mut config = Config::load(sub.get_one::<PathBuf>("config").map(PathBuf::as_path))?;

    match command {
        "run" => run(&mut config, sub).await,
        "serve" => serve(config, sub).await,
        _ => {
            println!("{}", serde_json::to_string_pretty(&config.runtime_summary())?);
            Ok(())
        }
    }
}

fn load_plan(matches: &ArgMatches) -> anyhow::Result<RunPlan> {
    let path = matches
        .get_one::<PathBuf>("plan")
        .ok_or_else(|| anyhow::anyhow!("--plan is required"))?;
    Ok(RunPlan::from_file(path)?)
}

async fn run(config: &mut Config, matches: &ArgMatches) -> anyhow::Result<()> {
    if matches.get_flag("headless") {
        config.browser.headless = true;
    }
    let plan = load_plan(matches)?;
    info!(
        "Running {} form(s) in {:?} mode",
        plan.forms.len(),
        config.environment()
    );

    let outcome = launcher::run_plan(config, &plan).await.map_err(|e| {
        if e.is_session_error() {
            anyhow::anyhow!("No browser session, no forms were run: {}", e)
        } else {
            e.into()
        }
    })?;

    let submitted = outcome
        .forms
        .iter()
        .filter(|r| r.submission_succeeded())
        .count();
    info!("{}/{} form(s) confirmed submitted", submitted, outcome.forms.len());

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn serve(config: Config, matches: &ArgMatches) -> anyhow::Result<()> {
    let plan = load_plan(matches)?;
    let bind = matches
        .get_one::<String>("bind")
        .cloned()
        .unwrap_or_else(|| "127.0.0.1:3000".to_string());

    let provider: Option<Arc<dyn SessionProvider>> = match launcher::session_provider(&config) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("Runs are disabled until credentials are set: {}", e);
            None
        }
    };
    let runner = Arc::new(RemoteRunner::new(config.clone()));
    let state = Arc::new(ServerState::new(config, plan, provider, runner));

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Dashboard API listening on http://{}", bind);
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn run_requires_a_plan() {
        assert!(cli().try_get_matches_from(["formpilot", "run"]).is_err());
        let matches = cli()
            .try_get_matches_from(["formpilot", "run", "--plan", "plans/fintrac_internal.json", "--headless"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert!(sub.get_flag("headless"));
    }
}
