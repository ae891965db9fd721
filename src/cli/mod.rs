mod daemon;

use anyhow::Result;
use console::style;
use std::sync::Arc;

use crate::core::llm::service::ModelService;
use crate::core::metrics::MetricsSampler;
use crate::core::paths;
use crate::core::settings::SettingsStore;
use crate::core::terminal::{self, print_error, print_info, print_link, print_status};
use crate::core::uplink::{EventHub, new_agent_registry};
use crate::core::workflows::WorkflowStore;
use crate::interfaces::web::{ApiServer, ApiServerConfig};
use crate::logging::SseMakeWriter;

const DEFAULT_API_HOST: &str = "127.0.0.1";
const DEFAULT_API_PORT: u16 = 3001;

fn print_help() {
    terminal::print_banner();

    println!(" {}", style("Core").bold());
    println!("   {}  Run the API server in the foreground", style("serve").green());
    println!();
    println!(" {}", style("Management").bold());
    println!("   {}  Manage the background daemon (start, stop, status)", style("gateway").green());
    println!("   {}  Follow real-time daemon logs", style("logs").green());
    println!();
    println!(" {}", style("Diagnostics").bold());
    println!("   {}  Print the installed version", style("version").green());
    println!();
    println!(
        " {} {} <command> [--api-host <host>] [--api-port <port>]\n",
        style("Usage:").bold(),
        style("nexa").green()
    );
}

/// `--api-host`/`--api-port` flags win over `API_PORT`/`PORT` env vars,
/// which win over the defaults.
pub(crate) fn parse_api_server_flags(
    args: &[String],
    start: usize,
    mut api_host: String,
    mut api_port: u16,
) -> (String, u16) {
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--api-port" => {
                if i + 1 < args.len() {
                    api_port = args[i + 1].parse().unwrap_or(DEFAULT_API_PORT);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--api-host" => {
                if i + 1 < args.len() {
                    api_host = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    (api_host, api_port)
}

fn port_from_env() -> Option<u16> {
    for var in ["API_PORT", "PORT"] {
        if let Ok(value) = std::env::var(var)
            && let Ok(port) = value.parse()
        {
            return Some(port);
        }
    }
    None
}

async fn serve(api_host: String, api_port: u16) -> Result<()> {
    let (log_tx, _) = tokio::sync::broadcast::channel::<String>(256);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(SseMakeWriter {
            sender: log_tx.clone(),
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    terminal::print_banner();

    let http = reqwest::Client::new();
    let settings = Arc::new(tokio::sync::RwLock::new(SettingsStore::load(
        paths::settings_file(),
    )));
    let events = EventHub::new();
    let metrics = MetricsSampler::new(paths::cache_dir(), events.clone());

    let uplink = settings.read().await.get().uplink.clone();
    if uplink.enabled {
        metrics.start(uplink.interval_ms);
        print_status("Uplink", &format!("broadcasting every {} ms", uplink.interval_ms));
    } else {
        print_info("Uplink disabled; metrics broadcasting is off.");
    }

    print_link("API Endpoint", &format!("http://{}:{}", api_host, api_port));
    println!();

    let server = ApiServer::new(ApiServerConfig {
        settings,
        models: Arc::new(ModelService::new(http.clone())),
        metrics,
        workflows: Arc::new(WorkflowStore::new()),
        agents: new_agent_registry(),
        events,
        log_tx,
        http,
        host: api_host,
        port: api_port,
    });
    server.run().await
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let run_dir = paths::run_dir();
    let pid_file = run_dir.join("nexa.pid");

    let api_host = DEFAULT_API_HOST.to_string();
    let api_port = port_from_env().unwrap_or(DEFAULT_API_PORT);

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "serve" => {
            let (api_host, api_port) = parse_api_server_flags(&args, 2, api_host, api_port);
            serve(api_host, api_port).await
        }
        "gateway" => {
            let sub_cmd = if args.len() > 2 { args[2].as_str() } else { "" };
            match sub_cmd {
                "start" => {
                    let (api_host, api_port) =
                        parse_api_server_flags(&args, 3, api_host, api_port);
                    daemon::gateway_start(&run_dir, &pid_file, &api_host, api_port).await
                }
                "stop" => daemon::gateway_stop(&pid_file).await,
                "status" => daemon::gateway_status(&pid_file).await,
                _ => {
                    print_error(
                        "Unknown or missing gateway command. Expected: start, stop, status",
                    );
                    print_help();
                    Ok(())
                }
            }
        }
        "logs" => daemon::follow_logs(&run_dir, &pid_file).await,
        "version" | "--version" | "-V" => {
            println!("nexa {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            print_error(&format!("Unknown command: {}", other));
            print_help();
            Ok(())
        }
    }
}
