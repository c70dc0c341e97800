use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::bootstrap::Application;
use crate::echo;
use crate::logging;
use crate::router::{ParamSpec, RouteTable};
use crate::runtime_config::RuntimeConfig;
use crate::server::{Protocol, ServerKind};

/// Command-line interface for switchyard
#[derive(Debug, Parser)]
#[command(name = "switchyard", version, about = "Switchyard request-dispatch server", long_about = None)]
pub struct Cli {
    /// Log level override (trace/debug/info/warn/error)
    #[arg(long, global = true, env = "SWITCHYARD_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the demo echo handlers
    Serve {
        /// Address and port to bind the server to
        #[arg(long, env = "SWITCHYARD_ADDR")]
        addr: Option<String>,

        /// Transport backend: minihttp or maynet
        #[arg(long, env = "SWITCHYARD_SERVER_KIND")]
        server_kind: Option<ServerKind>,

        /// Wire protocol: http or tcp (defaults to the backend's own protocol)
        #[arg(long, env = "SWITCHYARD_PROTOCOL")]
        protocol: Option<Protocol>,
    },
    /// Print the route table of the demo handlers
    Routes,
}

/// Apply command-line overrides on top of the environment configuration.
pub(crate) fn serve_config(
    mut config: RuntimeConfig,
    addr: Option<String>,
    server_kind: Option<ServerKind>,
    protocol: Option<Protocol>,
) -> RuntimeConfig {
    if let Some(addr) = addr {
        config.addr = addr;
    }
    if let Some(kind) = server_kind {
        config.server_kind = kind;
        config.protocol = kind.default_protocol();
    }
    if let Some(protocol) = protocol {
        config.protocol = protocol;
    }
    config
}

fn describe_param(spec: &ParamSpec) -> String {
    let mut text = format!("{}:{}<{}>", spec.source, spec.alias, spec.target_type);
    if let Some(element) = spec.element_type {
        text.push_str(&format!("[{element}]"));
    }
    if spec.optional {
        text.push('?');
    }
    text
}

/// One line per route: URI, methods, handler and parameters.
pub(crate) fn format_routes(table: &RouteTable) -> Vec<String> {
    table
        .routes()
        .map(|route| {
            let params: Vec<String> = route.params().iter().map(describe_param).collect();
            format!(
                "{:<24} {:<12} {:<28} {}",
                route.uri(),
                route.allow_header(),
                route.qualified_name(),
                params.join(" ")
            )
        })
        .collect()
}

/// Execute the parsed command.
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    logging::init_logging(cli.log_level.as_deref())?;
    match cli.command {
        Commands::Serve {
            addr,
            server_kind,
            protocol,
        } => {
            let config = serve_config(RuntimeConfig::from_env(), addr, server_kind, protocol);
            let running = Application::new(echo::registry())
                .with_config(config)
                .run()?;
            #[cfg(unix)]
            crate::server::signals::install(running.server().clone())
                .context("Failed to install signal handlers")?;
            info!(addr = %running.local_addr(), "Serving demo handlers");
            running.join()?;
            Ok(())
        }
        Commands::Routes => {
            let table = Application::new(echo::registry())
                .build_routes()
                .context("Failed to build route table")?;
            for line in format_routes(&table) {
                println!("{line}");
            }
            Ok(())
        }
    }
}
