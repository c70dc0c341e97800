//! Unit tests for CLI commands

use super::commands::{format_routes, serve_config};
use crate::cli::{Cli, Commands};
use crate::echo;
use crate::router::RouteBuilder;
use crate::runtime_config::RuntimeConfig;
use crate::server::{Protocol, ServerKind};
use clap::Parser;

#[test]
fn test_serve_command_with_flags() {
    let cli = Cli::try_parse_from([
        "switchyard",
        "serve",
        "--addr",
        "0.0.0.0:9000",
        "--server-kind",
        "maynet",
        "--protocol",
        "tcp",
    ])
    .unwrap();

    match cli.command {
        Commands::Serve {
            addr,
            server_kind,
            protocol,
        } => {
            assert_eq!(addr.as_deref(), Some("0.0.0.0:9000"));
            assert_eq!(server_kind, Some(ServerKind::MayNet));
            assert_eq!(protocol, Some(Protocol::Tcp));
        }
        _ => panic!("Expected Serve command"),
    }
}

#[test]
fn test_invalid_server_kind_is_rejected() {
    assert!(Cli::try_parse_from(["switchyard", "serve", "--server-kind", "netty"]).is_err());
}

#[test]
fn test_routes_command_and_global_log_level() {
    let cli = Cli::try_parse_from(["switchyard", "routes", "--log-level", "debug"]).unwrap();
    assert!(matches!(cli.command, Commands::Routes));
    assert_eq!(cli.log_level.as_deref(), Some("debug"));
}

#[test]
fn test_server_kind_flag_implies_its_protocol() {
    let config = serve_config(RuntimeConfig::default(), None, Some(ServerKind::MayNet), None);
    assert_eq!(config.server_kind, ServerKind::MayNet);
    assert_eq!(config.protocol, Protocol::Tcp);

    let config = serve_config(
        RuntimeConfig::default(),
        Some("127.0.0.1:0".to_string()),
        Some(ServerKind::MayNet),
        Some(Protocol::Http),
    );
    assert_eq!(config.addr, "127.0.0.1:0");
    assert_eq!(config.protocol, Protocol::Http);

    assert_eq!(
        serve_config(RuntimeConfig::default(), None, None, None),
        RuntimeConfig::default()
    );
}

#[test]
fn test_format_routes_lists_echo_actions() {
    let table = RouteBuilder::new().build(&echo::registry()).unwrap();
    let lines = format_routes(&table);
    assert!(lines
        .iter()
        .any(|l| l.starts_with("/echo/{id}") && l.contains("EchoGroup::by_id")));
    assert!(lines.iter().any(|l| l.starts_with("/error/404")));
}
