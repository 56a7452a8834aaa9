#![deny(unsafe_code)]

//! avahi-compat CLI: browse, resolve, query, and publish through
//! systemd-resolved.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use avahi_compat_core::types::dns;
use avahi_compat_core::{
    BrowserEvent, Client, EntryGroup, Protocol, RecordBrowser, RecordEvent, ResolvedService,
    ResolverEvent, ServiceBrowser, ServiceDefinition, ServiceResolver, TextList,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Avahi-style service discovery on top of systemd-resolved.
#[derive(Parser)]
#[command(name = "avahi-compat", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "avahi-compat.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProtocolArg {
    Inet,
    Inet6,
    Any,
}

impl From<ProtocolArg> for Protocol {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Inet => Protocol::Inet,
            ProtocolArg::Inet6 => Protocol::Inet6,
            ProtocolArg::Any => Protocol::Unspec,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Browse for services of a type until interrupted.
    Browse {
        #[arg(default_value = "_http._tcp")]
        service_type: String,

        #[arg(long, default_value = "local")]
        domain: String,

        /// Resolve every service as it appears.
        #[arg(long)]
        resolve: bool,
    },

    /// Resolve one service instance.
    Resolve {
        name: String,

        service_type: String,

        #[arg(long, default_value = "local")]
        domain: String,

        #[arg(long, value_enum, default_value = "any")]
        protocol: ProtocolArg,
    },

    /// Look up raw DNS records.
    Query {
        name: String,

        /// Record type name (A, AAAA, TXT, SRV, PTR, ...) or number.
        #[arg(long = "type", default_value = "A")]
        rr_type: String,

        #[arg(long, default_value_t = dns::CLASS_IN)]
        class: u16,
    },

    /// Publish a service until interrupted.
    Publish {
        #[arg(long, default_value = "My Test Service")]
        name: String,

        #[arg(long = "type", default_value = "_http._tcp")]
        service_type: String,

        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// TXT entry as key=value or a bare key; repeatable.
        #[arg(long)]
        txt: Vec<String>,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    let filter = match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
        Commands::Browse {
            service_type,
            domain,
            resolve,
        } => cmd_browse(config, &service_type, &domain, resolve).await?,
        Commands::Resolve {
            name,
            service_type,
            domain,
            protocol,
        } => cmd_resolve(config, &name, &service_type, &domain, protocol.into()).await?,
        Commands::Query {
            name,
            rr_type,
            class,
        } => cmd_query(config, &name, &rr_type, class).await?,
        Commands::Publish {
            name,
            service_type,
            port,
            txt,
        } => cmd_publish(config, &name, &service_type, port, &txt).await?,
    }

    Ok(())
}

async fn start_client(config: avahi_compat_config::AppConfig) -> Result<Client> {
    let mut client = Client::new(config);
    client
        .start()
        .await
        .context("cannot reach systemd-resolved")?;
    Ok(client)
}

async fn cmd_browse(
    config: avahi_compat_config::AppConfig,
    service_type: &str,
    domain: &str,
    resolve: bool,
) -> Result<()> {
    let client = start_client(config).await?;
    let mut browser = ServiceBrowser::new(service_type).domain(domain);
    let mut events = browser.subscribe();
    browser.attach(&client).await?;
    info!(service_type, "Browsing, press Ctrl-C to stop");

    let mut resolutions = tokio::task::JoinSet::new();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    BrowserEvent::New(svc) => {
                        println!(
                            "NEW: {} ({}) in {} [if {} {}]",
                            svc.name, svc.service_type, svc.domain, svc.interface, svc.protocol
                        );
                        if resolve {
                            let mut resolver = ServiceResolver::for_instance(&svc);
                            let mut found = resolver.subscribe();
                            match resolver.attach(&client) {
                                Ok(()) => {
                                    resolutions.spawn(async move {
                                        let _resolver = resolver;
                                        if let Some(event) = found.recv().await {
                                            print_resolution(&event);
                                        }
                                    });
                                }
                                Err(e) => warn!(name = %svc.name, error = %e, "Cannot start resolve"),
                            }
                        }
                    }
                    BrowserEvent::Remove(svc) => {
                        println!("REMOVED: {} ({}) in {}", svc.name, svc.service_type, svc.domain);
                    }
                    BrowserEvent::CacheExhausted => {}
                    BrowserEvent::AllForNow => println!("ALL_FOR_NOW"),
                    BrowserEvent::Failure(e) => {
                        println!("FAILURE: {e}");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    resolutions.abort_all();
    Ok(())
}

fn print_resolution(event: &ResolverEvent) {
    match event {
        ResolverEvent::Found(svc) => println!("RESOLVED: {}", describe(svc)),
        ResolverEvent::Failure(e) => println!("RESOLVE FAILED: {e}"),
    }
}

fn describe(svc: &ResolvedService) -> String {
    let address = svc
        .address
        .map(|a| a.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} at {address}:{} (host: {})",
        svc.name, svc.port, svc.host_name
    )
}

async fn cmd_resolve(
    config: avahi_compat_config::AppConfig,
    name: &str,
    service_type: &str,
    domain: &str,
    protocol: Protocol,
) -> Result<()> {
    let client = start_client(config).await?;
    let mut resolver = ServiceResolver::new(name, service_type)
        .domain(domain)
        .address_protocol(protocol);
    let mut events = resolver.subscribe();
    resolver.attach(&client)?;

    match events.recv().await {
        Some(ResolverEvent::Found(svc)) => {
            println!("RESOLVED: {}", describe(&svc));
            if !svc.txt.is_empty() {
                println!("TXT: {}", svc.txt);
            }
            Ok(())
        }
        Some(ResolverEvent::Failure(e)) => Err(e.into()),
        None => anyhow::bail!("resolver closed without a result"),
    }
}

async fn cmd_query(
    config: avahi_compat_config::AppConfig,
    name: &str,
    rr_type: &str,
    class: u16,
) -> Result<()> {
    let rr_type = dns::type_from_str(rr_type)
        .with_context(|| format!("unknown record type '{rr_type}'"))?;
    let client = start_client(config).await?;

    let mut query = RecordBrowser::new(name, rr_type).class(class);
    let mut events = query.subscribe();
    query.attach(&client).await?;

    while let Ok(event) = events.try_recv() {
        match event {
            RecordEvent::New(record) => println!(
                "{} class={} type={} size={}: {}",
                record.name,
                record.class,
                record.rr_type,
                record.size(),
                hex(&record.rdata)
            ),
            RecordEvent::AllForNow => println!("ALL_FOR_NOW"),
        }
    }
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

async fn cmd_publish(
    config: avahi_compat_config::AppConfig,
    name: &str,
    service_type: &str,
    port: u16,
    txt: &[String],
) -> Result<()> {
    let publish_config = config.publish.clone();
    let client = start_client(config).await?;

    let mut group = EntryGroup::new(&publish_config);
    group.attach(&client)?;
    let id = group.add_service(
        ServiceDefinition::new(name, service_type, port).txt_list(&txt_entries(txt)),
    )?;
    group.commit().await?;

    let path = group
        .service(id)?
        .artifact_path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    println!("PUBLISHED: {name} ({service_type}) port {port} as {path}");

    tokio::signal::ctrl_c().await?;
    group.reset().await?;
    println!("WITHDRAWN: {name}");
    Ok(())
}

fn txt_entries(items: &[String]) -> TextList {
    items.iter().map(String::as_str).collect()
}

fn cmd_config(
    config_path: &Path,
    config: &avahi_compat_config::AppConfig,
    show: bool,
) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

async fn load_config(path: &Path) -> Result<avahi_compat_config::AppConfig> {
    if path.exists() {
        avahi_compat_config::AppConfig::load(path)
            .await
            .map_err(|e| anyhow::anyhow!(e))
    } else {
        Ok(avahi_compat_config::AppConfig::default())
    }
}
