//! cmdlet-replay CLI

use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cmdlet_replay::config::Config;
use cmdlet_replay::fingerprint::{body_digest, fingerprint_request, short_hex};
use cmdlet_replay::network::MockHttpServer;
use cmdlet_replay::replay::Replayer;
use cmdlet_replay::storage::{SessionReader, SessionStore};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage();
        process::exit(1);
    }

    let result = match (args[1].as_str(), &args[2..]) {
        ("sessions", [file]) => list_sessions(Path::new(file)),
        ("show", [file, session]) => show_session(Path::new(file), session),
        ("serve", [config, session]) => serve(Path::new(config), session),
        ("sessions" | "show" | "serve", _) => {
            usage();
            process::exit(1);
        }
        (command, _) => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'cmdlet-replay' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn usage() {
    eprintln!("cmdlet-replay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: cmdlet-replay <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  sessions <file>                List recorded sessions");
    eprintln!("  show <file> <session>          List the messages of one session");
    eprintln!("  serve <config.toml> <session>  Serve one session until Ctrl-C");
}

fn list_sessions(file: &Path) -> anyhow::Result<()> {
    let reader = SessionReader::open(file)?;
    let collection = reader.read_collection()?;

    println!("Session file: {}", file.display());
    println!(
        "Sessions: {}, messages: {}, saved at: {}",
        reader.session_count(),
        reader.message_count(),
        reader.saved_at()
    );
    println!();

    for session in collection.iter() {
        println!(
            "  {:<40} {:>5} messages  ({})",
            session.name(),
            session.len(),
            session.validator()
        );
    }

    Ok(())
}

fn show_session(file: &Path, name: &str) -> anyhow::Result<()> {
    let session = SessionStore::new(file).load(name)?;

    println!("Session: {} ({} messages)", session.name(), session.len());
    if !session.base_uri().is_empty() {
        println!("Recorded against: {}", session.base_uri());
    }
    println!("Validator: {}", session.validator());
    println!();

    for message in session.messages() {
        println!(
            "  #{:<4} {:<7} {:<60} -> {}  [{}] {}",
            message.index,
            message.request.method,
            message.request.uri,
            message.response.status,
            short_hex(&fingerprint_request(&message.request)),
            body_digest(&message.response.body)
        );
    }

    Ok(())
}

fn serve(config_path: &Path, name: &str) -> anyhow::Result<()> {
    let config = Config::from_file(config_path)?;
    if config.mode.is_record() {
        bail!("serve replays recorded sessions; set mode = \"replay\"");
    }

    let session = SessionStore::new(&config.session_file)
        .load(name)
        .with_context(|| format!("Failed to load session '{name}'"))?;
    let replayer = Replayer::new(Arc::new(session));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let server = MockHttpServer::start(
            config.server.bind,
            &config.server.prefix,
            replayer,
            config.limits.clone(),
        )
        .await?;

        println!("Serving '{}' at {}", name, server.base_uri());
        tokio::signal::ctrl_c().await?;
        info!("Shutting down");

        let cursor = server.shutdown().await?;
        println!(
            "Served {} of {} recorded requests",
            cursor.position(),
            cursor.len()
        );
        if !cursor.is_exhausted() {
            bail!("{} recorded requests were never issued", cursor.remaining());
        }
        Ok::<(), anyhow::Error>(())
    })
}
