/**
 * Chatline Replay Entry Point
 *
 * Loads a recorded traffic log and replays it through the reconciliation
 * engine, printing the message list after every dispatched event.
 */
use chatline::client::{
    EventReplayer, MemoryProcessLog, ProcessLog, ReconciliationEngine, ReplayOutcome, TrafficLog,
    TracingProcessLog,
};
use chatline::shared::{ChatConfig, EngineEvent, MessageSnapshot};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "chatline-replay", about = "Replay a recorded chat traffic log")]
struct Args {
    /// Traffic log file (JSON array of `{event, data}` entries)
    log: PathBuf,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Event name to skip; may be repeated
    #[arg(long = "skip", value_name = "EVENT")]
    skip: Vec<String>,

    /// Only print the final message list
    #[arg(long)]
    quiet: bool,

    /// Write the engine's processing steps as JSON to this file
    #[arg(long, value_name = "PATH")]
    dump_process_log: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ChatConfig::from_toml_str(&std::fs::read_to_string(path)?)?,
        None => ChatConfig::default(),
    };

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_filter.clone());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .with_writer(std::io::stderr)
        .init();

    let entries = TrafficLog::load(&args.log)?;
    tracing::info!("[REPLAY] Loaded {} entries from {}", entries.len(), args.log.display());

    let memory_log = Arc::new(MemoryProcessLog::new());
    let process_log: Arc<dyn ProcessLog> = if args.dump_process_log.is_some() {
        memory_log.clone()
    } else {
        Arc::new(TracingProcessLog)
    };

    let mut engine = ReconciliationEngine::from_config(&config, process_log);
    let mut events = engine.subscribe();

    let mut skip = config.events_to_skip.clone();
    skip.extend(args.skip.iter().cloned());
    let mut replayer = EventReplayer::with_options(entries, skip, config.event_keys.clone());

    while let Some(step) = replayer.next(&mut engine) {
        match &step.outcome {
            ReplayOutcome::Applied(count) => {
                println!("[{}] {} ({} event(s))", step.index, step.event, count);
            }
            ReplayOutcome::Malformed(err) => {
                println!("[{}] {} skipped: {}", step.index, step.event, err);
            }
        }

        while let Ok(event) = events.try_recv() {
            match event {
                EngineEvent::Flash { id } => println!("  flash {}", id),
                EngineEvent::Typing(state) => println!("  typing {:?}", state),
                EngineEvent::Connection(state) => println!("  connection {:?}", state),
                EngineEvent::ChatCleared => println!("  chat cleared"),
                EngineEvent::Refresh { .. } => {}
            }
        }

        if !args.quiet {
            print_snapshot(&engine.snapshot());
        }
    }

    println!("Final message list:");
    print_snapshot(&engine.snapshot());

    if let Some(path) = &args.dump_process_log {
        std::fs::write(path, memory_log.to_json()?)?;
        tracing::info!("[REPLAY] Process log written to {}", path.display());
    }

    Ok(())
}

fn print_snapshot(snapshot: &MessageSnapshot) {
    for message in snapshot.iter() {
        let author = if message.is_bot { "bot" } else { "user" };
        let state = if message.is_finished { "" } else { " …" };
        println!(
            "  {:<24} {:<5} [{}] {}{}",
            message.id,
            author,
            message.kind.as_str(),
            message.text,
            state
        );
    }
}
