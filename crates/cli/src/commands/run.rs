//! `codewright run` — single-task or interactive mode.

use codewright_agent::{
    AgentStreamEvent, ExecuteOptions, InteractiveSession, SessionNotice, TurnOutcome,
};
use codewright_config::AppConfig;
use codewright_core::event::DomainEvent;
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::wiring::{self, Wired};

pub async fn run(
    message: Option<String>,
    init: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if init {
        super::init::run(&wiring::workspace_root(&config))?;
        return Ok(ExitCode::SUCCESS);
    }

    if !config.has_api_key() && config.provider.name != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export OPENROUTER_API_KEY='sk-or-v1-...'   (recommended)");
        eprintln!("    export OPENAI_API_KEY='sk-...'             (for OpenAI direct)");
        eprintln!("    export CODEWRIGHT_API_KEY='sk-...'         (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let wired = wiring::wire(&config, progress_tx)?;
    tokio::spawn(render_progress(progress_rx));
    tokio::spawn(render_escalations(wired.events.subscribe()));

    let options = ExecuteOptions {
        timeout: Some(Duration::from_secs(config.session.timeout_secs)),
        stream: config.session.stream,
    };

    match message {
        Some(task) => single_task(&wired, &task, &options).await,
        None => interactive(&config, wired, options).await,
    }
}

async fn single_task(
    wired: &Wired,
    task: &str,
    options: &ExecuteOptions,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let outcome = wired.agent.execute(task, options, cancel).await;
    wired.session.teardown().await;

    match outcome? {
        TurnOutcome::Completed { message } => {
            println!("\n{message}");
            Ok(ExitCode::SUCCESS)
        }
        TurnOutcome::RoundLimit { rounds } => {
            eprintln!("  [Error] Stopped after {rounds} rounds without end_task");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn interactive(
    config: &AppConfig,
    wired: Wired,
    options: ExecuteOptions,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Codewright — Interactive Mode         ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:   {}", config.provider.name);
    println!("  Repository: {}", wired.root.display());
    let ladder: Vec<_> = config.models.iter().map(|t| t.model.as_str()).collect();
    println!("  Models:     {}", ladder.join(" → "));
    println!();
    println!("  Describe a task and press Enter.");
    println!(
        "  Ctrl+C cancels the running task; type '{}' to quit.",
        config.session.exit_keywords.join("' or '")
    );
    println!();
    prompt();

    let (line_tx, line_rx) = mpsc::channel(8);
    // Outside the runtime: a pending stdin read must not block shutdown
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if line_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    let (interrupt_tx, interrupt_rx) = mpsc::channel(4);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupt_tx.send(()).await.is_err() {
                break;
            }
        }
    });

    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(render_notices(notice_rx));

    let session = InteractiveSession::new(wired.agent.clone(), wired.events.clone())
        .with_options(options)
        .with_exit_keywords(config.session.exit_keywords.clone())
        .with_idle_timeout(Duration::from_secs(config.session.timeout_secs))
        .with_notices(notice_tx);

    let exit = session.run(line_rx, interrupt_rx).await;
    drop(session);
    let _ = printer.await;

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(if exit.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn prompt() {
    print!("  You > ");
    let _ = std::io::stdout().flush();
}

async fn render_notices(mut rx: mpsc::UnboundedReceiver<SessionNotice>) {
    while let Some(notice) = rx.recv().await {
        match notice {
            SessionNotice::Response(message) => {
                println!();
                for line in message.lines() {
                    println!("  Codewright > {line}");
                }
                println!();
                prompt();
            }
            SessionNotice::Cancelled => eprintln!("\n  [Cancelled] Re-submitting the same task..."),
            SessionNotice::TimedOut => eprintln!("\n  [Timeout] No activity, shutting down."),
            SessionNotice::Error(e) => {
                eprintln!("\n  [Error] {e}");
                println!();
                prompt();
            }
        }
    }
}

async fn render_progress(mut rx: mpsc::UnboundedReceiver<AgentStreamEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            AgentStreamEvent::Chunk { content } => {
                print!("{content}");
                let _ = std::io::stdout().flush();
            }
            AgentStreamEvent::Action { name, success, .. } => {
                let mark = if success { "✅" } else { "❌" };
                eprintln!("\n  {mark} {name}");
            }
            AgentStreamEvent::Phase { name, model } => {
                eprintln!("\n  ▶ Phase: {name} ({model})");
            }
            AgentStreamEvent::Done { .. } => println!(),
        }
    }
}

async fn render_escalations(
    mut rx: tokio::sync::broadcast::Receiver<std::sync::Arc<DomainEvent>>,
) {
    use tokio::sync::broadcast::error::RecvError;
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let DomainEvent::ModelEscalation {
                    target,
                    model,
                    changed: true,
                    count,
                    ..
                } = event.as_ref()
                {
                    eprintln!("  ⬆ {target} failed {count} time(s), switching to {model}");
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
}
