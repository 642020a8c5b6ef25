use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    CookflowClient, CookingController, DiscardNarrationSink, JsonFileRecipeSupply,
    MissingSpeechService, NarrationSink, RecipeSupply, SessionEvent, SpeechService,
};
use shared::domain::RecipeId;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod commands;
mod render;
mod sink;

use commands::{parse_command, Command, HELP};
use render::{describe_event, render_snapshot};
use sink::WavFileSink;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8443")]
    server_url: String,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Walk through a recipe step by step.
    Session {
        #[arg(long)]
        recipe: PathBuf,
        #[arg(long)]
        recipe_id: Option<Uuid>,
        /// Start with narration turned off.
        #[arg(long)]
        no_voice: bool,
        /// Do not call the speech endpoint at all.
        #[arg(long)]
        offline: bool,
        /// Save narration clips here instead of discarding them.
        #[arg(long)]
        narration_dir: Option<PathBuf>,
    },
    Subscribe {
        #[arg(long)]
        email: String,
    },
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Session {
            recipe,
            recipe_id,
            no_voice,
            offline,
            narration_dir,
        } => {
            let speech: Arc<dyn SpeechService> = if offline {
                Arc::new(MissingSpeechService)
            } else {
                Arc::new(CookflowClient::new(&cli.server_url)?)
            };
            let sink: Arc<dyn NarrationSink> = match narration_dir {
                Some(dir) => Arc::new(WavFileSink::create(dir).await?),
                None => Arc::new(DiscardNarrationSink),
            };
            let recipe = JsonFileRecipeSupply::new(recipe)
                .fetch_recipe(recipe_id.map(RecipeId))
                .await?;
            run_session(
                CookingController::new(recipe, speech, sink)?,
                !no_voice,
            )
            .await?;
        }
        CliCommand::Subscribe { email } => {
            let message = CookflowClient::new(&cli.server_url)?
                .subscribe_newsletter(&email)
                .await
                .context("newsletter subscription failed")?;
            println!("{message}");
        }
        CliCommand::Health => {
            CookflowClient::new(&cli.server_url)?
                .check_health()
                .await
                .context("server is not healthy")?;
            println!("ok");
        }
    }

    Ok(())
}

async fn run_session(controller: Arc<CookingController>, voice: bool) -> Result<()> {
    if !voice {
        controller.toggle_voice().await?;
    }
    let mut events = controller.subscribe_events();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", render_snapshot(&controller.snapshot().await));
    println!("type 'help' for commands");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let command = match parse_command(&line) {
                    Ok(command) => command,
                    Err(message) => {
                        println!("{message}");
                        continue;
                    }
                };
                if !execute(&controller, command).await {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(event) => {
                    let completed = matches!(event, SessionEvent::Completed(_));
                    if let Some(line) = describe_event(&event) {
                        println!("{line}");
                    }
                    if matches!(event, SessionEvent::StepChanged { .. }) {
                        println!("{}", render_snapshot(&controller.snapshot().await));
                    }
                    if completed {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "dropped session events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    controller.shutdown().await;
    Ok(())
}

/// Returns `false` when the session loop should stop.
async fn execute(controller: &CookingController, command: Command) -> bool {
    let result = match command {
        Command::Start => controller.start().await,
        Command::Next => controller.go_to_next_step().await,
        Command::Previous => controller.go_to_previous_step().await,
        Command::Jump(number) => controller.jump_to_step(number - 1).await,
        Command::TimerStart => controller.start_timer().await,
        Command::TimerPause => controller.pause_timer().await,
        Command::TimerReset => controller.reset_timer().await,
        Command::SkipGrace => controller.skip_grace_period().await,
        Command::Voice => controller.toggle_voice().await,
        Command::Finish => controller.finish().await.map(|_| ()),
        Command::Show => {
            println!("{}", render_snapshot(&controller.snapshot().await));
            Ok(())
        }
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Quit => return false,
    };

    if let Err(err) = result {
        println!("can't do that: {err}");
    }
    true
}
