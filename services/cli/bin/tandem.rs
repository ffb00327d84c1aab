//! Main Entrypoint for the Tandem CLI
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Constructing the HTTP client and session orchestrator.
//! 4. Running the interactive loop: language selection, scenario
//!    negotiation, conversation, and the concluding summary.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

use tandem_cli::config::Config;
use tandem_cli::ui;
use tandem_core::api::HttpTutorClient;
use tandem_core::error::SessionError;
use tandem_core::locale::fallback_languages;
use tandem_core::scenario::is_valid_difficulty;
use tandem_core::session::{Phase, SessionOrchestrator};

type Input = Lines<BufReader<Stdin>>;

/// Prints a prompt and reads one trimmed line. `None` means end of input.
async fn prompt(input: &mut Input, text: &str) -> anyhow::Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(input.next_line().await?.map(|line| line.trim().to_string()))
}

/// Prints a session error without aborting the loop.
fn report(error: &SessionError) {
    match error {
        SessionError::RequestInFlight => {
            println!("Still waiting on the previous request.");
        }
        SessionError::EmptyInput(what) => println!("Please enter a {}.", what),
        other => println!("Error: {}", other),
    }
}

async fn select_scenario(
    orchestrator: &SessionOrchestrator,
    config: &Config,
    input: &mut Input,
) -> anyhow::Result<bool> {
    let languages = match orchestrator.languages().await {
        Ok(languages) => languages.to_vec(),
        Err(e) => {
            warn!(error = %e, "locale catalog unavailable, using the built-in fallback");
            fallback_languages()
        }
    };

    println!("\nWhich language would you like to practice?");
    print!("{}", ui::language_menu(&languages));
    let locale = loop {
        let Some(answer) = prompt(
            input,
            &format!("Locale [{}]: ", config.default_locale),
        )
        .await?
        else {
            return Ok(false);
        };
        if answer.is_empty() {
            break config.default_locale.clone();
        }
        if let Some(code) = answer
            .parse::<usize>()
            .ok()
            .and_then(|n| ui::language_menu_choice(&languages, n))
        {
            break code.to_string();
        }
        println!("Pick a number from the list, or press Enter for the default.");
    };

    println!("\nHow challenging should it be?");
    print!("{}", ui::difficulty_menu());
    let difficulty = loop {
        let Some(answer) = prompt(
            input,
            &format!("Difficulty [{}]: ", config.default_difficulty),
        )
        .await?
        else {
            return Ok(false);
        };
        if answer.is_empty() {
            break config.default_difficulty.clone();
        }
        let upper = answer.to_uppercase();
        if is_valid_difficulty(&upper) {
            break upper;
        }
        println!("Enter a CEFR level from A1 to C2.");
    };

    let Some(theme) = prompt(input, "Anything you'd like the scenario to involve? ").await?
    else {
        return Ok(false);
    };
    let preferences = (!theme.is_empty()).then_some(theme);

    println!("Generating a scenario...");
    if let Err(e) = orchestrator.generate(&locale, &difficulty, preferences).await {
        report(&e);
        orchestrator.clear_error();
    }
    Ok(true)
}

async fn negotiate(
    orchestrator: &SessionOrchestrator,
    input: &mut Input,
) -> anyhow::Result<bool> {
    let session = orchestrator.snapshot();
    if let Some(proposal) = session.proposal() {
        print!("{}", ui::proposal_card(proposal));
    }
    let Some(answer) = prompt(input, "[a]ccept, [m]odify, [n]ew scenario, [q]uit: ").await?
    else {
        return Ok(false);
    };

    let result = match answer.as_str() {
        "a" | "accept" => orchestrator.accept(),
        "m" | "modify" => {
            let Some(request) = prompt(input, "What should change? ").await? else {
                return Ok(false);
            };
            println!("Reworking the scenario...");
            orchestrator.modify(&request).await
        }
        "n" | "new" => {
            let Some(reason) = prompt(input, "Why not this one? (optional) ").await? else {
                return Ok(false);
            };
            println!("Generating a different scenario...");
            orchestrator
                .request_new((!reason.is_empty()).then_some(reason))
                .await
        }
        "q" | "quit" => return Ok(false),
        _ => {
            println!("Choose a, m, n, or q.");
            return Ok(true);
        }
    };

    match result {
        Ok(session) if session.phase() == Phase::Conversing => {
            if let Some(opening) = session.conversation().history().first() {
                println!("\n{}", opening.content);
            }
        }
        Ok(_) => {}
        Err(e) => {
            report(&e);
            orchestrator.clear_error();
        }
    }
    Ok(true)
}

async fn converse(
    orchestrator: &SessionOrchestrator,
    input: &mut Input,
) -> anyhow::Result<bool> {
    let Some(line) = prompt(input, "\nYou> ").await? else {
        return Ok(false);
    };
    match line.as_str() {
        "/quit" => return Ok(false),
        "/new" => {
            if let Err(e) = orchestrator.new_session() {
                report(&e);
            }
            return Ok(true);
        }
        _ => {}
    }

    match orchestrator.send_message(&line).await {
        Ok(session) => {
            if let Some(reply) = session.conversation().history().last() {
                println!("\n{}", reply.content);
            }
            let tips = ui::tips_block(session.conversation().tips());
            if !tips.is_empty() {
                println!("\nTutor tips:\n{}", tips);
            }
        }
        Err(e) => {
            report(&e);
            orchestrator.clear_error();
        }
    }
    Ok(true)
}

async fn conclude(
    orchestrator: &SessionOrchestrator,
    input: &mut Input,
) -> anyhow::Result<bool> {
    let session = orchestrator.snapshot();
    if let Some(proposal) = session.proposal() {
        print!("{}", ui::conversation_recap(proposal, session.conversation()));
    }
    let Some(answer) = prompt(input, "Press Enter for a new session, or q to quit: ").await?
    else {
        return Ok(false);
    };
    if answer == "q" || answer == "quit" {
        return Ok(false);
    }
    if let Err(e) = orchestrator.new_session() {
        report(&e);
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!(api = %config.api_base_url, "Configuration loaded.");

    // --- 3. Initialize the Orchestrator ---
    let api = Arc::new(HttpTutorClient::new(
        &config.api_base_url,
        config.access_token.clone(),
    ));
    let orchestrator = SessionOrchestrator::new(api);

    // --- 4. Interactive Loop ---
    println!("Tandem: practice conversations with an AI language partner.");
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let keep_going = match orchestrator.snapshot().phase() {
            Phase::Selecting => select_scenario(&orchestrator, &config, &mut input).await?,
            Phase::Proposed => negotiate(&orchestrator, &mut input).await?,
            Phase::Conversing => converse(&orchestrator, &mut input).await?,
            Phase::Concluded => conclude(&orchestrator, &mut input).await?,
        };
        if !keep_going {
            break;
        }
    }

    println!("À bientôt!");
    Ok(())
}
