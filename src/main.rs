//! Storebot Runtime
//!
//! Entry point: CLI parsing, logging setup, collaborator wiring, and
//! the interactive chat / demo script surfaces.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use dialoguer::Input;

use storebot::agent::Orchestrator;
use storebot::config;
use storebot::error::TurnError;
use storebot::model::ChatCompletionsClient;
use storebot::session::SessionStore;
use storebot::shopify::ShopifyClient;
use storebot::types::{LogLevel, Role, TurnOutcome};

const VERSION: &str = "0.1.0";

/// Storebot -- Role-Aware Storefront Agent
#[derive(Parser, Debug)]
#[command(
    name = "storebot",
    version = VERSION,
    about = "Role-aware storefront support agent",
    long_about = "Routes each turn to a customer or admin agent; agents answer with \
                  read-only storefront tools scoped by role."
)]
struct Cli {
    /// Role for this session: customer or admin
    #[arg(long, default_value = "customer")]
    role: String,

    /// Run the fixed demo prompt script instead of interactive chat
    #[arg(long)]
    demo: bool,

    /// Resume an existing conversation thread by id
    #[arg(long)]
    thread: Option<String>,

    /// Show the current configuration and exit
    #[arg(long)]
    status: bool,
}

// ---- Demo Prompts -----------------------------------------------------------

const CUSTOMER_DEMO_PROMPTS: &[&str] = &[
    "I'm looking for summer dresses under $50.",
    "Do you have this product available in size medium?",
    "Can you recommend best-selling products right now?",
    "Where is my order #45821?",
    "How long does shipping take to California?",
    "What is your return and refund policy?",
    "Do you offer any discounts or promo codes?",
    "Is this product available in black color?",
    "Can you suggest products similar to this one?",
    "I received a damaged item. What should I do?",
];

const ADMIN_DEMO_PROMPTS: &[&str] = &[
    "Show me today's total sales and number of orders.",
    "What are my top 5 selling products this month?",
    "How many orders are currently unfulfilled?",
    "Which products are low in inventory?",
    "Show me sales performance for the last 7 days.",
    "Who are my top repeat customers?",
    "What is the average order value this month?",
    "List all refunded orders from this week.",
    "Which products have not sold in the last 30 days?",
    "Compare this month's sales with last month's sales.",
];

// ---- Status Command ---------------------------------------------------------

fn show_status() {
    let config = config::load_config();
    println!(
        r#"
=== STOREBOT STATUS ===
Store:      {}
Domain:     {}
Model:      {}
Model API:  {}
DB Path:    {}
Version:    {}
=======================
"#,
        config.store_name,
        if config.shopify_store_domain.is_empty() {
            "(unset)"
        } else {
            config.shopify_store_domain.as_str()
        },
        config.model,
        config.model_api_url,
        config::resolve_path(&config.db_path),
        VERSION,
    );
}

// ---- Turn Runner ------------------------------------------------------------

/// Send one user message through the orchestrator and render the
/// outcome as a user-facing answer string.
async fn run_query(
    orchestrator: &Orchestrator,
    user_input: &str,
    role: Role,
    thread_id: &str,
) -> String {
    match orchestrator.run_turn(role, thread_id, user_input).await {
        Ok(TurnOutcome { answer, .. }) => answer,
        Err(TurnError::SessionBusy(err)) => {
            format!("This conversation is still processing a previous message ({err}). Please retry in a moment.")
        }
        Err(err) => format!("System error: {err}"),
    }
}

async fn run_demo(orchestrator: &Orchestrator, role: Role) {
    let prompts = match role {
        Role::Admin => ADMIN_DEMO_PROMPTS,
        Role::Customer => CUSTOMER_DEMO_PROMPTS,
    };
    let thread_id = format!("demo-{role}-{}", short_id());

    println!("\n{}", "=".repeat(60));
    println!("  DEMO MODE — Role: {}", role.to_string().to_uppercase());
    println!("{}\n", "=".repeat(60));

    for (i, prompt) in prompts.iter().enumerate() {
        println!("[{}/{}] USER: {}", i + 1, prompts.len(), prompt.cyan());
        println!("{}", "-".repeat(50));
        let response = run_query(orchestrator, prompt, role, &thread_id).await;
        println!("ASSISTANT:\n{response}");
        println!("{}\n", "=".repeat(60));
    }
}

async fn run_interactive(orchestrator: &Orchestrator, role: Role, thread_id: String) {
    let mode = match role {
        Role::Customer => "Customer",
        Role::Admin => "Admin",
    };

    println!("\n{}", "=".repeat(60));
    println!("  Storebot — {mode} Mode");
    println!("  Thread ID: {thread_id}");
    println!("  Type 'exit' or 'quit' to end the session.");
    println!("{}\n", "=".repeat(60));

    loop {
        let user_input: String = match Input::new()
            .with_prompt(format!("{}", "You".green().bold()))
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            Err(_) => {
                println!("\nSession ended.");
                break;
            }
        };

        let trimmed = user_input.trim();
        if trimmed.is_empty() {
            continue;
        }
        if matches!(trimmed.to_lowercase().as_str(), "exit" | "quit" | "bye") {
            println!("Goodbye!");
            break;
        }

        let response = run_query(orchestrator, trimmed, role, &thread_id).await;
        println!("\n{}: {response}\n", "Assistant".blue().bold());
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

// ---- Wiring -----------------------------------------------------------------

fn build_orchestrator() -> Result<Orchestrator> {
    let config = config::load_config();
    config::validate(&config)?;

    let commerce = Arc::new(ShopifyClient::new(
        &config.shopify_store_domain,
        &config.shopify_api_version,
        &config.shopify_access_token,
    ));
    let model = Arc::new(ChatCompletionsClient::new(
        config.model_api_url.clone(),
        config.model_api_key.clone(),
        config.model.clone(),
        config.max_tokens_per_turn,
        Duration::from_secs(config.model_timeout_secs),
    ));
    let store = Arc::new(
        SessionStore::open(&config::resolve_path(&config.db_path))
            .context("failed to open session store")?,
    );

    Ok(Orchestrator::new(config, model, commerce, store))
}

fn init_tracing(level: &LogLevel) {
    let max_level = match level {
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Error => tracing::Level::ERROR,
    };
    tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_target(false)
        .init();
}

// ---- Entry Point -----------------------------------------------------------

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.status {
        show_status();
        return;
    }

    let role = match Role::from_str(&cli.role) {
        Ok(role) => role,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let config = config::load_config();
    init_tracing(&config.log_level);

    let orchestrator = match build_orchestrator() {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            eprintln!("{} {err}", "Configuration error:".red().bold());
            eprintln!("Set the missing values in ~/.storebot/storebot.json or the environment.");
            std::process::exit(1);
        }
    };

    if cli.demo {
        run_demo(&orchestrator, role).await;
    } else {
        let thread_id = cli
            .thread
            .unwrap_or_else(|| format!("session-{role}-{}", short_id()));
        run_interactive(&orchestrator, role, thread_id).await;
    }
}
