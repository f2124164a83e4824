//! succulent-cli: command-line client for the succulent identifier API
//!
//! # Subcommands
//! - `identify <image> [--json]`               : upload a photo for identification
//! - `history [-n <limit>] [--offset n] [--json]`: list past identifications
//! - `show <id> [--chat] [--json]`             : one identification, optionally with its chat
//! - `chat <id> <message>`                     : ask about an identified plant
//! - `status`                                  : show server health

use std::path::Path;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";
const DEFAULT_LIMIT: u32 = 20;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "succulent-cli",
    version,
    about = "Identify succulents and browse identification history"
)]
struct Cli {
    /// API server URL (overrides SUCCULENT_URL env var)
    #[arg(long, env = "SUCCULENT_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Upload an image and identify the plant
    Identify {
        /// Path to a .jpg, .jpeg or .png image
        image: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// List past identifications, newest first
    History {
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,

        #[arg(long, default_value_t = 0)]
        offset: u32,

        #[arg(long)]
        json: bool,
    },

    /// Show one identification
    Show {
        id: String,

        /// Include the chat conversation
        #[arg(long)]
        chat: bool,

        #[arg(long)]
        json: bool,
    },

    /// Ask a question about an identified plant
    Chat { id: String, message: String },

    /// Show server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct Plant {
    pub genus: String,
    pub species: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
pub struct Care {
    pub sunlight: String,
    pub watering: String,
    pub soil: String,
    pub notes: String,
    pub trivia: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Identified {
    pub id: String,
    pub plant: Plant,
    pub care: Care,
}

#[derive(Debug, Deserialize)]
pub struct HistoryItem {
    pub id: String,
    pub genus: String,
    pub species: Option<String>,
    pub confidence: f64,
    pub image_path: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryPage {
    pub items: Vec<HistoryItem>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryDetail {
    pub id: String,
    pub genus: String,
    pub species: Option<String>,
    pub confidence: f64,
    pub image_path: String,
    pub care_guide: Option<Care>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub message: String,
    pub sender: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryWithChat {
    pub identification: HistoryDetail,
    pub chat_messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatReply {
    pub message: String,
    pub message_id: String,
}

// ============================================================================
// Rendering (pure)
// ============================================================================

pub fn confidence_percent(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}

/// Server error bodies are `{error, message}`; anything else is shown raw.
pub fn error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(e) => format!("{} ({}): {}", e.error, status, e.message),
        Err(_) if body.trim().is_empty() => format!("server returned HTTP {}", status),
        Err(_) => format!("server returned HTTP {}: {}", status, body.trim()),
    }
}

fn render_care(care: &Care) -> String {
    let mut out = format!(
        "Sunlight: {}\nWatering: {}\nSoil:     {}\nNotes:    {}\n",
        care.sunlight, care.watering, care.soil, care.notes
    );
    if let Some(trivia) = &care.trivia {
        out.push_str(&format!("Trivia:   {}\n", trivia));
    }
    out
}

pub fn render_identified(r: &Identified) -> String {
    let name = match &r.plant.species {
        Some(species) => species.clone(),
        None => format!("{} (genus only)", r.plant.genus),
    };
    format!(
        "{}  {}\nID: {}\n\n{}",
        name,
        confidence_percent(r.plant.confidence),
        r.id,
        render_care(&r.care)
    )
}

pub fn render_history(page: &HistoryPage) -> String {
    if page.items.is_empty() {
        return "No identifications yet.\n".to_string();
    }
    let mut out = String::new();
    for item in &page.items {
        out.push_str(&format!(
            "{}  {:<28} {:>4}  {}\n",
            item.id,
            item.species.as_deref().unwrap_or(&item.genus),
            confidence_percent(item.confidence),
            item.created_at
        ));
    }
    let shown_to = page.offset + page.items.len() as i64;
    out.push_str(&format!(
        "\nShowing {}-{} of {} (limit {})\n",
        page.offset + 1,
        shown_to,
        page.total,
        page.limit
    ));
    out
}

pub fn render_detail(detail: &HistoryDetail, chat: Option<&[ChatMessage]>) -> String {
    let mut out = format!(
        "{}\nGenus:      {}\nSpecies:    {}\nConfidence: {}\nImage:      {}\nCreated:    {}\n",
        detail.id,
        detail.genus,
        detail.species.as_deref().unwrap_or("-"),
        confidence_percent(detail.confidence),
        detail.image_path,
        detail.created_at
    );
    if let Some(care) = &detail.care_guide {
        out.push('\n');
        out.push_str(&render_care(care));
    }
    if let Some(messages) = chat {
        out.push('\n');
        if messages.is_empty() {
            out.push_str("No chat messages.\n");
        }
        for m in messages {
            out.push_str(&format!("[{}] {}: {}\n", m.created_at, m.sender, m.message));
        }
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

fn read_json(resp: reqwest::blocking::Response) -> anyhow::Result<serde_json::Value> {
    let status = resp.status();
    let body = resp.text()?;
    if !status.is_success() {
        anyhow::bail!(error_message(status.as_u16(), &body));
    }
    Ok(serde_json::from_str(&body)?)
}

fn print_or_render<T: DeserializeOwned>(
    value: serde_json::Value,
    json_output: bool,
    render: impl FnOnce(&T) -> String,
) -> anyhow::Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        let parsed: T = serde_json::from_value(value)?;
        print!("{}", render(&parsed));
    }
    Ok(())
}

fn do_identify(server: &str, image: &str, json_output: bool) -> anyhow::Result<()> {
    if !Path::new(image).is_file() {
        anyhow::bail!("image not found: {}", image);
    }
    let form = reqwest::blocking::multipart::Form::new().file("image", image)?;
    let resp = client()?
        .post(format!("{}/identify", server))
        .multipart(form)
        .send()?;
    print_or_render(read_json(resp)?, json_output, render_identified)
}

fn do_history(server: &str, limit: u32, offset: u32, json_output: bool) -> anyhow::Result<()> {
    let resp = client()?
        .get(format!("{}/history", server))
        .query(&[("limit", limit), ("offset", offset)])
        .send()?;
    print_or_render(read_json(resp)?, json_output, render_history)
}

fn do_show(server: &str, id: &str, with_chat: bool, json_output: bool) -> anyhow::Result<()> {
    if with_chat {
        let resp = client()?
            .get(format!("{}/history/{}/with-chat", server, id))
            .send()?;
        print_or_render(read_json(resp)?, json_output, |v: &HistoryWithChat| {
            render_detail(&v.identification, Some(&v.chat_messages))
        })
    } else {
        let resp = client()?.get(format!("{}/history/{}", server, id)).send()?;
        print_or_render(read_json(resp)?, json_output, |v: &HistoryDetail| {
            render_detail(v, None)
        })
    }
}

fn do_chat(server: &str, id: &str, message: &str) -> anyhow::Result<()> {
    let resp = client()?
        .post(format!("{}/chat", server))
        .json(&serde_json::json!({
            "identification_id": id,
            "message": message,
        }))
        .send()?;
    let reply: ChatReply = serde_json::from_value(read_json(resp)?)?;
    println!("{}", reply.message);
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    match client()?.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Server:  {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Service: {}", body["service"].as_str().unwrap_or("?"));
            println!("Version: {}", body["version"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("succulent-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("succulent-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Identify { image, json } => do_identify(&server, &image, json),
        Commands::History {
            limit,
            offset,
            json,
        } => do_history(&server, limit, offset, json),
        Commands::Show { id, chat, json } => do_show(&server, &id, chat, json),
        Commands::Chat { id, message } => do_chat(&server, &id, &message),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("succulent-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
