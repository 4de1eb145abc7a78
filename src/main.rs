mod api;
mod config;
mod db;
mod models;
mod query;
mod seed;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use api::{Api, ApiRequest, Method};
use config::Settings;
use db::Database;
use models::{Candidate, Job, JobStatus, Note, Stage, TimelineEntry};
use query::Page;

#[derive(Parser)]
#[command(name = "hiretrack")]
#[command(about = "Applicant tracking backend with a simulated network in front")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store and seed it on first run
    Init {
        /// Create the collections without sample data
        #[arg(long)]
        empty: bool,
    },

    /// Send a raw request and print the JSON response
    Request {
        /// GET, POST, PUT, PATCH or DELETE
        method: Method,

        /// Path with optional query string, e.g. "/jobs?search=rust"
        target: String,

        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Manage jobs
    Jobs {
        #[command(subcommand)]
        command: JobCommands,
    },

    /// Manage candidates
    Candidates {
        #[command(subcommand)]
        command: CandidateCommands,
    },

    /// Show a candidate's stage history
    Timeline {
        /// Candidate ID
        id: i64,
    },

    /// List or add notes on a candidate
    Notes {
        /// Candidate ID
        id: i64,

        /// Add a note with this text
        #[arg(short, long)]
        add: Option<String>,

        /// Team member to mention (repeatable)
        #[arg(short, long, requires = "add")]
        mention: Vec<String>,
    },
}

#[derive(Subcommand)]
enum JobCommands {
    /// List jobs in board order
    List {
        /// Case-insensitive match on title and tags
        #[arg(short, long)]
        search: Option<String>,

        /// Filter by status (draft, active, archived)
        #[arg(long)]
        status: Option<JobStatus>,

        /// Sort by title or status instead of board order
        #[arg(long)]
        sort: Option<String>,

        #[arg(short, long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "10")]
        page_size: usize,
    },

    /// Create a job at the end of the board
    Add {
        title: String,

        /// Explicit slug (derived from the title otherwise)
        #[arg(long)]
        slug: Option<String>,

        /// Comma-separated tags
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        #[arg(long)]
        status: Option<JobStatus>,
    },

    /// Move a job to a new board position (1-based)
    Move {
        /// Job ID
        id: i64,

        /// Target position
        to: i64,
    },
}

#[derive(Subcommand)]
enum CandidateCommands {
    /// List candidates
    List {
        /// Case-insensitive match on name and email
        #[arg(short, long)]
        search: Option<String>,

        /// Filter by stage (applied, screen, tech, offer, hired, rejected)
        #[arg(long)]
        stage: Option<Stage>,

        #[arg(short, long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "25")]
        page_size: usize,
    },

    /// Add a candidate
    Add {
        name: String,

        email: String,

        /// Job the candidate applied to
        #[arg(short, long)]
        job: Option<i64>,
    },

    /// Move a candidate to another stage
    Stage {
        /// Candidate ID
        id: i64,

        stage: Stage,

        /// Reason recorded on the timeline
        #[arg(short, long)]
        note: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    cli.settings.validate()?;

    let path = cli.settings.db_path()?;
    let db = Database::open(&path)?;
    info!(path = ?db.path(), "opened store");
    let api = match cli.command {
        Commands::Init { empty: true } => Api::new(db, cli.settings.network())?,
        _ => Api::start(db, cli.settings.network())?,
    };

    let outcome = run(&api, cli.command).await;
    api.close().await?;
    outcome
}

async fn run(api: &Api, command: Commands) -> Result<()> {
    match command {
        Commands::Init { .. } => {
            let page: Page<Job> = send(api, ApiRequest::get("/jobs?pageSize=1")).await?;
            let candidates: Page<Candidate> =
                send(api, ApiRequest::get("/candidates?pageSize=1")).await?;
            println!(
                "Store ready: {} jobs, {} candidates",
                page.total, candidates.total
            );
        }

        Commands::Request {
            method,
            target,
            data,
        } => {
            let mut request = ApiRequest::new(method, &target);
            if let Some(data) = data {
                let body: Value = serde_json::from_str(&data).context("--data is not valid JSON")?;
                request = request.with_body(body);
            }
            let response = api.handle(request).await;
            println!("{}", response.status);
            if !response.body.is_null() {
                println!("{}", serde_json::to_string_pretty(&response.body)?);
            }
            if !response.is_success() {
                bail!("request failed with status {}", response.status);
            }
        }

        Commands::Jobs { command } => match command {
            JobCommands::List {
                search,
                status,
                sort,
                page,
                page_size,
            } => {
                let mut params = vec![
                    ("page", page.to_string()),
                    ("pageSize", page_size.to_string()),
                ];
                if let Some(search) = search {
                    params.push(("search", search));
                }
                if let Some(status) = status {
                    params.push(("status", status.to_string()));
                }
                if let Some(sort) = sort {
                    params.push(("sort", sort));
                }
                let page: Page<Job> = send(api, ApiRequest::get(&target("/jobs", &params))).await?;
                print_jobs(&page);
            }

            JobCommands::Add {
                title,
                slug,
                tags,
                status,
            } => {
                let mut body = json!({ "title": title, "tags": tags });
                if let Some(slug) = slug {
                    body["slug"] = json!(slug);
                }
                if let Some(status) = status {
                    body["status"] = json!(status);
                }
                let job: Job = send(api, ApiRequest::post("/jobs", body)).await?;
                println!("Added job '{}' (ID: {}, slug: {})", job.title, job.id, job.slug);
            }

            JobCommands::Move { id, to } => {
                let job: Job = send(api, ApiRequest::get(&format!("/jobs/{id}"))).await?;
                let body = json!({ "fromOrder": job.order, "toOrder": to });
                let _: Value = send(api, ApiRequest::patch(&format!("/jobs/{id}/reorder"), body)).await?;
                let moved: Job = send(api, ApiRequest::get(&format!("/jobs/{id}"))).await?;
                println!(
                    "Moved '{}' from position {} to {}",
                    moved.title, job.order, moved.order
                );
            }
        },

        Commands::Candidates { command } => match command {
            CandidateCommands::List {
                search,
                stage,
                page,
                page_size,
            } => {
                let mut params = vec![
                    ("page", page.to_string()),
                    ("pageSize", page_size.to_string()),
                ];
                if let Some(search) = search {
                    params.push(("search", search));
                }
                if let Some(stage) = stage {
                    params.push(("stage", stage.to_string()));
                }
                let page: Page<Candidate> =
                    send(api, ApiRequest::get(&target("/candidates", &params))).await?;
                print_candidates(&page);
            }

            CandidateCommands::Add { name, email, job } => {
                let body = json!({ "name": name, "email": email, "jobId": job });
                let candidate: Candidate = send(api, ApiRequest::post("/candidates", body)).await?;
                println!("Added candidate '{}' (ID: {})", candidate.name, candidate.id);
            }

            CandidateCommands::Stage { id, stage, note } => {
                let mut body = json!({ "stage": stage });
                if let Some(note) = note {
                    body["note"] = json!(note);
                }
                let candidate: Candidate =
                    send(api, ApiRequest::patch(&format!("/candidates/{id}"), body)).await?;
                println!("{} is now at stage {}", candidate.name, candidate.stage);
            }
        },

        Commands::Timeline { id } => {
            let candidate: Candidate = send(api, ApiRequest::get(&format!("/candidates/{id}"))).await?;
            let timeline: Items<TimelineEntry> =
                send(api, ApiRequest::get(&format!("/candidates/{id}/timeline"))).await?;
            println!("{} <{}>", candidate.name, candidate.email);
            for entry in timeline.items {
                let from = entry
                    .from_stage
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {}  {:>8} -> {:<8}",
                    format_timestamp(entry.timestamp),
                    from,
                    entry.to_stage
                );
                println!("{}", textwrap::indent(&textwrap::fill(&entry.meta.note, 60), "      "));
            }
        }

        Commands::Notes { id, add, mention } => {
            if let Some(text) = add {
                let body = json!({ "text": text, "mentions": mention });
                let note: Note =
                    send(api, ApiRequest::post(&format!("/candidates/{id}/notes"), body)).await?;
                println!("Added note {} on candidate {}", note.id, id);
                return Ok(());
            }

            let notes: Items<Note> =
                send(api, ApiRequest::get(&format!("/candidates/{id}/notes"))).await?;
            if notes.items.is_empty() {
                println!("No notes for candidate {id}.");
            }
            for note in notes.items {
                let mentions = if note.mentions.is_empty() {
                    String::new()
                } else {
                    format!("  @{}", note.mentions.join(" @"))
                };
                println!("{}{}", format_timestamp(note.timestamp), mentions);
                println!("{}", textwrap::indent(&textwrap::fill(&note.text, 72), "    "));
            }
        }
    }

    Ok(())
}

#[derive(serde::Deserialize)]
struct Items<T> {
    items: Vec<T>,
}

/// Sends a request and decodes a successful body. Error statuses become
/// errors carrying the server message.
async fn send<T: DeserializeOwned>(api: &Api, request: ApiRequest) -> Result<T> {
    let label = format!("{} {}", request.method, request.path);
    let response = api.handle(request).await;
    if !response.is_success() {
        bail!(
            "{} failed ({}): {}",
            label,
            response.status,
            response.message().unwrap_or("no message")
        );
    }
    serde_json::from_value(response.body).with_context(|| format!("Unexpected response to {label}"))
}

fn target(path: &str, params: &[(&str, String)]) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        query.append_pair(key, value);
    }
    format!("{}?{}", path, query.finish())
}

fn print_jobs(page: &Page<Job>) {
    if page.items.is_empty() {
        println!("No jobs found.");
        return;
    }
    println!("{:<6} {:<5} {:<30} {:<9} {:<30}", "ID", "ORDER", "TITLE", "STATUS", "TAGS");
    println!("{}", "-".repeat(84));
    for job in &page.items {
        println!(
            "{:<6} {:<5} {:<30} {:<9} {:<30}",
            job.id,
            job.order,
            truncate(&job.title, 28),
            job.status,
            truncate(&job.tags.join(", "), 28)
        );
    }
    print_footer(page.total, page.page, page.page_size);
}

fn print_candidates(page: &Page<Candidate>) {
    if page.items.is_empty() {
        println!("No candidates found.");
        return;
    }
    println!("{:<6} {:<24} {:<30} {:<9} {:<5}", "ID", "NAME", "EMAIL", "STAGE", "JOB");
    println!("{}", "-".repeat(78));
    for candidate in &page.items {
        println!(
            "{:<6} {:<24} {:<30} {:<9} {:<5}",
            candidate.id,
            truncate(&candidate.name, 22),
            truncate(&candidate.email, 28),
            candidate.stage,
            candidate.job_id.map(|id| id.to_string()).unwrap_or_default()
        );
    }
    print_footer(page.total, page.page, page.page_size);
}

fn print_footer(total: usize, page: usize, page_size: usize) {
    let pages = total.div_ceil(page_size).max(1);
    println!("\nPage {page} of {pages} ({total} total)");
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
