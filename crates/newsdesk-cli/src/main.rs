use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Parser)]
#[command(name = "newsdesk")]
#[command(about = "A CLI for managing the Newsdesk story catalog")]
struct Cli {
    /// Base URL for the Newsdesk service
    #[arg(long, default_value = "http://localhost:3000")]
    service_url: String,

    /// Secret path prefix the admin API is mounted under
    #[arg(long, default_value = "admin")]
    admin_path: String,

    /// Admin session token, as printed by `newsdesk login`
    #[arg(long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print a session token
    Login {
        #[arg(short, long, default_value = "admin")]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Add a single story to the catalog
    Add {
        /// Story headline
        title: String,
        /// Source URL of the story
        url: String,
        /// Category to file the story under
        category: String,
        /// Optional byline
        #[arg(short, long)]
        author: Option<String>,
        /// Optional summary text
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List stories from the public catalog
    List {
        #[arg(short, long)]
        limit: Option<u32>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Bulk-import stories from a CSV file
    Import {
        /// Path to a .csv file
        file: PathBuf,
        /// Treat the file as semicolon-delimited raw text
        #[arg(long)]
        semicolon: bool,
        /// Print the per-row outcome alongside the summary
        #[arg(long)]
        details: bool,
    },
    /// Delete every story in the catalog
    Clear,
}

#[derive(Serialize)]
struct NewStory {
    title: String,
    url: String,
    category: String,
    author: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct StoryEntry {
    id: i32,
    title: String,
    url: String,
    category: String,
    author: String,
}

#[derive(Deserialize)]
struct StoryList {
    items: Vec<StoryEntry>,
    total: u64,
}

#[derive(Deserialize)]
struct ImportRow {
    row: usize,
    status: String,
    title: String,
    message: String,
}

#[derive(Deserialize)]
struct ImportReport {
    total: usize,
    successful: usize,
    duplicates: usize,
    failed: usize,
    rows: Vec<ImportRow>,
}

#[derive(Deserialize)]
struct ClearResponse {
    message: String,
}

struct Endpoints {
    base: Url,
    admin_path: String,
}

impl Endpoints {
    fn public(&self, path: &str) -> Result<Url, Box<dyn Error>> {
        Ok(self.base.join(&format!("/api/v1/{path}"))?)
    }

    fn admin(&self, path: &str) -> Result<Url, Box<dyn Error>> {
        Ok(self.base.join(&format!("/{}/{path}", self.admin_path))?)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let client = Client::new();
    let endpoints = Endpoints {
        base: Url::parse(&cli.service_url)?,
        admin_path: cli.admin_path.trim_matches('/').to_string(),
    };

    match cli.command {
        Commands::Login { username, password } => {
            login(&client, &endpoints, username, password).await?;
        }
        Commands::Add {
            title,
            url,
            category,
            author,
            description,
        } => {
            let token = require_token(cli.token.as_deref())?;
            let story = NewStory {
                title,
                url,
                category,
                author,
                description,
            };
            add_story(&client, &endpoints, token, story).await?;
        }
        Commands::List {
            limit,
            category,
            search,
        } => {
            list_stories(&client, &endpoints, limit, category, search).await?;
        }
        Commands::Import {
            file,
            semicolon,
            details,
        } => {
            let token = require_token(cli.token.as_deref())?;
            import_stories(&client, &endpoints, token, &file, semicolon, details).await?;
        }
        Commands::Clear => {
            let token = require_token(cli.token.as_deref())?;
            clear_stories(&client, &endpoints, token).await?;
        }
    }

    Ok(())
}

fn require_token(token: Option<&str>) -> Result<&str, Box<dyn Error>> {
    token.ok_or_else(|| "This command needs --token; run `newsdesk login` first".into())
}

async fn login(
    client: &Client,
    endpoints: &Endpoints,
    username: String,
    password: String,
) -> Result<(), Box<dyn Error>> {
    let endpoint = endpoints.admin("auth")?;
    let payload = serde_json::json!({ "username": username, "password": password });

    let response = client.post(endpoint).json(&payload).send().await?;

    if response.status().is_success() {
        let login_response: LoginResponse = response.json().await?;
        println!("{}", login_response.token);
    } else {
        eprintln!("Login failed: {}", response.status());
        eprintln!("Response: {}", response.text().await?);
    }

    Ok(())
}

async fn add_story(
    client: &Client,
    endpoints: &Endpoints,
    token: &str,
    story: NewStory,
) -> Result<(), Box<dyn Error>> {
    let endpoint = endpoints.admin("api/stories")?;

    let response = client
        .post(endpoint)
        .bearer_auth(token)
        .json(&story)
        .send()
        .await?;

    if response.status().is_success() {
        let created: StoryEntry = response.json().await?;
        println!("Story added with ID: {}", created.id);
    } else {
        eprintln!("Failed to add story: {}", response.status());
        eprintln!("Response: {}", response.text().await?);
    }

    Ok(())
}

async fn list_stories(
    client: &Client,
    endpoints: &Endpoints,
    limit: Option<u32>,
    category: Option<String>,
    search: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let endpoint = endpoints.public("stories")?;

    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(limit) = limit {
        query.push(("limit", limit.to_string()));
    }
    if let Some(category) = category {
        query.push(("category", category));
    }
    if let Some(search) = search {
        query.push(("search", search));
    }

    let response = client.get(endpoint).query(&query).send().await?;

    if !response.status().is_success() {
        eprintln!("Failed to list stories: {}", response.status());
        eprintln!("Response: {}", response.text().await?);
        return Ok(());
    }

    let list: StoryList = response.json().await?;
    for story in &list.items {
        println!(
            "[{}] {} ({}) by {}",
            story.id, story.title, story.category, story.author
        );
        println!("    {}", story.url);
    }
    println!("{} of {} stories shown", list.items.len(), list.total);

    Ok(())
}

async fn import_stories(
    client: &Client,
    endpoints: &Endpoints,
    token: &str,
    file: &Path,
    semicolon: bool,
    details: bool,
) -> Result<(), Box<dyn Error>> {
    if file.extension().and_then(|ext| ext.to_str()) != Some("csv") {
        return Err("Only .csv files can be imported".into());
    }

    let response = if semicolon {
        let content = std::fs::read_to_string(file)?;
        let endpoint = endpoints.admin("api/stories/import/text")?;
        client
            .post(endpoint)
            .bearer_auth(token)
            .json(&serde_json::json!({ "csv_content": content }))
            .send()
            .await?
    } else {
        let bytes = std::fs::read(file)?;
        let file_name = file
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("import.csv")
            .to_string();
        let part = Part::bytes(bytes).file_name(file_name).mime_str("text/csv")?;
        let form = Form::new().part("file", part);
        let endpoint = endpoints.admin("api/stories/import")?;
        client
            .post(endpoint)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?
    };

    if !response.status().is_success() {
        eprintln!("Import failed: {}", response.status());
        eprintln!("Response: {}", response.text().await?);
        return Ok(());
    }

    let report: ImportReport = response.json().await?;
    println!(
        "Imported {} of {} rows ({} duplicates, {} failed)",
        report.successful, report.total, report.duplicates, report.failed
    );

    if details {
        for row in &report.rows {
            println!("row {} [{}] {}: {}", row.row, row.status, row.title, row.message);
        }
    }

    Ok(())
}

async fn clear_stories(
    client: &Client,
    endpoints: &Endpoints,
    token: &str,
) -> Result<(), Box<dyn Error>> {
    let endpoint = endpoints.admin("api/stories/clear")?;

    let response = client.delete(endpoint).bearer_auth(token).send().await?;

    if response.status().is_success() {
        let cleared: ClearResponse = response.json().await?;
        println!("{}", cleared.message);
    } else {
        eprintln!("Failed to clear stories: {}", response.status());
        eprintln!("Response: {}", response.text().await?);
    }

    Ok(())
}
