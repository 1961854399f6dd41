//! CLI for LockViz - smart-lock door previews.

use clap::{Args, Parser, Subcommand, ValueEnum};
use lockviz::locale::message;
use lockviz::{
    Catalog, GeminiModel, GeminiProvider, HttpReferenceFetcher, ImageEditor, Language,
    LockVizError, MessageKind, PromptTemplate, Session, SessionConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lockviz")]
#[command(about = "Preview a smart lock on a photo of your door using Gemini image editing")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a preview of a catalog lock installed on a door photo
    Generate(GenerateArgs),

    /// List the locks in a catalog
    Locks(LocksArgs),

    /// Check that the API key and model are usable
    Check(ProviderArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Door photo
    #[arg(short, long)]
    door: PathBuf,

    /// Lock catalog (JSON array of {id, name, imageUrl})
    #[arg(short, long)]
    catalog: PathBuf,

    /// Lock id to install (defaults to the first catalog entry)
    #[arg(short, long)]
    lock: Option<String>,

    /// Output file path (overrides --out-dir naming)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for the timestamped preview file
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Message language
    #[arg(long, value_enum, default_value = "cn")]
    lang: LanguageArg,

    /// Custom instruction template file ({lock_name} is substituted)
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Deadline for the whole generation, in seconds
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Args)]
struct LocksArgs {
    /// Lock catalog (JSON array of {id, name, imageUrl})
    #[arg(short, long)]
    catalog: PathBuf,
}

#[derive(Args)]
struct ProviderArgs {
    /// Gemini API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini model id
    #[arg(long, default_value = "gemini-2.5-flash-image")]
    model: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LanguageArg {
    En,
    Bm,
    Cn,
}

impl From<LanguageArg> for Language {
    fn from(arg: LanguageArg) -> Self {
        match arg {
            LanguageArg::En => Language::En,
            LanguageArg::Bm => Language::Bm,
            LanguageArg::Cn => Language::Cn,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lockviz=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => generate(args, cli.json).await?,
        Commands::Locks(args) => list_locks(args, cli.json)?,
        Commands::Check(args) => check(args, cli.json).await?,
    }

    Ok(())
}

fn build_provider(
    args: &ProviderArgs,
    client: reqwest::Client,
) -> lockviz::Result<GeminiProvider> {
    let mut builder = GeminiProvider::builder()
        .model(GeminiModel::from_id(&args.model))
        .http_client(client);
    if let Some(ref key) = args.api_key {
        builder = builder.api_key(key);
    }
    builder.build()
}

async fn generate(args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let language = Language::from(args.lang);
    let client = reqwest::Client::new();

    let provider = match build_provider(&args.provider, client.clone()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", message(language, MessageKind::Config));
            return Err(e.into());
        }
    };

    let mut config = SessionConfig::default()
        .with_language(language)
        .with_deadline(Duration::from_secs(args.timeout));
    if let Some(ref path) = args.prompt_file {
        config = config.with_prompt(PromptTemplate::from_file(path)?);
    }

    let session = Session::new(
        Catalog::load(&args.catalog)?,
        Arc::new(provider),
        Arc::new(HttpReferenceFetcher::with_client(client)),
        config,
    );

    if let Some(ref id) = args.lock {
        session.select_lock(id)?;
    }
    let lock = session.selected_lock()?;

    if session.upload(&args.door).await.is_err() {
        anyhow::bail!(report_failure(&session));
    }

    if !json_output {
        eprintln!("{}", message(language, MessageKind::Generating));
    }

    if let Err(e) = session.generate().await {
        if json_output {
            let result = serde_json::json!({
                "success": false,
                "status": session.state().status(),
                "error_kind": e.message_kind(),
                "message": session.state().error_message(),
                "detail": e.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        anyhow::bail!(report_failure(&session));
    }

    let path = match args.output {
        Some(ref path) => {
            session.save_result_to(path).await?;
            path.clone()
        }
        None => session.save_result(&args.out_dir).await?,
    };

    if json_output {
        let result = serde_json::json!({
            "success": true,
            "output": path.display().to_string(),
            "lock_id": lock.id,
            "lock_name": lock.name,
            "status": session.state().status(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{} {}", message(language, MessageKind::Success), path.display());
    }

    Ok(())
}

fn report_failure(session: &Session) -> String {
    session
        .state()
        .error_message()
        .unwrap_or_else(|| message(session.state().language(), MessageKind::Generic))
        .to_string()
}

fn list_locks(args: LocksArgs, json_output: bool) -> anyhow::Result<()> {
    let catalog = Catalog::load(&args.catalog)?;

    if json_output {
        let locks: Vec<_> = catalog.iter().collect();
        println!("{}", serde_json::to_string_pretty(&locks)?);
    } else {
        println!("Available locks:\n");
        for lock in catalog.iter() {
            println!("  {:<8} {}", lock.id, lock.name);
            println!("           {}", lock.image_url);
        }
    }

    Ok(())
}

async fn check(args: ProviderArgs, json_output: bool) -> anyhow::Result<()> {
    let provider = build_provider(&args, reqwest::Client::new())?;
    let result = provider.health_check().await;

    if json_output {
        let report = serde_json::json!({
            "provider": provider.name(),
            "model": provider.model().as_str(),
            "ok": result.is_ok(),
            "error": result.as_ref().err().map(LockVizError::to_string),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &result {
            Ok(()) => println!("✓ {} ({})", provider.name(), provider.model().as_str()),
            Err(e) => println!("✗ {} ({}): {}", provider.name(), provider.model().as_str(), e),
        }
    }

    result.map_err(Into::into)
}
