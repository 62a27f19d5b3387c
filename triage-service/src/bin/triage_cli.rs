use anyhow::{Context, Result, bail};
use base64::{Engine, engine::general_purpose::STANDARD};
use clap::Parser;
use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use triage_flow::{
    BotReply, ConversationRunner, FlowError, GeoLocation, InMemorySessionStorage, Language,
    LocaleRegistry, OpenRouterConfig, OpenRouterModel, Orchestrator, UserTurn, emergency_contacts,
};

/// Chat with the symptom triage assistant from a terminal.
///
/// Type `/reset` to start over and `/quit` to leave.
#[derive(Debug, Parser)]
#[command(name = "triage_cli")]
struct Args {
    /// Conversation language: en, hi or or
    #[arg(long, default_value = "en")]
    language: Language,

    /// Latitude used for the nearby hospital lookup
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude used for the nearby hospital lookup
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Image attached to the first message
    #[arg(long)]
    photo: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    // Logs go to stderr so they do not interleave with the chat
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = OpenRouterConfig::from_env()?;

    let locales = Arc::new(LocaleRegistry::builtin()?);
    let tokens = locales.get(args.language);
    let orchestrator = Arc::new(Orchestrator::new(Arc::new(OpenRouterModel::new(config)), locales));
    let runner = ConversationRunner::new(orchestrator, Arc::new(InMemorySessionStorage::new()));

    let location = match (args.lat, args.lon) {
        (Some(latitude), Some(longitude)) => Some(GeoLocation {
            latitude,
            longitude,
        }),
        _ => None,
    };
    let session = runner.start_session(args.language, location).await?;

    let mut photo = match &args.photo {
        Some(path) => Some(photo_data_uri(path).await?),
        None => None,
    };

    println!("{}:", tokens.emergency_numbers);
    for contact in emergency_contacts(&tokens) {
        println!("  {} {}", contact.label, contact.number);
    }
    println!();
    println!("bot: {}", tokens.initial_bot_message);
    if photo.is_some() {
        println!("(the photo is sent with your first message)");
    }
    prompt()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "/quit" | "/exit" => break,
            "/reset" => {
                runner.reset(&session.id).await?;
                println!("(conversation reset)");
                prompt()?;
                continue;
            }
            _ => {}
        }

        let mut turn = UserTurn::text(line);
        if let Some(photo) = photo.take() {
            turn = turn.with_photo(photo);
        }

        match runner.run(&session.id, turn, None).await {
            Ok(result) => result.replies.iter().for_each(render),
            Err(FlowError::MissingSymptoms) => println!("bot: {}", tokens.missing_symptoms),
            Err(e) if e.is_precondition() => println!("bot: {e}"),
            Err(e) => return Err(e.into()),
        }
        prompt()?;
    }

    Ok(())
}

fn prompt() -> Result<()> {
    print!("you> ");
    std::io::stdout().flush()?;
    Ok(())
}

fn render(reply: &BotReply) {
    match reply {
        BotReply::Text { text } | BotReply::Error { text } => println!("bot: {text}"),
        BotReply::Question { index, total, text } => {
            println!("bot ({}/{}): {}", index + 1, total, text)
        }
        BotReply::Conditions { conditions } => {
            for condition in conditions {
                let marker = if condition.is_emergency { " [EMERGENCY]" } else { "" };
                println!();
                println!("* {}{}", condition.name, marker);
                println!("  {}", condition.description);
                if let Some(precautions) = &condition.precautions {
                    println!("  Precautions: {}", precautions.precautions);
                    println!("  Why: {}", precautions.reasoning);
                }
                for hospital in condition.nearby_hospitals.iter().flatten() {
                    match &hospital.phone {
                        Some(phone) => println!("  - {}, {} ({})", hospital.name, hospital.address, phone),
                        None => println!("  - {}, {}", hospital.name, hospital.address),
                    }
                }
            }
            println!();
        }
    }
}

/// Read an image file into a `data:<mime>;base64,<payload>` URI
async fn photo_data_uri(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let mime = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        other => bail!("unsupported image type {other:?}, expected png, jpg, webp or gif"),
    };

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}
