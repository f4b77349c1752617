use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand};

use novaria_core_sdk::prelude::*;

/**
 * \brief CLI entry point: run the endpoint or talk to it in-process.
 */
#[derive(Parser, Debug)]
#[command(name = "novaria", version, about = "Novaria AI chat endpoint")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief Start the HTTP service and serve the front-end.
     */
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,
    },

    /**
     * \brief Send one message (optionally with files) and print the reply.
     * \param prompt message text
     * \param model  registry key; unknown keys use the default entry
     * \param file   files to attach inline
     */
    Ask {
        #[arg(long, default_value = "")]
        prompt: String,
        #[arg(long, default_value = "gemini-2.5-flash")]
        model: String,
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },

    /**
     * \brief List the configured models.
     */
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init(None);
    let config = Config::from_env();
    telemetry::set_log_file(config.log_file.clone());

    match cli.command {
        Commands::Serve { addr } => {
            let service = server::build_service(&config).context("build service failed")?;
            server::run(&addr, service, &config.ui_dir).await?;
        }
        Commands::Ask {
            prompt,
            model,
            files,
        } => {
            let service = server::build_service(&config).context("build service failed")?;
            let attachments = files
                .iter()
                .map(|path| read_attachment(path))
                .collect::<Result<Vec<_>>>()?;

            telemetry::log_event(
                "cli.ask",
                &format!(
                    "model={} prompt_len={} files={}",
                    model,
                    prompt.len(),
                    attachments.len()
                ),
            );

            let request = GenerateRequest {
                user_message: Some(prompt),
                conversation_history: Some(Vec::new()),
                attached_files: Some(attachments),
                selected_model: Some(model),
            };
            match service.generate(request).await {
                Ok(resp) => println!("{}", resp.text),
                Err(err) => {
                    eprintln!("{} ({})", err.message(), err.status());
                    std::process::exit(1);
                }
            }
        }
        Commands::Models => {
            let registry = config.load_registry()?;
            for entry in registry.entries() {
                println!(
                    "{:<18} -> {:<24} temperature={} inline_data={}",
                    entry.key,
                    entry.upstream_model,
                    entry.generation.temperature,
                    entry.supports_inline_data
                );
            }
        }
    }

    Ok(())
}

fn read_attachment(path: &Path) -> Result<Attachment> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read {} failed", path.display()))?;
    Ok(Attachment {
        mime_type: guess_mime(path).to_string(),
        data: STANDARD.encode(bytes),
    })
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}
