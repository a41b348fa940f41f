use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clipfetch::cli::CookiesAction;
use clipfetch::credentials::{cookies, RestCredentialStore};
use clipfetch::{utils, Cli, Commands, Config, Platform, Result, VideoPipeline};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Fetch { url, output } => {
            let config = Config::load(cli.config.as_deref())?;
            warn_missing_dependencies(&config).await;
            fetch(&config, &url, output, cli.quiet).await
        }
        Commands::Cookies {
            action: CookiesAction::Upload { file, yes },
        } => {
            let config = Config::load(cli.config.as_deref())?;
            upload_cookies(&config, file.as_deref(), yes).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Platforms => {
            println!("Supported platforms:");
            for platform in Platform::SUPPORTED {
                println!("  • {}", platform.display_name());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { show, init } => {
            if init {
                let path = Config::default().save(cli.config.as_deref())?;
                println!("Wrote default configuration to {}", path.display());
            } else {
                let config = Config::load(cli.config.as_deref())?;
                config.display();
                if !show {
                    println!();
                    println!("Edit the config file to change these values:");
                    println!("  {}", Config::config_path()?.display());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose { "clipfetch=debug" } else { "clipfetch=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays clean for command output
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn warn_missing_dependencies(config: &Config) {
    let missing_deps = utils::check_dependencies(&config.extractor.binary).await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - the remote resolver may still work)");
    }
}

async fn fetch(config: &Config, url: &str, output: Option<PathBuf>, quiet: bool) -> Result<ExitCode> {
    let pipeline = VideoPipeline::from_config(config)?;

    let progress = if quiet {
        None
    } else {
        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
        );
        progress.set_message(format!("Fetching {}", url.trim()));
        progress.enable_steady_tick(Duration::from_millis(120));
        Some(progress)
    };

    let result = pipeline.acquire_video(url).await;
    if let Some(progress) = &progress {
        progress.finish_and_clear();
    }

    let video = match result {
        Ok(video) => video,
        Err(e) => {
            tracing::debug!(kind = %e.kind(), error = %e, "Acquisition failed");
            eprintln!("{}", e.user_message());
            return Ok(ExitCode::FAILURE);
        }
    };

    let dest = output.unwrap_or_else(|| utils::default_output_path(video.path()));
    tokio::fs::copy(video.path(), &dest)
        .await
        .with_context(|| format!("Failed to write {}", dest.display()))?;

    let platform = video.platform();
    let size = video.size_bytes();
    if let Err(e) = video.release().await {
        tracing::warn!(error = %e, "Failed to remove workspace");
    }

    println!(
        "Saved {} video ({}) to {}",
        platform.display_name(),
        utils::format_file_size(size),
        dest.display()
    );
    Ok(ExitCode::SUCCESS)
}

async fn upload_cookies(config: &Config, file: Option<&Path>, yes: bool) -> Result<()> {
    let store_config = config
        .credentials
        .store
        .as_ref()
        .context("No credential store configured (set SUPABASE_URL and SUPABASE_KEY or credentials.store)")?;

    let path = utils::find_cookie_file(file).with_context(|| match file {
        Some(path) => format!("Cookie file not found: {}", path.display()),
        None => "No cookies.txt found in the current directory or downloads folder".to_string(),
    })?;

    let payload = fs_err::read_to_string(&path).context("Failed to read cookie file")?;
    if payload.trim().is_empty() {
        anyhow::bail!("Cookie file is empty: {}", path.display());
    }
    if !cookies::looks_like_netscape(&payload) {
        eprintln!("⚠️  {} does not look like a Netscape cookie file", path.display());
    }

    println!("File: {}", path.display());
    println!("Entries: {}", cookies::count_entries(&payload));
    println!("Scope: {}", config.credentials.scope);
    println!("Table: {}", store_config.table);

    if !yes && !confirm("Upload these cookies and replace the stored ones?")? {
        println!("Cancelled.");
        return Ok(());
    }

    let store = RestCredentialStore::new(store_config)?;
    store.upsert(&config.credentials.scope, &payload).await?;
    println!("✅ Cookies uploaded");
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
