mod adapters;
mod analyze;
mod bundle;
mod compose;
mod detect;
mod error;
mod extract;
mod kit;
mod normalize;
mod pipeline;
mod report;
mod schema;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "storeport", about = "Storefront importer: third-party store exports to canonical pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the source platform of a bundle and print the signal table
    Detect {
        /// Bundle directory (store export or crawl)
        bundle: PathBuf,
        /// Override the platform instead of detecting (shopify, woocommerce, wix)
        #[arg(short, long)]
        platform: Option<String>,
    },
    /// Run the full import pipeline over a bundle
    Import {
        /// Bundle directory (store export or crawl)
        bundle: PathBuf,
        /// Override the platform instead of detecting
        #[arg(short, long)]
        platform: Option<String>,
        /// Write the full report (pages included) to this JSON file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Detect { bundle, platform } => {
            let bundle = load_bundle(&bundle, platform.as_deref())?;
            let detection = detect::detect(&bundle);
            match detection.platform {
                Some(p) => println!(
                    "Platform: {} (confidence {:.2})",
                    p.name(),
                    detection.confidence
                ),
                None => println!("Platform: unknown"),
            }
            println!("\n{:<28} | match", "signal");
            println!("{}", "-".repeat(36));
            for (name, matched) in &detection.signals {
                println!("{:<28} | {}", name, if *matched { "yes" } else { "no" });
            }
            Ok(())
        }
        Commands::Import { bundle, platform, out } => {
            let job_id = bundle
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("import")
                .to_string();
            let source = load_bundle(&bundle, platform.as_deref())?;

            // Ctrl-C stops fan-out of new entities; in-flight ones finish.
            let cancel = Arc::new(AtomicBool::new(false));
            let cancel_flag = Arc::clone(&cancel);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("cancellation requested, finishing in-flight entities");
                    cancel_flag.store(true, Ordering::SeqCst);
                }
            });

            println!("Importing {} ({} documents)...", job_id, source.docs.len());
            let report = pipeline::run(&source, &job_id, cancel).await?;
            report.print_table();

            if !report.assets.is_empty() {
                println!("{} asset reference(s) collected", report.assets.len());
            }
            if let Some(path) = out {
                let json = serde_json::to_string_pretty(&report)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("writing report to {}", path.display()))?;
                println!("Report written to {}", path.display());
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn load_bundle(path: &PathBuf, platform: Option<&str>) -> anyhow::Result<bundle::SourceBundle> {
    let mut source = bundle::SourceBundle::load(path)
        .with_context(|| format!("loading bundle {}", path.display()))?;
    if let Some(name) = platform {
        let p = detect::Platform::from_name(name)
            .with_context(|| format!("unknown platform {:?}", name))?;
        source.hint = Some(p);
    }
    Ok(source)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
