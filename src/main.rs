use anyhow::{Context, bail};
use case_ingest::services::transport::ProgressFn;
use case_ingest::{IngestConfig, IngestError, SourceFile, build_pipeline};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Production case ingestion for the warehouse console", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a production spreadsheet and submit it to one or more shipments
    Ingest {
        /// Path to the .xlsx/.xls/.csv file
        #[arg(short, long)]
        file: PathBuf,

        /// Target shipment id (repeat for fan-out)
        #[arg(short, long = "shipment", required = true)]
        shipments: Vec<String>,

        /// Skip the interactive confirmation
        #[arg(short, long)]
        yes: bool,

        /// Wipe locked shipments first, then re-ingest
        #[arg(long)]
        wipe_first: bool,
    },

    /// Delete ALL production records for a shipment
    Wipe {
        #[arg(short, long)]
        shipment: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "case_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = IngestConfig::from_env();
    let pipeline = build_pipeline(config).await;

    match args.command {
        Command::Ingest {
            file,
            shipments,
            yes,
            wipe_first,
        } => {
            let source = SourceFile::from_path(&file)
                .await
                .with_context(|| format!("could not read {}", file.display()))?;

            let batch = pipeline.prepare(&source)?;

            if !batch.row_errors.is_empty() {
                println!("⚠️  {} row(s) failed validation:", batch.row_errors.len());
                for (row, messages) in &batch.row_errors {
                    for message in messages {
                        println!("   row {}: {}", row, message);
                    }
                }
            }
            println!(
                "Parsed {} valid case(s) for shipment(s) {}",
                batch.records.len(),
                shipments.join(", ")
            );

            let mut selection = pipeline.shipments(&shipments).await?;

            let locked: Vec<String> = selection
                .iter()
                .filter(|s| s.production_uploaded)
                .map(|s| s.id.clone())
                .collect();
            if !locked.is_empty() && wipe_first {
                for id in &locked {
                    let wiped = pipeline.wipe(id).await?;
                    info!("🧹 wiped {} record(s) from {}", wiped.total_deletes, id);
                }
                // The wildcard's server-side effect on the lock flag is
                // undocumented; re-read instead of assuming it cleared.
                selection = pipeline.shipments(&shipments).await?;
            }

            if !yes && !confirm(batch.records.len(), &shipments)? {
                bail!("aborted by operator");
            }

            let result = pipeline
                .ingest(&source, &batch, &selection, progress_meter())
                .await?;
            println!();
            println!("✅ Submitted {} item(s)", result.total_items);
            for (shipment, count) in &result.per_shipment_counts {
                println!("   {}: {}", shipment, count);
            }
        }

        Command::Wipe { shipment } => {
            let result = pipeline.wipe(&shipment).await;
            match result {
                Ok(wiped) => {
                    println!("✅ Deleted {} record(s) from {}", wiped.total_deletes, shipment)
                }
                Err(e @ IngestError::DeletionFailed(_)) => {
                    warn!("delete was not applied");
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

fn confirm(record_count: usize, shipments: &[String]) -> anyhow::Result<bool> {
    print!(
        "Submit {} case(s) to {} shipment(s)? [y/N] ",
        record_count,
        shipments.len()
    );
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn progress_meter() -> ProgressFn {
    Arc::new(|percent| {
        eprint!("\r📤 uploading… {:>3}%", percent);
        if percent >= 100 {
            eprintln!();
        }
    })
}
