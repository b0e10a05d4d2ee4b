use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use slipwise::application::billing::BillingService;
use slipwise::application::pipeline::{PipelinePolicy, ResolutionPolicy, SettlementPipeline};
use slipwise::application::router::RouterReply;
use slipwise::domain::bill::SplitPolicy;
use slipwise::domain::ports::BillStoreBox;
use slipwise::infrastructure::in_memory::InMemoryBillStore;
use slipwise::infrastructure::qr::ImageQrScanner;
#[cfg(feature = "storage-rocksdb")]
use slipwise::infrastructure::rocksdb::RocksDbBillStore;
use slipwise::infrastructure::vision::{OpenAiVisionExtractor, VisionConfig};
use slipwise::interfaces::reply::Reply;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage group bills
    #[command(subcommand)]
    Bill(BillCommand),
    /// Verify a payment slip image against the group's active bill
    #[command(subcommand)]
    Slip(SlipCommand),
}

#[derive(Subcommand)]
enum BillCommand {
    /// Create a bill and split it among the given members
    Create {
        #[arg(long)]
        group: String,
        #[arg(long)]
        title: String,
        /// Bill total, e.g. 300.00
        #[arg(long)]
        total: String,
        #[arg(long, value_enum, default_value = "equal")]
        policy: PolicyArg,
        /// Member id; repeat once per member
        #[arg(long = "member", required = true)]
        members: Vec<String>,
    },
    /// Show the group's active bill and who has paid
    Status {
        #[arg(long)]
        group: String,
    },
}

#[derive(Subcommand)]
enum SlipCommand {
    /// Run the verification pipeline on a slip image
    Verify {
        /// Slip image file
        image: PathBuf,
        #[arg(long)]
        group: String,
        #[arg(long)]
        payer: String,
        /// Proceed to extraction even when no QR code is detected
        #[arg(long)]
        allow_missing_qr: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Equal,
    Each,
}

impl From<PolicyArg> for SplitPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Equal => Self::Equal,
            PolicyArg::Each => Self::Each,
        }
    }
}

fn open_store(db_path: Option<PathBuf>) -> Result<BillStoreBox> {
    match db_path {
        Some(path) => {
            #[cfg(feature = "storage-rocksdb")]
            {
                let store = RocksDbBillStore::open(path).into_diagnostic()?;
                Ok(Box::new(store))
            }
            #[cfg(not(feature = "storage-rocksdb"))]
            {
                let _ = path;
                eprintln!(
                    "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
                );
                Ok(Box::new(InMemoryBillStore::new()))
            }
        }
        None => Ok(Box::new(InMemoryBillStore::new())),
    }
}

fn vision_from_env() -> Result<OpenAiVisionExtractor> {
    let api_key = std::env::var("VISION_API_KEY")
        .map_err(|_| miette::miette!("VISION_API_KEY is not set"))?;
    let base_url = std::env::var("VISION_API_URL")
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
    let model = std::env::var("VISION_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
    let timeout = std::env::var("VISION_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(VisionConfig::DEFAULT_TIMEOUT);

    OpenAiVisionExtractor::new(VisionConfig {
        base_url,
        api_key,
        model,
        timeout,
    })
    .into_diagnostic()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = open_store(cli.db_path)?;

    match cli.command {
        Command::Bill(BillCommand::Create {
            group,
            title,
            total,
            policy,
            members,
        }) => {
            let total = Decimal::from_str(&total).into_diagnostic()?;
            let billing = BillingService::new(store);
            let bill = billing
                .create_bill(&group, &title, total, policy.into(), &members)
                .await
                .into_diagnostic()?;
            println!(
                "Created bill \"{}\" ({}) for {} members",
                bill.title,
                bill.id,
                members.len()
            );
        }
        Command::Bill(BillCommand::Status { group }) => {
            let billing = BillingService::new(store);
            let status = billing.bill_status(&group).await.into_diagnostic()?;
            match status {
                None => println!("No bills for group {group}"),
                Some(status) => {
                    println!(
                        "{}: total {} ({}/{} paid)",
                        status.bill.title,
                        status.bill.total,
                        status.paid_count(),
                        status.obligations.len()
                    );
                    for obligation in &status.obligations {
                        println!(
                            "{},{},{}",
                            obligation.payer_id,
                            obligation.due,
                            if obligation.is_paid() { "paid" } else { "unpaid" }
                        );
                    }
                }
            }
        }
        Command::Slip(SlipCommand::Verify {
            image,
            group,
            payer,
            allow_missing_qr,
        }) => {
            let extractor = vision_from_env()?;
            let bytes = std::fs::read(image).into_diagnostic()?;
            let pipeline = SettlementPipeline::with_policy(
                store,
                Box::new(extractor),
                Box::new(ImageQrScanner::new()),
                PipelinePolicy {
                    require_qr: !allow_missing_qr,
                    resolution: ResolutionPolicy::LatestBill,
                },
            );
            let outcome = pipeline
                .process_slip(&group, &payer, &bytes)
                .await
                .into_diagnostic()?;
            let reply = Reply::render(&RouterReply::Slip(outcome));
            println!("{}", reply.alt_text);
        }
    }

    Ok(())
}
