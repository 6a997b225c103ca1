use clap::{ArgGroup, Parser, ValueEnum};
use miette::{IntoDiagnostic, Result, miette};
use pixsend::application::flow::{FlowController, FlowPorts, FlowState};
use pixsend::config::{DEFAULT_STEP_UP_THRESHOLD, FlowConfig};
use pixsend::domain::money::{Balance, Currency};
use pixsend::domain::ports::FlowObserverRef;
use pixsend::domain::target::EntryMethod;
use pixsend::infrastructure::console::ConsoleAuthenticator;
use pixsend::infrastructure::http_gateway::HttpPaymentGateway;
use pixsend::infrastructure::in_memory::{InMemorySession, InMemoryWallet};
use pixsend::interfaces::csv::receipt_journal::ReceiptJournal;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum CurrencyArg {
    Brl,
    Usd,
}

impl From<CurrencyArg> for Currency {
    fn from(arg: CurrencyArg) -> Self {
        match arg {
            CurrencyArg::Brl => Currency::Brl,
            CurrencyArg::Usd => Currency::Usd,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("target").required(true).args(["key", "paste"])))]
struct Cli {
    /// Recipient key: tax id, email, phone or random key
    #[arg(long)]
    key: Option<String>,

    /// Copy-and-paste payment code
    #[arg(long)]
    paste: Option<String>,

    /// Amount to send, in the currency's local notation (e.g. "100,00")
    #[arg(long)]
    amount: String,

    /// Available wallet balance
    #[arg(long, env = "PIXSEND_BALANCE")]
    balance: Decimal,

    /// Signed-in user sending the payment
    #[arg(long, env = "PIXSEND_USER_ID")]
    user_id: Option<String>,

    #[arg(long, env = "PIXSEND_GATEWAY_URL", default_value = "http://localhost:8000")]
    gateway_url: String,

    /// Gateway request timeout in milliseconds
    #[arg(long, default_value_t = 15_000)]
    timeout_ms: u64,

    #[arg(long, value_enum, default_value_t = CurrencyArg::Brl)]
    currency: CurrencyArg,

    /// Amounts above this ask for confirmation before sending
    #[arg(long)]
    step_up_threshold: Option<Decimal>,

    /// Append the receipt to this CSV file
    #[arg(long)]
    receipt_log: Option<PathBuf>,

    /// Print the receipt as JSON instead of share text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = FlowConfig {
        currency: cli.currency.into(),
        step_up_threshold: cli.step_up_threshold.unwrap_or(DEFAULT_STEP_UP_THRESHOLD),
        ..FlowConfig::default()
    };

    let gateway = HttpPaymentGateway::new(&cli.gateway_url, Duration::from_millis(cli.timeout_ms))
        .into_diagnostic()?;
    let identity = match cli.user_id {
        Some(user_id) => InMemorySession::signed_in(user_id),
        None => InMemorySession::new(),
    };
    let observer = cli
        .receipt_log
        .map(|path| Arc::new(ReceiptJournal::new(path)) as FlowObserverRef);

    let ports = FlowPorts {
        capture: None,
        gateway: Arc::new(gateway),
        authenticator: Arc::new(ConsoleAuthenticator::stdin()),
        identity: Arc::new(identity),
        balance: Arc::new(InMemoryWallet::new(Balance::new(cli.balance))),
        observer,
    };
    let mut flow = FlowController::new(config, ports);

    let (method, input) = match (cli.key, cli.paste) {
        (Some(key), _) => (EntryMethod::TypedKey, key),
        (None, Some(code)) => (EntryMethod::PastedCode, code),
        (None, None) => return Err(miette!("either --key or --paste is required")),
    };

    flow.choose_method(method).await.into_diagnostic()?;
    flow.submit_entry(&input).into_diagnostic()?;
    flow.confirm_amount(&cli.amount).await.into_diagnostic()?;
    if matches!(flow.state(), FlowState::StepUp { .. }) {
        flow.complete_step_up().await.into_diagnostic()?;
    }
    flow.await_outcome().await.into_diagnostic()?;

    let receipt = flow
        .receipt()
        .ok_or_else(|| miette!("payment did not complete"))?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(receipt).into_diagnostic()?);
    } else {
        print!("{}", receipt.share_text());
    }

    Ok(())
}
