//! tapkey: command-line interface for the password-derived Bitcoin wallet.
//!
//! Every invocation re-derives the wallet from the entered secret; nothing is
//! stored on disk. Chain data comes from an Esplora server (mempool.space by
//! default).

mod config;
mod esplora;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tapkey_core::constants::NETWORK;
use tapkey_core::traits::FeeRateSource;
use tapkey_core::types::AddressType;
use tapkey_wallet::{PreparedSpend, Spender, Wallet, derive_address, parse_mnemonic};
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::esplora::EsploraClient;

/// Password-derived single-key Bitcoin wallet.
#[derive(Parser)]
#[command(name = "tapkey")]
#[command(version, about = "Same password, same address. Spend from it with one command.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the wallet address.
    Address(AddressArgs),
    /// Query the wallet balance.
    Balance(BalanceArgs),
    /// Pay an amount, keeping change.
    Send(SendArgs),
    /// Send the entire confirmed balance.
    Drain(DrainArgs),
    /// Show recommended fee rates.
    Fees,
    /// Show the 24-word backup phrase.
    Mnemonic(MnemonicArgs),
}

#[derive(Args)]
struct KeyArgs {
    /// Enter a BIP-39 phrase instead of a password.
    #[arg(long, conflicts_with = "import")]
    mnemonic: bool,

    /// Spend from ADDRESS using a WIF private key entered at the prompt.
    #[arg(long, value_name = "ADDRESS")]
    import: Option<String>,
}

#[derive(Args)]
struct AddressArgs {
    #[command(flatten)]
    key: KeyArgs,

    /// Also show the legacy and SegWit addresses of the same key.
    #[arg(long)]
    all: bool,
}

#[derive(Args)]
struct BalanceArgs {
    #[command(flatten)]
    key: KeyArgs,

    /// Include unconfirmed value and UTXO counts.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args)]
struct SendArgs {
    #[command(flatten)]
    key: KeyArgs,

    /// Destination address.
    #[arg(short, long)]
    destination: String,

    /// Amount in satoshis.
    #[arg(short, long)]
    amount: u64,

    /// Fee rate in sat/vB (default: fastest recommended).
    #[arg(short = 's', long = "fee-rate")]
    fee_rate: Option<u64>,

    /// Build and sign, print the raw transaction, do not broadcast.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct DrainArgs {
    #[command(flatten)]
    key: KeyArgs,

    /// Destination address.
    #[arg(short, long)]
    destination: String,

    /// Fee rate in sat/vB (default: fastest recommended).
    #[arg(short = 's', long = "fee-rate")]
    fee_rate: Option<u64>,

    /// Build and sign, print the raw transaction, do not broadcast.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct MnemonicArgs {
    #[command(flatten)]
    key: KeyArgs,

    /// Required: confirms the phrase may be printed to the terminal.
    #[arg(long)]
    show: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    debug!(network = %config.network, esplora = %config.esplora_url, "config loaded");

    match cli.command {
        Commands::Address(args) => show_address(args),
        Commands::Balance(args) => show_balance(&config, args).await,
        Commands::Send(args) => send(&config, args).await,
        Commands::Drain(args) => drain(&config, args).await,
        Commands::Fees => show_fees(&config).await,
        Commands::Mnemonic(args) => show_mnemonic(args),
    }
}

fn client(config: &Config) -> Result<EsploraClient> {
    EsploraClient::new(&config.esplora_url, config.http_timeout)
        .context("Failed to build HTTP client")
}

/// Display the wallet address.
fn show_address(args: AddressArgs) -> Result<()> {
    let wallet = load_wallet(&args.key)?;
    if !args.all {
        println!("{}", wallet.address());
        return Ok(());
    }
    for ty in AddressType::SPENDABLE {
        let address = derive_address(wallet.key(), ty).context("Failed to derive address")?;
        println!("{:<14} {}", ty, address);
    }
    Ok(())
}

/// Query and display the wallet balance.
async fn show_balance(config: &Config, args: BalanceArgs) -> Result<()> {
    let wallet = load_wallet(&args.key)?;
    let esplora = client(config)?;
    let spender = Spender::new(&esplora, &esplora);
    let balance = spender
        .balance(&wallet)
        .await
        .context("Failed to fetch UTXOs")?;

    if !args.verbose {
        println!("{}", balance.confirmed);
        return Ok(());
    }
    println!("Address:     {}", wallet.address());
    println!("Confirmed:   {} sats ({} UTXOs)", balance.confirmed, balance.confirmed_count);
    println!(
        "Unconfirmed: {} sats ({} UTXOs)",
        balance.unconfirmed, balance.unconfirmed_count
    );
    Ok(())
}

/// Pay an amount to a destination.
async fn send(config: &Config, args: SendArgs) -> Result<()> {
    let wallet = load_wallet(&args.key)?;
    let esplora = client(config)?;
    let fee_rate = resolve_fee_rate(&esplora, args.fee_rate).await?;
    let spender = Spender::new(&esplora, &esplora);

    if args.dry_run {
        let prepared = spender
            .prepare_payment(&wallet, &args.destination, args.amount, fee_rate)
            .await
            .context("Failed to build transaction")?;
        print_prepared(&prepared);
        return Ok(());
    }

    let receipt = spender
        .send(&wallet, &args.destination, args.amount, fee_rate)
        .await
        .context("Send failed")?;
    println!("Transaction sent: {}", esplora.tx_url(&receipt.txid));
    println!("Fee: {} sats ({} inputs)", receipt.fee, receipt.inputs);
    if let Some(change) = receipt.change {
        println!("Change: {change} sats");
    }
    Ok(())
}

/// Sweep the whole confirmed balance to a destination.
async fn drain(config: &Config, args: DrainArgs) -> Result<()> {
    let wallet = load_wallet(&args.key)?;
    let esplora = client(config)?;
    let fee_rate = resolve_fee_rate(&esplora, args.fee_rate).await?;
    let spender = Spender::new(&esplora, &esplora);

    if args.dry_run {
        let prepared = spender
            .prepare_drain(&wallet, &args.destination, fee_rate)
            .await
            .context("Failed to build transaction")?;
        print_prepared(&prepared);
        return Ok(());
    }

    let receipt = spender
        .drain(&wallet, &args.destination, fee_rate)
        .await
        .context("Drain failed")?;
    println!("Transaction sent: {}", esplora.tx_url(&receipt.txid));
    println!("Fee: {} sats ({} inputs)", receipt.fee, receipt.inputs);
    Ok(())
}

async fn show_fees(config: &Config) -> Result<()> {
    let fees = client(config)?
        .recommended()
        .await
        .context("Failed to fetch fee rates")?;
    println!("Fastest:   {} sat/vB", fees.fastest_fee);
    println!("Half hour: {} sat/vB", fees.half_hour_fee);
    println!("Hour:      {} sat/vB", fees.hour_fee);
    println!("Economy:   {} sat/vB", fees.economy_fee);
    println!("Minimum:   {} sat/vB", fees.minimum_fee);
    Ok(())
}

fn show_mnemonic(args: MnemonicArgs) -> Result<()> {
    if !args.show {
        bail!("Refusing to print the backup phrase without --show");
    }
    let wallet = load_wallet(&args.key)?;
    let Some(mnemonic) = wallet.mnemonic() else {
        bail!("Imported keys have no backup phrase");
    };
    println!("{mnemonic}");
    Ok(())
}

fn print_prepared(prepared: &PreparedSpend) {
    println!("Txid: {}", prepared.signed.txid());
    println!(
        "Fee: {} sats ({} inputs)",
        prepared.signed.fee,
        prepared.selection.selected.len()
    );
    println!("{}", prepared.signed.hex);
}

async fn resolve_fee_rate(source: &dyn FeeRateSource, explicit: Option<u64>) -> Result<u64> {
    if let Some(rate) = explicit {
        return Ok(rate);
    }
    let fees = source
        .recommended()
        .await
        .context("Failed to fetch fee rates (pass --fee-rate to skip)")?;
    Ok(fees.fastest_fee)
}

/// Derive the wallet from whichever secret the flags ask for.
fn load_wallet(args: &KeyArgs) -> Result<Wallet> {
    if let Some(address) = &args.import {
        let wif = prompt_secret("WIF private key")?;
        return Wallet::from_wif(wif.trim(), address).context("Failed to import key");
    }
    if args.mnemonic {
        let phrase = prompt_secret("Mnemonic")?;
        let mnemonic = parse_mnemonic(&phrase)?;
        return Wallet::from_mnemonic(mnemonic, NETWORK).context("Failed to derive wallet");
    }
    let password = prompt_secret("Password")?;
    Wallet::from_secret(&password).context("Failed to derive wallet")
}

/// Prompt for a secret without echo. Empty input is rejected.
fn prompt_secret(prompt: &str) -> Result<Zeroizing<String>> {
    let secret = Zeroizing::new(
        rpassword::prompt_password(format!("{prompt}: ")).context("Failed to read input")?,
    );
    if secret.is_empty() {
        bail!("{prompt} must not be empty");
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn send_flags_parse() {
        let cli = Cli::try_parse_from([
            "tapkey", "send", "-d", "bc1qdest", "-a", "4000", "-s", "12", "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Send(args) => {
                assert_eq!(args.destination, "bc1qdest");
                assert_eq!(args.amount, 4_000);
                assert_eq!(args.fee_rate, Some(12));
                assert!(args.dry_run);
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn mnemonic_and_import_conflict() {
        let res = Cli::try_parse_from([
            "tapkey", "address", "--mnemonic", "--import", "bc1qsource",
        ]);
        assert!(res.is_err());
    }
}
