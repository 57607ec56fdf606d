use std::error::Error;

use bitcoin::network::constants::Network;
use clap::Parser;
use tracing::info;

use utxocensus::census;
use utxocensus::config::{default_export_paths, get_global_config, get_str, init_global_config};
use utxocensus::rpc_ledger::RpcLedger;
use utxocensus::telemetry::{init_tracing, TelemetryConfig};

#[derive(Parser, Debug)]
#[clap(name = "utxocensus")]
#[clap(
    about = "Rebuild the UTXO set from a fully-synced node and export per-address balances",
    long_about = None
)]
struct Args {
    /// JSON-RPC endpoint of the synced node (overrides config rpc.url)
    #[clap(long)]
    rpc_url: Option<String>,

    /// RPC username (overrides config rpc.user)
    #[clap(long)]
    rpc_user: Option<String>,

    /// RPC password (overrides config rpc.pass)
    #[clap(long)]
    rpc_pass: Option<String>,

    /// Network the node runs on: "main" or "test"
    #[clap(long)]
    network: Option<String>,

    /// Inclusive top height of the scan (defaults to the node tip)
    #[clap(long)]
    height: Option<u64>,

    /// UTXO table destination (default <network>net_utxo.csv)
    #[clap(long)]
    utxo_file: Option<String>,

    /// Address table destination (default <network>net_address.csv)
    #[clap(long)]
    address_file: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    init_global_config()?;
    init_tracing(TelemetryConfig::default())?;

    let rpc_url = args
        .rpc_url
        .unwrap_or_else(|| get_str("rpc.url", "http://127.0.0.1:51473"));
    let rpc_user = args.rpc_user.unwrap_or_else(|| get_str("rpc.user", ""));
    let rpc_pass = args.rpc_pass.unwrap_or_else(|| get_str("rpc.pass", ""));

    let network_name = args
        .network
        .unwrap_or_else(|| get_str("scan.network", "main"));
    let network = match network_name.as_str() {
        "main" => Network::Bitcoin,
        "test" => Network::Testnet,
        other => return Err(format!("unknown network: {}", other).into()),
    };

    let ledger = RpcLedger::new(rpc_url, rpc_user, rpc_pass, network);

    let total_height = match args.height {
        Some(height) => height,
        None => match get_global_config().get_int("scan.height") {
            Ok(height) if height >= 0 => height as u64,
            _ => ledger.block_count()?,
        },
    };
    info!(total_height, network = %network_name, "height exported");

    let (default_utxo, default_address) = default_export_paths(&network_name);
    let utxo_file = expand(args.utxo_file.unwrap_or_else(|| get_str("export.utxo_file", &default_utxo)));
    let address_file = expand(
        args.address_file
            .unwrap_or_else(|| get_str("export.address_file", &default_address)),
    );

    let summary = census::run(&ledger, total_height, &utxo_file, &address_file);
    info!(
        residual_transactions = summary.residual_transactions,
        residual_utxos = summary.residual_utxos,
        addresses = summary.addresses,
        utxo_rows = summary.utxo_rows,
        address_rows = summary.address_rows,
        "census complete"
    );

    Ok(())
}

fn expand(path: String) -> String {
    shellexpand::tilde(&path).to_string()
}
