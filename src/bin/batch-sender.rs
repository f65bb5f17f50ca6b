use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use batch_sender::config::SenderConfig;
use batch_sender::executor::BatchExecutor;
use batch_sender::journal::Journal;
use batch_sender::rpc::http::HttpNodeClient;

const CONFIG_FILE: &str = "sender.json";
const SEND_JOURNAL: &str = "payments_done.txt";
const BALANCE_JOURNAL: &str = "balance_done.txt";

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [mode, input_path] = args.as_slice() else {
        show_usage();
        return Ok(());
    };
    let send = mode.eq_ignore_ascii_case("send");
    let balance = mode.eq_ignore_ascii_case("balance");
    if send == balance {
        show_usage();
        return Ok(());
    }

    let config = SenderConfig::load(Path::new(CONFIG_FILE))?;
    let client = HttpNodeClient::new(&config.node_endpoint);
    let executor = BatchExecutor::new(client, config);

    let input = File::open(input_path)
        .map(BufReader::new)
        .with_context(|| format!("Failed to open `{input_path}`"))?;

    if send {
        let mut journal = Journal::append(SEND_JOURNAL)
            .with_context(|| format!("Failed to open `{SEND_JOURNAL}`"))?;
        executor.run_send(input, &mut journal)?;
    } else {
        let mut journal = Journal::append(BALANCE_JOURNAL)
            .with_context(|| format!("Failed to open `{BALANCE_JOURNAL}`"))?;
        executor.run_balance(input, &mut journal)?;
    }

    tracing::info!("done");
    Ok(())
}

fn show_usage() {
    eprintln!("Invalid arguments");
    eprintln!("Usage:");
    eprintln!("    batch-sender {{send|balance}} <inputfile>");
    eprintln!();
    eprintln!("'send' file format (lines starting with # are ignored):");
    eprintln!("    <address> <amount> <unique_id>");
    eprintln!();
    eprintln!("'balance' file format (lines starting with # are ignored):");
    eprintln!("    <address> <any content (ignored)>");
    eprintln!();
}
