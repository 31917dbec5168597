//! Quorum signer CLI
//!
//! Build sign requests, sign them with local keys, and combine the results
//! into M-of-N multisig transactions.

use clap::{Parser, Subcommand};
use quorum_signer::cli::{self, AppState, PaymentParams, ADDR_SEPARATOR};
use quorum_signer::crypto::Address;
use quorum_signer::multisig::parse_addrs;
use quorum_signer::signer::QuorumConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quorum")]
#[command(version = "0.1.0")]
#[command(about = "M-of-N quorum transaction signer", long_about = None)]
struct Cli {
    /// Data directory for key files
    #[arg(short, long, default_value = ".quorum")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new key
    Keygen {
        /// Optional label for the key
        #[arg(short, long)]
        label: Option<String>,
    },

    /// List stored keys
    Keys,

    /// Show the account for a participant list
    Address {
        /// Participant addresses (comma-separated, in slot order)
        #[arg(short, long)]
        addrs: String,

        /// Number of signatures required
        #[arg(short, long, default_value = "1")]
        threshold: u8,
    },

    /// Build a payment sign request
    Txn {
        /// Sending account
        #[arg(short, long)]
        from: Address,

        /// Receivers (comma-separated); one transaction each
        #[arg(short, long)]
        to: String,

        /// Amount per transaction
        #[arg(short, long)]
        amount: u64,

        /// First valid round
        #[arg(long, default_value = "1")]
        first_valid: u64,

        /// Last valid round
        #[arg(long)]
        last_valid: Option<u64>,

        #[arg(long)]
        fee: Option<u64>,

        #[arg(long)]
        genesis_id: Option<String>,

        #[arg(long)]
        note: Option<String>,

        /// Output request file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Sign a request with one stored key
    Sign {
        /// Address of the stored key
        #[arg(short, long)]
        key: Address,

        /// Request file
        #[arg(short, long)]
        request: PathBuf,

        /// Sign natively for this multisig participant list
        #[arg(long)]
        addrs: Option<String>,

        #[arg(short, long, default_value = "1")]
        threshold: u8,

        /// Only sign transactions from this sender
        #[arg(long)]
        match_sender: Option<Address>,

        /// Output response file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Convert single signatures in a response into multisig slots
    Convert {
        /// Response file
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        addrs: String,

        #[arg(short, long)]
        threshold: u8,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Merge multisig responses from several signers
    Merge {
        /// Response files
        #[arg(short, long, num_args = 1.., required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Verify every signed entry of a response
    Verify {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Collect a quorum of signatures from the stored keys
    Quorum {
        /// Request file
        #[arg(short, long)]
        request: PathBuf,

        /// Participant addresses (comma-separated, in slot order)
        #[arg(short, long)]
        addrs: String,

        #[arg(short, long, default_value = "1")]
        threshold: u8,

        /// Have participants sign natively instead of returning plain signatures
        #[arg(long)]
        native: bool,

        /// Keep multisig envelopes that lack an authorizing address as they are
        #[arg(long)]
        no_auth_addr_shim: bool,

        /// Log signing progress at info level
        #[arg(long)]
        debug: bool,

        /// Output response file
        #[arg(short, long)]
        output: PathBuf,

        /// Also write the raw concatenated transactions
        #[arg(long)]
        raw: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Commands that only touch files need no key store
    match &cli.command {
        Commands::Address { addrs, threshold } => return cli::cmd_address(addrs, *threshold),
        Commands::Convert {
            input,
            addrs,
            threshold,
            output,
        } => return cli::cmd_convert(input, addrs, *threshold, output),
        Commands::Merge { inputs, output } => return cli::cmd_merge(inputs, output),
        Commands::Verify { input } => return cli::cmd_verify(input),
        _ => {}
    }

    let state = AppState::new(cli.data_dir.clone())?;
    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Address { .. }
        | Commands::Convert { .. }
        | Commands::Merge { .. }
        | Commands::Verify { .. } => unreachable!(),

        Commands::Keygen { label } => {
            cli::cmd_keygen(&state, label.as_deref())?;
        }

        Commands::Keys => {
            cli::cmd_keys(&state)?;
        }

        Commands::Txn {
            from,
            to,
            amount,
            first_valid,
            last_valid,
            fee,
            genesis_id,
            note,
            output,
        } => {
            let params = PaymentParams {
                sender: from,
                receivers: parse_addrs(&to, ADDR_SEPARATOR)?,
                amount,
                first_valid,
                last_valid,
                fee,
                genesis_id,
                note,
            };
            cli::cmd_txn(params, &output)?;
        }

        Commands::Sign {
            key,
            request,
            addrs,
            threshold,
            match_sender,
            output,
        } => {
            let multisig = addrs.as_deref().map(|addrs| (addrs, threshold));
            rt.block_on(cli::cmd_sign(
                &state,
                &key,
                &request,
                multisig,
                match_sender,
                &output,
            ))?;
        }

        Commands::Quorum {
            request,
            addrs,
            threshold,
            native,
            no_auth_addr_shim,
            debug,
            output,
            raw,
        } => {
            let config = QuorumConfig {
                auth_addr_shim: !no_auth_addr_shim,
                debug,
            };
            rt.block_on(cli::cmd_quorum(
                &state,
                &request,
                &addrs,
                threshold,
                native,
                config,
                &output,
                raw.as_deref(),
            ))?;
        }
    }

    Ok(())
}
