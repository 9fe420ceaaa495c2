use std::io::{self, BufRead as _, Write as _};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};

use btc_node_lib::chain::HeaderChain;
use btc_node_lib::config::Config;
use btc_node_lib::p2p::Node;
use btc_primitives::entropy::{self, MIN_USER_INPUTS};
use btc_primitives::hash::sha256;
use btc_primitives::keys::PrivateKey;
use btc_primitives::{Network, U256};

/// The worked-example secret from Mastering Bitcoin, for reproducing the
/// book's address.
const MASTERING_SECRET: &str = "0x3aba4162c7251c891207b747840551a71939b0de081f85c4e44cf7c13e41daa6";

#[derive(Parser)]
#[command(name = "btc-node", about = "From-scratch Bitcoin keys, hashes, and header sync")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum KeyMode {
    /// OS randomness.
    Os,
    /// Keyboard-timing entropy.
    User,
    /// The fixed Mastering Bitcoin test vector.
    Mastering,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a key and print its compressed P2PKH address.
    #[command(name = "getnewaddress")]
    GetNewAddress {
        #[arg(long, value_enum, default_value = "os")]
        mode: KeyMode,
        #[arg(long)]
        testnet: bool,
    },
    /// Print the hex digest of a file's contents.
    #[command(name = "sha256")]
    Sha256 { path: PathBuf },
    /// Generate and print a private key scalar as 0x-prefixed hex.
    #[command(name = "private-key")]
    PrivateKey {
        #[arg(long, value_enum, default_value = "os")]
        mode: KeyMode,
    },
    /// Print the public point of a hex scalar, X and Y in uppercase hex.
    #[command(name = "public-key")]
    PublicKey { hex_scalar: String },
    /// Connect to a peer and walk the header chain, validating as we go.
    #[command(name = "sync-headers")]
    SyncHeaders {
        /// Path to the configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::GetNewAddress { mode, testnet } => {
            let key = key_for_mode(mode)?;
            let network = if testnet {
                Network::Testnet
            } else {
                Network::Mainnet
            };
            println!("{}", key.public_key().address(true, network));
        }
        Command::Sha256 { path } => {
            let contents = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            println!("{}", hex::encode(sha256(&contents)));
        }
        Command::PrivateKey { mode } => {
            if mode == KeyMode::Mastering {
                bail!("the mastering vector is for getnewaddress only");
            }
            println!("{}", key_for_mode(mode)?);
        }
        Command::PublicKey { hex_scalar } => {
            let key = PrivateKey::new(U256::from_hex(&hex_scalar)?)?;
            let public = key.public_key();
            let point = public.point();
            println!("X: {:X}", point.x().expect("public keys are never infinity"));
            println!("Y: {:X}", point.y().expect("public keys are never infinity"));
        }
        Command::SyncHeaders { config } => {
            let config = Config::new(&config)?;
            run_sync(&config)?;
        }
    }
    Ok(())
}

fn key_for_mode(mode: KeyMode) -> anyhow::Result<PrivateKey> {
    match mode {
        KeyMode::Os => Ok(entropy::secret_from_os()),
        KeyMode::User => collect_user_entropy(),
        KeyMode::Mastering => Ok(PrivateKey::from_hex(MASTERING_SECRET)?),
    }
}

/// Prompts for free-text lines and folds keystroke timing into each one
/// before handing the batch to the entropy mixer.
fn collect_user_entropy() -> anyhow::Result<PrivateKey> {
    let started = Instant::now();
    let stdin = io::stdin();
    let mut inputs = Vec::with_capacity(MIN_USER_INPUTS);

    eprintln!("Type {MIN_USER_INPUTS} random phrases; timing between them is mixed in.");
    for i in 1..=MIN_USER_INPUTS {
        eprint!("[{i}/{MIN_USER_INPUTS}] > ");
        io::stderr().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            bail!("stdin closed before {MIN_USER_INPUTS} inputs were collected");
        }
        inputs.push(format!("{}|{}", line.trim_end(), started.elapsed().as_nanos()));
    }

    Ok(entropy::secret_from_user(inputs)?)
}

/// The header walk: getheaders/headers rounds feeding the validating
/// chain, until the configured height. Transient peer trouble is logged
/// and retried; an invalid header is fatal.
fn run_sync(config: &Config) -> anyhow::Result<()> {
    let network = config.network;
    let target_height = config.sync.target_height;
    let max_failures = config.sync.max_consecutive_failures.unwrap_or(5);

    let mut chain = HeaderChain::new(network);
    let mut node = Node::connect(
        &config.peer.host,
        config.peer_port(),
        network,
        config.peer.read_timeout_sec.map(Duration::from_secs),
        config.peer.write_timeout_sec.map(Duration::from_secs),
    )?;
    node.handshake()?;
    info!(target: "sync", "walking headers to height {target_height}");

    let mut consecutive_failures = 0u32;
    while chain.height() < target_height {
        let batch = match node.get_headers(chain.tip_hash()) {
            Ok(batch) => batch,
            Err(e) => {
                consecutive_failures += 1;
                warn!(target: "sync", "header round failed ({consecutive_failures}/{max_failures}): {e}");
                if consecutive_failures >= max_failures {
                    bail!("giving up after {consecutive_failures} consecutive failed rounds");
                }
                std::thread::sleep(Duration::from_secs(1));
                continue;
            }
        };
        consecutive_failures = 0;

        if batch.is_empty() {
            info!(target: "sync", "peer has no headers past height {}", chain.height());
            break;
        }
        for header in batch {
            chain
                .append(header)
                .with_context(|| format!("rejected header after height {}", chain.height()))?;
            if chain.height() >= target_height {
                break;
            }
        }
        info!(
            target: "sync",
            "height {} of {target_height}, tip {}",
            chain.height(),
            chain.tip_hash().to_display_hex()
        );
    }

    println!(
        "synced to height {}: {} (chain work {:x})",
        chain.height(),
        chain.tip_hash().to_display_hex(),
        chain.chain_work()
    );
    Ok(())
}
