//! Claims an issued voucher pair from the player's wallet: Base first, then Celo.
//!
//! Reads the `/game/submit` response, checks both claims offline, then submits
//! them in order. Progress is saved to `--session` so an interrupted run can be
//! resumed without resubmitting a confirmed chain.

use anyhow::{Context, Result, bail};
use clap::Parser;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use voucher_oracle::claim::VaultEndpoint;
use voucher_oracle::voucher::format_token_amount;
use voucher_oracle::{
    ChainId, ClaimOrchestrator, ClaimPhase, ClaimSession, ClaimSignatures, EthersVaultGateway,
};

#[derive(Parser, Debug)]
#[command(name = "voucher-claim", about = "Claim a voucher pair on Base and Celo")]
pub struct Args {
    /// Win response JSON as returned by POST /game/submit
    #[arg(long, env = "VOUCHER_RESPONSE_FILE")]
    pub voucher: PathBuf,

    /// Progress file; resumed when present, written on exit
    #[arg(long, env = "VOUCHER_CLAIM_SESSION")]
    pub session: Option<PathBuf>,

    #[arg(long, env = "PLAYER_PRIVATE_KEY")]
    pub private_key: LocalWallet,

    #[arg(long, env = "BASE_RPC_URL", default_value = "https://mainnet.base.org")]
    pub base_rpc_url: String,

    #[arg(long, env = "BASE_VAULT_CONTRACT_ADDRESS")]
    pub base_vault: Address,

    #[arg(long, env = "CELO_RPC_URL", default_value = "https://forno.celo.org")]
    pub celo_rpc_url: String,

    #[arg(long, env = "CELO_VAULT_CONTRACT_ADDRESS")]
    pub celo_vault: Address,

    /// Refuse to submit unless both claims recover to this address
    #[arg(long, env = "VOUCHER_SIGNER_ADDRESS")]
    pub expected_signer: Option<Address>,

    /// Submissions per chain before giving up
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    #[arg(long, default_value_t = 1)]
    pub confirmations: usize,

    /// Verify the claims and exit without sending transactions
    #[arg(long)]
    pub dry_run: bool,
}

/// The parts of the win response this tool needs
#[derive(Debug, Deserialize)]
struct WinResponseFile {
    signature: ClaimSignatures,
}

fn load_claims(path: &Path) -> Result<ClaimSignatures> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let response: WinResponseFile = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a win response", path.display()))?;
    Ok(response.signature)
}

fn load_session(path: &Path) -> Result<Option<ClaimSession>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let session = serde_json::from_str(&raw)
        .with_context(|| format!("Corrupt claim session {}", path.display()))?;
    Ok(Some(session))
}

fn save_session(path: &Path, session: &ClaimSession) -> Result<()> {
    let raw = serde_json::to_string_pretty(session)?;
    std::fs::write(path, raw).with_context(|| format!("Failed to write {}", path.display()))
}

/// Decode and recover both claims before any gas is spent
fn check_claims(claims: &ClaimSignatures, expected: Option<Address>) -> Result<()> {
    for chain in ChainId::ALL {
        let claim = claims.get(chain);
        let fields = claim
            .fields()
            .with_context(|| format!("Malformed {} voucher", chain))?;
        let signer = claim
            .recover_signer()
            .with_context(|| format!("Unrecoverable {} signature", chain))?;

        info!(
            %chain,
            signer = ?signer,
            nonce = %fields.nonce,
            "{} {} + {} {}",
            format_token_amount(fields.primary_amount),
            chain.primary_symbol(),
            format_token_amount(fields.secondary_amount),
            chain.secondary_symbol(),
        );

        if let Some(expected) = expected {
            if signer != expected {
                bail!(
                    "{} voucher signed by {:?}, expected {:?}",
                    chain,
                    signer,
                    expected
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let claims = load_claims(&args.voucher)?;
    check_claims(&claims, args.expected_signer)?;

    if args.dry_run {
        info!("Dry run, nothing submitted");
        return Ok(());
    }

    info!(player = ?args.private_key.address(), "Claiming from player wallet");
    let gateway = EthersVaultGateway::new(
        args.private_key,
        vec![
            (
                ChainId::Base,
                VaultEndpoint {
                    rpc_url: args.base_rpc_url,
                    vault: args.base_vault,
                },
            ),
            (
                ChainId::Celo,
                VaultEndpoint {
                    rpc_url: args.celo_rpc_url,
                    vault: args.celo_vault,
                },
            ),
        ],
    )?
    .with_confirmations(args.confirmations);

    let resumed = match &args.session {
        Some(path) => load_session(path)?
            .filter(|session| session.claims() == Some(&claims)),
        None => None,
    };
    let mut orchestrator = match resumed {
        Some(session) => {
            info!(phase = ?session.phase(), "Resuming claim session");
            ClaimOrchestrator::resume(gateway, session)
        }
        None => {
            let mut orchestrator = ClaimOrchestrator::new(gateway);
            orchestrator.receive(claims);
            orchestrator
        }
    };

    let cancel = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => warn!("Interrupted, stopping after the current step"),
            Err(_) => std::future::pending::<()>().await,
        }
    };
    let outcome = orchestrator.run(args.max_attempts, cancel).await;

    if let Some(path) = &args.session {
        save_session(path, orchestrator.session())?;
    }

    match outcome? {
        ClaimPhase::Complete => {
            println!(
                "{}",
                serde_json::to_string_pretty(orchestrator.session().receipts())?
            );
            Ok(())
        }
        phase => {
            warn!(?phase, "Claim not finished; rerun with the same --session to resume");
            Ok(())
        }
    }
}
