use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use ethers::abi::Token;
use ethers::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::voucher::{ChainId, SignedClaim};

/// Solidity signature of the vault's withdrawal entry point
pub const CLAIM_FUNCTION: &str = "claim(bytes,uint8,bytes32,bytes32)";

/// Confirmed on-chain claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimReceipt {
    pub chain: ChainId,
    pub tx_hash: H256,
    pub block_number: Option<u64>,
}

/// Final state of a broadcast claim transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed(ClaimReceipt),
    /// Reverted or dropped; the transaction will never confirm
    Failed(String),
}

/// Submits claims to the chains' vaults in two steps.
///
/// `send_claim` broadcasts and returns the transaction hash. An error means
/// nothing was broadcast. `await_confirmation` follows a hash to its final
/// state. An error from it means the state could not be observed, so the
/// transaction may still land.
#[async_trait]
pub trait VaultGateway: Send + Sync {
    async fn send_claim(&self, chain: ChainId, claim: &SignedClaim) -> Result<H256>;

    async fn await_confirmation(&self, chain: ChainId, tx_hash: H256) -> Result<Confirmation>;
}

/// Calldata for `claim(bytes databytes, uint8 v, bytes32 r, bytes32 s)`
pub fn encode_claim_call(claim: &SignedClaim) -> Bytes {
    let mut calldata = ethers::utils::id(CLAIM_FUNCTION).to_vec();
    calldata.extend(ethers::abi::encode(&[
        Token::Bytes(claim.databytes.to_vec()),
        Token::Uint(U256::from(claim.v)),
        Token::FixedBytes(claim.r.as_bytes().to_vec()),
        Token::FixedBytes(claim.s.as_bytes().to_vec()),
    ]));
    Bytes::from(calldata)
}

/// RPC endpoint and vault contract for one chain
#[derive(Debug, Clone)]
pub struct VaultEndpoint {
    pub rpc_url: String,
    pub vault: Address,
}

type ChainClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// JSON-RPC backed gateway that sends claims from the player's wallet
pub struct EthersVaultGateway {
    clients: HashMap<ChainId, (Arc<ChainClient>, Address)>,
    confirmations: usize,
}

impl EthersVaultGateway {
    pub fn new(wallet: LocalWallet, endpoints: Vec<(ChainId, VaultEndpoint)>) -> Result<Self> {
        let mut clients = HashMap::new();
        for (chain, endpoint) in endpoints {
            let provider = Provider::<Http>::try_from(endpoint.rpc_url.as_str())
                .with_context(|| format!("Invalid RPC URL for {}", chain))?;
            let signer = wallet.clone().with_chain_id(chain.evm_chain_id());
            let client = Arc::new(SignerMiddleware::new(provider, signer));
            clients.insert(chain, (client, endpoint.vault));
        }

        Ok(Self {
            clients,
            confirmations: 1,
        })
    }

    pub fn with_confirmations(mut self, confirmations: usize) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }
}

impl EthersVaultGateway {
    fn client(&self, chain: ChainId) -> Result<&(Arc<ChainClient>, Address)> {
        self.clients
            .get(&chain)
            .ok_or_else(|| anyhow!("No vault configured for {}", chain))
    }
}

#[async_trait]
impl VaultGateway for EthersVaultGateway {
    async fn send_claim(&self, chain: ChainId, claim: &SignedClaim) -> Result<H256> {
        let (client, vault) = self.client(chain)?;

        let tx = TransactionRequest::new()
            .to(*vault)
            .data(encode_claim_call(claim));

        let pending = client
            .send_transaction(tx, None)
            .await
            .with_context(|| format!("{} vault rejected the claim", chain))?;
        let tx_hash = pending.tx_hash();
        info!(%chain, tx = ?tx_hash, "Claim broadcast");
        Ok(tx_hash)
    }

    async fn await_confirmation(&self, chain: ChainId, tx_hash: H256) -> Result<Confirmation> {
        let (client, _) = self.client(chain)?;

        let receipt = PendingTransaction::new(tx_hash, client.inner())
            .confirmations(self.confirmations)
            .await
            .with_context(|| format!("Lost track of {} claim {:?}", chain, tx_hash))?;

        let Some(receipt) = receipt else {
            warn!(%chain, tx = ?tx_hash, "Claim dropped");
            return Ok(Confirmation::Failed(format!(
                "{} claim {:?} was dropped",
                chain, tx_hash
            )));
        };
        if receipt.status != Some(U64::from(1)) {
            warn!(%chain, tx = ?tx_hash, "Claim reverted");
            return Ok(Confirmation::Failed(format!(
                "{} claim {:?} reverted",
                chain, tx_hash
            )));
        }

        Ok(Confirmation::Confirmed(ClaimReceipt {
            chain,
            tx_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()),
        }))
    }
}
