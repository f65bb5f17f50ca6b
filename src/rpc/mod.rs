use std::fmt;

use num_bigint::BigInt;
use serde::Deserialize;
use thiserror::Error;

pub mod http;

/// Account address as understood by the node. Format validation is the
/// node's job; this type only carries the string around. Compared by
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Account(String);

impl Account {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct NodeVersion {
    pub node_vendor: String,
}

#[derive(Debug, Error)]
pub enum RpcError {
    /// The account has no ledger entry yet. An expected outcome during
    /// balance checks; every other variant is fatal for the run.
    #[error("account not found (not open)")]
    AccountNotFound,
    #[error("node returned error: {0}")]
    Node(String),
    #[error("malformed node response: {0}")]
    BadResponse(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Operations the batch executor needs from the ledger node.
pub trait NodeRpc {
    fn version(&self) -> Result<NodeVersion, RpcError>;

    /// Raw base units equivalent to exactly 1 coin. The vendor string
    /// selects the conversion method; Banano nodes expose it under a
    /// different action name than Nano nodes.
    fn base_units_per_coin(&self, vendor: &str) -> Result<BigInt, RpcError>;

    fn validate_account(&self, account: &Account) -> Result<bool, RpcError>;

    /// Submits a payment and returns the committed block identifier.
    fn send(
        &self,
        wallet: &str,
        source: &Account,
        destination: &Account,
        raw_amount: &BigInt,
        id: &str,
    ) -> Result<String, RpcError>;

    /// Number of blocks in the account's chain. Fails with
    /// [`RpcError::AccountNotFound`] when the account is not open.
    fn block_count(&self, account: &Account) -> Result<u64, RpcError>;

    /// Confirmed balance in raw base units.
    fn balance(&self, account: &Account) -> Result<BigInt, RpcError>;
}

impl<T: NodeRpc> NodeRpc for &T {
    fn version(&self) -> Result<NodeVersion, RpcError> {
        (**self).version()
    }

    fn base_units_per_coin(&self, vendor: &str) -> Result<BigInt, RpcError> {
        (**self).base_units_per_coin(vendor)
    }

    fn validate_account(&self, account: &Account) -> Result<bool, RpcError> {
        (**self).validate_account(account)
    }

    fn send(
        &self,
        wallet: &str,
        source: &Account,
        destination: &Account,
        raw_amount: &BigInt,
        id: &str,
    ) -> Result<String, RpcError> {
        (**self).send(wallet, source, destination, raw_amount, id)
    }

    fn block_count(&self, account: &Account) -> Result<u64, RpcError> {
        (**self).block_count(account)
    }

    fn balance(&self, account: &Account) -> Result<BigInt, RpcError> {
        (**self).balance(account)
    }
}
