use num_bigint::BigInt;
use serde_json::{Value, json};

use super::{Account, NodeRpc, NodeVersion, RpcError};

const NOT_FOUND_ERROR: &str = "Account not found";

/// [`NodeRpc`] over the node's HTTP interface: every call is a JSON
/// POST with an `action` field, every numeric value travels as a
/// decimal string.
pub struct HttpNodeClient {
    url: String,
    http: reqwest::blocking::Client,
}

impl HttpNodeClient {
    /// `endpoint` is `host:port`, as found in the run configuration.
    pub fn new(endpoint: &str) -> Self {
        Self {
            url: format!("http://{endpoint}"),
            http: reqwest::blocking::Client::new(),
        }
    }

    fn call(&self, body: Value) -> Result<Value, RpcError> {
        let response: Value = self
            .http
            .post(&self.url)
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;

        // Node-level failures come back as 200 with an `error` field.
        if let Some(message) = response.get("error").and_then(Value::as_str) {
            if message == NOT_FOUND_ERROR {
                return Err(RpcError::AccountNotFound);
            }
            return Err(RpcError::Node(message.to_owned()));
        }
        Ok(response)
    }

    fn str_field<'v>(response: &'v Value, name: &str) -> Result<&'v str, RpcError> {
        response
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::BadResponse(format!("missing `{name}` field")))
    }

    fn bigint_field(response: &Value, name: &str) -> Result<BigInt, RpcError> {
        Self::str_field(response, name)?
            .parse()
            .map_err(|_| RpcError::BadResponse(format!("`{name}` is not an integer")))
    }
}

impl NodeRpc for HttpNodeClient {
    fn version(&self) -> Result<NodeVersion, RpcError> {
        let response = self.call(json!({ "action": "version" }))?;
        Ok(NodeVersion {
            node_vendor: Self::str_field(&response, "node_vendor")?.to_owned(),
        })
    }

    fn base_units_per_coin(&self, vendor: &str) -> Result<BigInt, RpcError> {
        let action = if vendor.starts_with("Banano") {
            "ban_to_raw"
        } else {
            "mrai_to_raw"
        };
        let response = self.call(json!({ "action": action, "amount": "1" }))?;
        Self::bigint_field(&response, "amount")
    }

    fn validate_account(&self, account: &Account) -> Result<bool, RpcError> {
        let response = self.call(json!({
            "action": "validate_account_number",
            "account": account.as_str(),
        }))?;
        Ok(Self::str_field(&response, "valid")? == "1")
    }

    fn send(
        &self,
        wallet: &str,
        source: &Account,
        destination: &Account,
        raw_amount: &BigInt,
        id: &str,
    ) -> Result<String, RpcError> {
        let response = self.call(json!({
            "action": "send",
            "wallet": wallet,
            "source": source.as_str(),
            "destination": destination.as_str(),
            "amount": raw_amount.to_string(),
            "id": id,
        }))?;
        Ok(Self::str_field(&response, "block")?.to_owned())
    }

    fn block_count(&self, account: &Account) -> Result<u64, RpcError> {
        let response = self.call(json!({
            "action": "account_block_count",
            "account": account.as_str(),
        }))?;
        Self::str_field(&response, "block_count")?
            .parse()
            .map_err(|_| RpcError::BadResponse("`block_count` is not an integer".into()))
    }

    fn balance(&self, account: &Account) -> Result<BigInt, RpcError> {
        let response = self.call(json!({
            "action": "account_balance",
            "account": account.as_str(),
        }))?;
        Self::bigint_field(&response, "balance")
    }
}
