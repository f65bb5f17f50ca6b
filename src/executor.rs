use std::io::{BufRead, Write};

use chrono::Local;
use num_bigint::BigInt;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::amount::{self, AmountError};
use crate::config::SenderConfig;
use crate::input::{LineReader, LineRecord};
use crate::journal::Journal;
use crate::rpc::{Account, NodeRpc, RpcError};

/// Fatal run failure. Anything recovered per record (bad format,
/// invalid account, account not open) never surfaces here; it is
/// journaled and counted instead.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Aggregated counters for a send run.
/// `total_lines == skipped_lines + invalid_lines + payments`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SendSummary {
    pub total_lines: u64,
    pub skipped_lines: u64,
    pub invalid_lines: u64,
    pub payments: u64,
}

/// Aggregated counters for a balance run.
/// `total_lines == skipped_lines + invalid_lines + open + not_open`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BalanceSummary {
    pub total_lines: u64,
    pub skipped_lines: u64,
    pub invalid_lines: u64,
    pub open: u64,
    pub not_open: u64,
}

#[derive(Debug, Error)]
enum RecordError {
    #[error("wrong parts count ({0})")]
    WrongPartsCount(usize),
    #[error("bad amount `{0}`")]
    BadAmount(String),
    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// One fully parsed send instruction. Built only after the field count
/// and amount checks pass.
#[derive(Debug)]
struct PaymentInstruction {
    destination: Account,
    amount: Decimal,
    raw_amount: BigInt,
    id: String,
}

impl PaymentInstruction {
    fn from_record(record: &LineRecord, multiplier: &BigInt) -> Result<Self, RecordError> {
        let [destination, amount, id] = record.fields.as_slice() else {
            return Err(RecordError::WrongPartsCount(record.fields.len()));
        };
        let amount: Decimal = amount
            .parse()
            .map_err(|_| RecordError::BadAmount(amount.clone()))?;
        let raw_amount = amount::to_raw(amount, multiplier)?;
        Ok(Self {
            destination: Account::new(destination.clone()),
            amount,
            raw_amount,
            // node-side idempotency key, case-insensitive on the node
            id: id.to_uppercase(),
        })
    }
}

/// Drives one batch over an input file: one record at a time, strictly
/// in input order, no retries, no rollback. A fatal node failure aborts
/// the run; whatever was journaled before it stays valid.
pub struct BatchExecutor<C> {
    client: C,
    config: SenderConfig,
}

impl<C: NodeRpc> BatchExecutor<C> {
    pub fn new(client: C, config: SenderConfig) -> Self {
        Self { client, config }
    }

    /// Node version query plus the vendor-specific unit conversion.
    /// Fetched once, constant for the rest of the run.
    fn fetch_multiplier(&self) -> Result<BigInt, RpcError> {
        let version = self.client.version()?;
        info!("node vendor: {}", version.node_vendor);
        let multiplier = self.client.base_units_per_coin(&version.node_vendor)?;
        info!("1 coin == {multiplier} raw");
        Ok(multiplier)
    }

    pub fn run_send<R, W>(
        &self,
        input: R,
        journal: &mut Journal<W>,
    ) -> Result<SendSummary, BatchError>
    where
        R: BufRead,
        W: Write,
    {
        info!(
            "preparing to send: wallet {} from {} via {}",
            self.config.wallet, self.config.source, self.config.node_endpoint
        );
        let multiplier = self.fetch_multiplier()?;

        let mut reader = LineReader::new(input);
        let mut invalid_lines = 0;
        let mut payments = 0;

        journal.write_header("Payments")?;

        while let Some(record) = reader.next_record()? {
            let payment = match PaymentInstruction::from_record(&record, &multiplier) {
                Ok(payment) => payment,
                Err(err) => {
                    journal.write_warning(&format!(
                        "Invalid line {}: {err}, skipped",
                        record.line_no
                    ))?;
                    invalid_lines += 1;
                    continue;
                }
            };

            if !self.client.validate_account(&payment.destination)? {
                journal
                    .write_warning(&format!("Invalid account: {}, skipped", payment.destination))?;
                invalid_lines += 1;
                continue;
            }

            let block = self.client.send(
                &self.config.wallet,
                &self.config.source,
                &payment.destination,
                &payment.raw_amount,
                &payment.id,
            )?;
            journal.write_line(&format!(
                "{} {block} {} {}",
                Local::now().format("%H:%M:%S"),
                payment.destination,
                payment.amount
            ))?;
            payments += 1;
        }

        let summary = SendSummary {
            total_lines: reader.total_lines(),
            skipped_lines: reader.skipped_lines(),
            invalid_lines,
            payments,
        };
        journal.blank()?;
        journal.write_line(&format!(
            "Total: {} lines = {} skipped + {} invalid + {} payments",
            summary.total_lines, summary.skipped_lines, summary.invalid_lines, summary.payments
        ))?;
        journal.write_footer()?;
        Ok(summary)
    }

    /// Raw balance of an open account, `None` when it has no ledger
    /// entry. The block count query exists to provoke the not-found
    /// condition before asking for a balance, but either call may
    /// report it.
    fn open_balance(&self, account: &Account) -> Result<Option<BigInt>, RpcError> {
        match self
            .client
            .block_count(account)
            .and_then(|_| self.client.balance(account))
        {
            Ok(raw) => Ok(Some(raw)),
            Err(RpcError::AccountNotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn run_balance<R, W>(
        &self,
        input: R,
        journal: &mut Journal<W>,
    ) -> Result<BalanceSummary, BatchError>
    where
        R: BufRead,
        W: Write,
    {
        info!("preparing to check balances via {}", self.config.node_endpoint);
        let multiplier = self.fetch_multiplier()?;

        let mut reader = LineReader::new(input);
        let mut invalid_lines = 0;
        let mut open = 0;
        let mut not_open = 0;

        journal.write_header("Accounts balance check")?;
        journal.blank()?;

        while let Some(record) = reader.next_record()? {
            // first field is the account, anything after it is ignored
            let Some(address) = record.fields.first() else {
                journal.write_warning(&format!(
                    "Invalid line {}: wrong parts count (0), skipped",
                    record.line_no
                ))?;
                invalid_lines += 1;
                continue;
            };
            let account = Account::new(address.clone());

            if !self.client.validate_account(&account)? {
                journal.write_warning(&format!("{account} Invalid account (skipped)"))?;
                invalid_lines += 1;
                continue;
            }

            match self.open_balance(&account) {
                Ok(Some(raw)) => {
                    let balance = amount::to_human(&raw, &multiplier)?;
                    journal.write_line(&format!("{account} {balance}"))?;
                    open += 1;
                }
                Ok(None) => {
                    journal.write_warning(&format!("{account} Not found (not open)"))?;
                    not_open += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }

        let summary = BalanceSummary {
            total_lines: reader.total_lines(),
            skipped_lines: reader.skipped_lines(),
            invalid_lines,
            open,
            not_open,
        };
        journal.blank()?;
        journal.write_line(&format!(
            "Total: {} lines = {} skipped + {} invalid + {} open + {} not open",
            summary.total_lines,
            summary.skipped_lines,
            summary.invalid_lines,
            summary.open,
            summary.not_open
        ))?;
        journal.write_footer()?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use std::str::FromStr;

    use crate::rpc::NodeVersion;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct SentPayment {
        wallet: String,
        source: String,
        destination: String,
        raw_amount: BigInt,
        id: String,
    }

    /// Scripted node. Accounts listed in `invalid_accounts` fail format
    /// validation; accounts in `not_open` have no ledger entry;
    /// `fail_send_to` makes the send call fail hard.
    struct MockNode {
        vendor: &'static str,
        multiplier: BigInt,
        invalid_accounts: HashSet<&'static str>,
        not_open: HashSet<&'static str>,
        /// passes the block count query but is gone by the balance one
        gone_at_balance: HashSet<&'static str>,
        balances: HashMap<&'static str, BigInt>,
        fail_send_to: Option<&'static str>,
        sent: RefCell<Vec<SentPayment>>,
    }

    impl MockNode {
        fn new(multiplier: u64) -> Self {
            Self {
                vendor: "Nano V23.3",
                multiplier: BigInt::from(multiplier),
                invalid_accounts: HashSet::new(),
                not_open: HashSet::new(),
                gone_at_balance: HashSet::new(),
                balances: HashMap::new(),
                fail_send_to: None,
                sent: RefCell::new(Vec::new()),
            }
        }
    }

    impl NodeRpc for MockNode {
        fn version(&self) -> Result<NodeVersion, RpcError> {
            Ok(NodeVersion {
                node_vendor: self.vendor.to_owned(),
            })
        }

        fn base_units_per_coin(&self, _vendor: &str) -> Result<BigInt, RpcError> {
            Ok(self.multiplier.clone())
        }

        fn validate_account(&self, account: &Account) -> Result<bool, RpcError> {
            Ok(!self.invalid_accounts.contains(account.as_str()))
        }

        fn send(
            &self,
            wallet: &str,
            source: &Account,
            destination: &Account,
            raw_amount: &BigInt,
            id: &str,
        ) -> Result<String, RpcError> {
            if self.fail_send_to == Some(destination.as_str()) {
                return Err(RpcError::Node("insufficient balance".into()));
            }
            self.sent.borrow_mut().push(SentPayment {
                wallet: wallet.to_owned(),
                source: source.to_string(),
                destination: destination.to_string(),
                raw_amount: raw_amount.clone(),
                id: id.to_owned(),
            });
            Ok(format!("BLOCK{}", self.sent.borrow().len()))
        }

        fn block_count(&self, account: &Account) -> Result<u64, RpcError> {
            if self.not_open.contains(account.as_str()) {
                return Err(RpcError::AccountNotFound);
            }
            Ok(1)
        }

        fn balance(&self, account: &Account) -> Result<BigInt, RpcError> {
            if self.gone_at_balance.contains(account.as_str()) {
                return Err(RpcError::AccountNotFound);
            }
            self.balances
                .get(account.as_str())
                .cloned()
                .ok_or_else(|| RpcError::Node("no scripted balance".into()))
        }
    }

    fn config() -> SenderConfig {
        SenderConfig {
            wallet: "W1".into(),
            source: Account::new("addr_source"),
            node_endpoint: "localhost:7076".into(),
        }
    }

    fn journal() -> Journal<Vec<u8>> {
        Journal::new(Vec::new())
    }

    fn journal_text(journal: Journal<Vec<u8>>) -> String {
        String::from_utf8(journal.into_inner()).unwrap()
    }

    #[test]
    fn send_happy_path() {
        let node = MockNode::new(1_000_000);
        let executor = BatchExecutor::new(&node, config());
        let mut journal = journal();

        let summary = executor
            .run_send("addrA 1.5 id1\n".as_bytes(), &mut journal)
            .unwrap();

        assert_eq!(
            summary,
            SendSummary {
                total_lines: 1,
                skipped_lines: 0,
                invalid_lines: 0,
                payments: 1,
            }
        );
        let sent = node.sent.borrow();
        assert_eq!(
            *sent,
            vec![SentPayment {
                wallet: "W1".into(),
                source: "addr_source".into(),
                destination: "addrA".into(),
                raw_amount: BigInt::from(1_500_000),
                id: "ID1".into(),
            }]
        );
        drop(sent);

        let out = journal_text(journal);
        assert!(out.contains("Payments, started at "));
        assert!(out.contains("BLOCK1 addrA 1.5"));
        assert!(out.contains("Total: 1 lines = 0 skipped + 0 invalid + 1 payments"));
        assert!(out.contains("Elapsed: "));
    }

    #[test]
    fn wrong_field_count_is_invalid_and_sends_nothing() {
        let node = MockNode::new(1_000_000);
        let executor = BatchExecutor::new(&node, config());
        let mut journal = journal();

        let summary = executor
            .run_send("addrA 1.5\n".as_bytes(), &mut journal)
            .unwrap();

        assert_eq!(summary.invalid_lines, 1);
        assert_eq!(summary.payments, 0);
        assert!(node.sent.borrow().is_empty());
        assert!(journal_text(journal).contains("Invalid line 1: wrong parts count (2), skipped"));
    }

    #[test]
    fn unparseable_amount_is_invalid() {
        let node = MockNode::new(1_000_000);
        let executor = BatchExecutor::new(&node, config());
        let mut journal = journal();

        let summary = executor
            .run_send("addrA one id1\n".as_bytes(), &mut journal)
            .unwrap();

        assert_eq!(summary.invalid_lines, 1);
        assert!(node.sent.borrow().is_empty());
        assert!(journal_text(journal).contains("Invalid line 1: bad amount `one`, skipped"));
    }

    #[test]
    fn invalid_account_is_counted_without_sending() {
        let mut node = MockNode::new(1_000_000);
        node.invalid_accounts.insert("addrBad");
        let executor = BatchExecutor::new(&node, config());
        let mut journal = journal();

        let summary = executor
            .run_send("addrBad 1.5 id1\naddrA 2 id2\n".as_bytes(), &mut journal)
            .unwrap();

        assert_eq!(summary.invalid_lines, 1);
        assert_eq!(summary.payments, 1);
        assert_eq!(node.sent.borrow().len(), 1);
        assert!(journal_text(journal).contains("Invalid account: addrBad, skipped"));
    }

    #[test]
    fn comments_and_blanks_only_increment_skipped() {
        let node = MockNode::new(1_000_000);
        let executor = BatchExecutor::new(&node, config());
        let mut journal = journal();

        let summary = executor
            .run_send("# note\n\naddrA 1 id1\n".as_bytes(), &mut journal)
            .unwrap();

        assert_eq!(summary.total_lines, 3);
        assert_eq!(summary.skipped_lines, 2);
        assert_eq!(summary.invalid_lines, 0);
        assert_eq!(summary.payments, 1);
    }

    #[test]
    fn send_counters_always_add_up() {
        let mut node = MockNode::new(1_000_000);
        node.invalid_accounts.insert("addrBad");
        let executor = BatchExecutor::new(&node, config());
        let mut journal = journal();

        let input = "# batch\naddrA 1.5 id1\nbroken line\n\naddrBad 2 id2\naddrB 3 id3\n";
        let summary = executor.run_send(input.as_bytes(), &mut journal).unwrap();

        assert_eq!(
            summary.total_lines,
            summary.skipped_lines + summary.invalid_lines + summary.payments
        );
        assert_eq!(summary.total_lines, 6);
        assert_eq!(summary.skipped_lines, 2);
        assert_eq!(summary.invalid_lines, 2);
        assert_eq!(summary.payments, 2);
    }

    #[test]
    fn fatal_send_failure_aborts_without_footer() {
        let mut node = MockNode::new(1_000_000);
        node.fail_send_to = Some("addrBoom");
        let executor = BatchExecutor::new(&node, config());
        let mut journal = journal();

        let input = "addrA 1 id1\naddrBoom 2 id2\naddrB 3 id3\n";
        let err = executor.run_send(input.as_bytes(), &mut journal).unwrap_err();

        assert!(matches!(err, BatchError::Rpc(RpcError::Node(_))));
        // first success stays journaled, third record never runs
        assert_eq!(node.sent.borrow().len(), 1);
        let out = journal_text(journal);
        assert!(out.contains("addrA 1"));
        assert!(!out.contains("addrB 3"));
        assert!(!out.contains("Total:"));
        assert!(!out.contains("Elapsed:"));
    }

    #[test]
    fn balance_reports_open_and_not_open() {
        let mut node = MockNode::new(1_000_000);
        node.not_open.insert("addrB");
        node.balances
            .insert("addrA", BigInt::from_str("2500400").unwrap());
        let executor = BatchExecutor::new(&node, config());
        let mut journal = journal();

        let summary = executor
            .run_balance("addrA whatever\naddrB\n".as_bytes(), &mut journal)
            .unwrap();

        assert_eq!(
            summary,
            BalanceSummary {
                total_lines: 2,
                skipped_lines: 0,
                invalid_lines: 0,
                open: 1,
                not_open: 1,
            }
        );
        let out = journal_text(journal);
        assert!(out.contains("addrA 2.5"));
        assert!(out.contains("addrB Not found (not open)"));
        assert!(out.contains("Total: 2 lines = 0 skipped + 0 invalid + 1 open + 1 not open"));
    }

    #[test]
    fn not_found_from_balance_call_also_counts_as_not_open() {
        let mut node = MockNode::new(1_000_000);
        node.gone_at_balance.insert("addrC");
        let executor = BatchExecutor::new(&node, config());
        let mut journal = journal();

        let summary = executor
            .run_balance("addrC\n".as_bytes(), &mut journal)
            .unwrap();

        assert_eq!(summary.not_open, 1);
        assert_eq!(summary.open, 0);
        assert!(journal_text(journal).contains("addrC Not found (not open)"));
    }

    #[test]
    fn balance_invalid_account_is_counted() {
        let mut node = MockNode::new(1_000_000);
        node.invalid_accounts.insert("addrBad");
        let executor = BatchExecutor::new(&node, config());
        let mut journal = journal();

        let summary = executor
            .run_balance("addrBad\n".as_bytes(), &mut journal)
            .unwrap();

        assert_eq!(summary.invalid_lines, 1);
        assert_eq!(summary.open + summary.not_open, 0);
        assert!(journal_text(journal).contains("addrBad Invalid account (skipped)"));
    }

    #[test]
    fn separator_only_line_is_invalid_in_balance_mode() {
        let node = MockNode::new(1_000_000);
        let executor = BatchExecutor::new(&node, config());
        let mut journal = journal();

        let summary = executor
            .run_balance(",,;\n".as_bytes(), &mut journal)
            .unwrap();

        assert_eq!(summary.invalid_lines, 1);
        assert!(journal_text(journal).contains("wrong parts count (0)"));
    }
}
