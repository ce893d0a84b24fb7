//! Sample governance routines for the demo host.

use async_trait::async_trait;
use mandate_core::domain::ExecutionError;
use mandate_core::ports::Bindings;
use mandate_core::typed::{Handler, Routine};
use serde::{Deserialize, Serialize};

/// Count votes and decide whether the proposal passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tally {
    pub proposal: String,
    pub yes: u64,
    pub no: u64,
    pub quorum: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyResult {
    pub proposal: String,
    pub approved: bool,
    pub turnout: u64,
}

impl Routine for Tally {
    const NAME: &'static str = "governance.tally.v1";
    type Output = TallyResult;
}

pub struct TallyHandler;

#[async_trait]
impl Handler<Tally> for TallyHandler {
    async fn handle(&self, args: Tally, _: &Bindings) -> Result<TallyResult, ExecutionError> {
        let turnout = args.yes + args.no;
        Ok(TallyResult {
            approved: turnout >= args.quorum && args.yes > args.no,
            proposal: args.proposal,
            turnout,
        })
    }
}

/// Pay out of the treasury. Issued as an async operation; the host resolves
/// it by running this handler against the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub to: String,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub to: String,
    pub amount: u64,
    pub reference: String,
}

impl Routine for Transfer {
    const NAME: &'static str = "treasury.transfer.v1";
    type Output = Receipt;
}

pub struct TransferHandler {
    pub balance: u64,
}

#[async_trait]
impl Handler<Transfer> for TransferHandler {
    async fn handle(&self, args: Transfer, bindings: &Bindings) -> Result<Receipt, ExecutionError> {
        let approved = bindings
            .previous
            .as_ref()
            .and_then(|v| v.get("approved"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !approved {
            return Err(ExecutionError::new("proposal was not approved"));
        }
        if args.amount > self.balance {
            return Err(ExecutionError::new(format!(
                "insufficient treasury balance: {} < {}",
                self.balance, args.amount
            )));
        }
        Ok(Receipt {
            reference: format!("{}-{}", bindings.task_id, bindings.ordinal),
            to: args.to,
            amount: args.amount,
        })
    }
}

/// Summarize the run for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announce;

impl Routine for Announce {
    const NAME: &'static str = "governance.announce.v1";
    type Output = String;
}

pub struct AnnounceHandler;

#[async_trait]
impl Handler<Announce> for AnnounceHandler {
    async fn handle(&self, _: Announce, bindings: &Bindings) -> Result<String, ExecutionError> {
        let receipt = bindings
            .previous
            .as_ref()
            .ok_or_else(|| ExecutionError::new("nothing to announce"))?;
        Ok(format!(
            "paid {} to {} (ref {})",
            receipt["amount"], receipt["to"], receipt["reference"]
        ))
    }
}
