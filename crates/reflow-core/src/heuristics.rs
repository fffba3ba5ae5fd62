//! Header heuristics for coordinate-built sheets.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::grid::{CellAddress, CellRole, SheetModel};
use crate::models::config::HeaderHeuristicKind;

lazy_static! {
    static ref BANK_HEADER_TRIGGER: Regex = Regex::new(r"Transaction|Date").unwrap();
}

/// Column names of the synthetic bank-statement header.
pub const BANK_STATEMENT_COLUMNS: [&str; 7] = [
    "Transaction Date",
    "Value Date",
    "Reference",
    "Description",
    "Withdrawals",
    "Deposits",
    "Running Balance",
];

/// Decides which row of a sheet is its header, adding one if needed.
pub trait HeaderHeuristic: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, sheet: &mut SheetModel);
}

/// Styles the first data row as a header.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstRowHeader;

impl HeaderHeuristic for FirstRowHeader {
    fn name(&self) -> &'static str {
        "first_row"
    }

    fn apply(&self, sheet: &mut SheetModel) {
        let first = sheet
            .rows()
            .into_iter()
            .find(|row| sheet.row_role(*row) == Some(CellRole::Data));
        if let Some(row) = first {
            sheet.mark_row(row, CellRole::Header);
        }
    }
}

/// Inserts fixed bank-statement column names.
///
/// The header goes directly above the first row mentioning "Transaction" or
/// "Date"; without such a row it is forced in at row 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct BankStatementHeader;

impl HeaderHeuristic for BankStatementHeader {
    fn name(&self) -> &'static str {
        "bank_statement"
    }

    fn apply(&self, sheet: &mut SheetModel) {
        let trigger = sheet.rows().into_iter().find(|row| {
            sheet.row_role(*row) == Some(CellRole::Data) && BANK_HEADER_TRIGGER.is_match(&sheet.row_text(*row))
        });
        let at = trigger.unwrap_or(1);
        debug!("Inserting bank statement header at row {}", at);

        sheet.insert_row(at);
        for (i, name) in BANK_STATEMENT_COLUMNS.iter().enumerate() {
            sheet.set(CellAddress::new(at, i as u16 + 1), *name, CellRole::Header);
        }
    }
}

/// Leaves the sheet untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHeader;

impl HeaderHeuristic for NoHeader {
    fn name(&self) -> &'static str {
        "none"
    }

    fn apply(&self, _sheet: &mut SheetModel) {}
}

/// The heuristic selected in configuration.
pub fn header_heuristic(kind: HeaderHeuristicKind) -> Box<dyn HeaderHeuristic> {
    match kind {
        HeaderHeuristicKind::FirstRow => Box::new(FirstRowHeader),
        HeaderHeuristicKind::BankStatement => Box::new(BankStatementHeader),
        HeaderHeuristicKind::None => Box::new(NoHeader),
    }
}
