use crate::domain::money::Currency;
use crate::domain::ports::FlowObserver;
use crate::domain::receipt::Receipt;
use crate::error::JournalError;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
struct JournalRow<'a> {
    reference_id: &'a str,
    timestamp: String,
    amount: Decimal,
    currency: Currency,
    recipient: &'a str,
}

impl<'a> From<&'a Receipt> for JournalRow<'a> {
    fn from(receipt: &'a Receipt) -> Self {
        Self {
            reference_id: &receipt.reference_id,
            timestamp: receipt.timestamp.to_rfc3339(),
            amount: receipt.amount.value(),
            currency: receipt.currency,
            recipient: &receipt.recipient_display,
        }
    }
}

/// Writes receipts as CSV rows to any `Write` sink.
pub struct ReceiptWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReceiptWriter<W> {
    /// Creates a writer; the header row is emitted only if `with_header`.
    pub fn new(sink: W, with_header: bool) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(with_header)
            .from_writer(sink);
        Self { writer }
    }

    pub fn write_receipt(&mut self, receipt: &Receipt) -> Result<(), JournalError> {
        self.writer.serialize(JournalRow::from(receipt))?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Append-only CSV log of completed payments.
///
/// The header is written once, when the file is created or found empty.
pub struct ReceiptJournal {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ReceiptJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, receipt: &Receipt) -> Result<(), JournalError> {
        let _guard = self
            .lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let is_empty = file.metadata()?.len() == 0;
        ReceiptWriter::new(file, is_empty).write_receipt(receipt)
    }
}

impl FlowObserver for ReceiptJournal {
    fn on_completed(&self, receipt: &Receipt) {
        match self.append(receipt) {
            Ok(()) => info!(path = %self.path.display(), "receipt journaled"),
            Err(err) => warn!(error = %err, path = %self.path.display(), "could not journal receipt"),
        }
    }

    fn on_cancelled(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn receipt(reference_id: &str) -> Receipt {
        Receipt {
            amount: Amount::new(dec!(100.5)).unwrap(),
            currency: Currency::Brl,
            recipient_display: "test@example.com".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap(),
            reference_id: reference_id.to_string(),
        }
    }

    #[test]
    fn test_writer_output() {
        let mut buf = Vec::new();
        ReceiptWriter::new(&mut buf, true)
            .write_receipt(&receipt("tx-1"))
            .unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert_eq!(
            output,
            "reference_id,timestamp,amount,currency,recipient\n\
             tx-1,2025-03-01T12:30:00+00:00,100.5,BRL,test@example.com\n"
        );
    }

    #[test]
    fn test_journal_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let journal = ReceiptJournal::new(dir.path().join("receipts.csv"));
        journal.on_completed(&receipt("tx-1"));
        journal.on_completed(&receipt("tx-2"));

        let contents = std::fs::read_to_string(journal.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "reference_id,timestamp,amount,currency,recipient");
        assert!(lines[1].starts_with("tx-1,"));
        assert!(lines[2].starts_with("tx-2,"));
    }
}
