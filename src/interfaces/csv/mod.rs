pub mod receipt_journal;
