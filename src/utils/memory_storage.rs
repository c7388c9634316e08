//! In-memory collaborators for testing

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::solution::Matching;
use crate::traits::*;
use crate::types::*;

/// In-memory entry source for testing and development
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    ledger: Arc<RwLock<Vec<LedgerEntry>>>,
    bank: Arc<RwLock<Vec<BankEntry>>>,
}

impl MemorySource {
    /// Create a new memory source instance
    pub fn new(ledger: Vec<LedgerEntry>, bank: Vec<BankEntry>) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            bank: Arc::new(RwLock::new(bank)),
        }
    }

    pub fn push_ledger(&self, entry: LedgerEntry) {
        self.ledger.write().push(entry);
    }

    pub fn push_bank(&self, entry: BankEntry) {
        self.bank.write().push(entry);
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.ledger.write().clear();
        self.bank.write().clear();
    }
}

#[async_trait]
impl EntrySource for MemorySource {
    async fn ledger_entries(&self) -> ReconcileResult<Vec<LedgerEntry>> {
        Ok(self.ledger.read().clone())
    }

    async fn bank_entries(&self) -> ReconcileResult<Vec<BankEntry>> {
        Ok(self.bank.read().clone())
    }
}

/// In-memory sink keeping every matching written to it
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    written: Arc<RwLock<Vec<Matching>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<Matching> {
        self.written.read().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.written.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.written.read().is_empty()
    }
}

#[async_trait]
impl MatchingSink for MemorySink {
    async fn write_matching(&mut self, matching: &Matching) -> ReconcileResult<()> {
        self.written.write().push(matching.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_memory_source_returns_what_was_pushed() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let source = MemorySource::default();
        source.push_ledger(LedgerEntry::new("L1".to_string(), BigDecimal::from(5), date));
        source.push_bank(BankEntry::new("B1".to_string(), BigDecimal::from(5), date));

        assert_eq!(source.ledger_entries().await.unwrap().len(), 1);
        assert_eq!(source.bank_entries().await.unwrap()[0].key, "B1");

        source.clear();
        assert!(source.ledger_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_sink_clones_share_storage() {
        let mut sink = MemorySink::new();
        let observer = sink.clone();

        sink.write_matching(&Matching::empty()).await.unwrap();
        assert_eq!(observer.len(), 1);
        assert_eq!(observer.last().unwrap().objective, 0);
    }
}
