//! Basic reconciliation example

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use reconciliation_core::{
    verify_matching, BankEntry, LedgerEntry, MemorySink, MemorySource, NodeSelection,
    ReconciliationEngine, SolverConfig, Threads,
};
use std::str::FromStr;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

fn amount(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    println!("🏦 Reconciliation Core - Basic Reconciliation Example\n");

    // 1. Internal ledger entries and the bank statement
    let ledger = vec![
        LedgerEntry::new("INV-1001".to_string(), amount("1200.00"), date(1)),
        LedgerEntry::new("INV-1002".to_string(), amount("349.99"), date(2)),
        LedgerEntry::new("INV-1003".to_string(), amount("850.01"), date(4)),
        LedgerEntry::new("INV-1004".to_string(), amount("75.50"), date(6)),
        LedgerEntry::new("INV-1005".to_string(), amount("410.00"), date(9)),
        LedgerEntry::new("INV-1006".to_string(), amount("99.00"), date(12)),
    ];
    let bank = vec![
        BankEntry::new("DEP-01".to_string(), amount("1549.99"), date(3)),
        BankEntry::new("DEP-02".to_string(), amount("925.51"), date(7)),
        BankEntry::new("DEP-03".to_string(), amount("400.00"), date(10)),
    ];

    println!("📒 Ledger entries:");
    for entry in &ledger {
        println!("  {} | {} | ₹{}", entry.key, entry.date, entry.amount);
    }
    println!("\n🧾 Bank entries:");
    for entry in &bank {
        println!("  {} | {} | ₹{}", entry.key, entry.date, entry.amount);
    }

    // 2. Reconcile with a short time limit and two workers
    let config = SolverConfig::default()
        .with_time_limit(10.0)
        .with_threads(Threads::Multi(2))
        .with_node_selection(NodeSelection::BestBound);
    let engine = ReconciliationEngine::with_config(config)?;

    let source = MemorySource::new(ledger.clone(), bank.clone());
    let mut sink = MemorySink::new();
    let matching = engine.reconcile_into(&source, &mut sink).await?;

    println!("\n✅ Matched pairs ({}):", matching.status);
    for pair in &matching.pairs {
        println!("  {} -> {}", pair.ledger_key, pair.bank_key);
    }

    println!("\n📊 Matched totals per deposit:");
    for entry in &bank {
        let total = matching
            .matched_totals(&ledger)
            .remove(&entry.key)
            .unwrap_or_else(|| BigDecimal::from(0));
        println!("  {}: ₹{} of ₹{}", entry.key, total, entry.amount);
    }

    let unmatched = matching.unmatched_ledger(&ledger);
    if !unmatched.is_empty() {
        println!("\n⚠️  Unmatched ledger entries:");
        for entry in unmatched {
            println!("  {} (₹{})", entry.key, entry.amount);
        }
    }

    // 3. Independent check and search summary
    verify_matching(&ledger, &bank, &matching)?;
    println!("\n🔍 Matching verified against the input entries");

    let stats = &matching.statistics;
    println!(
        "  Nodes: {}, incumbent updates: {}, simplex pivots: {}, elapsed: {:?}",
        stats.nodes_explored, stats.incumbent_updates, stats.simplex_iterations, stats.elapsed
    );

    println!("\n💾 Results written to sink: {}", sink.len());
    println!("\n{}", serde_json::to_string_pretty(&matching)?);

    Ok(())
}
