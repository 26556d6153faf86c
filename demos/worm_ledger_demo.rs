//! Minimal example: a WORM ledger entry handed from a writer to a reader.
//!
//! Run with: `cargo run --example worm_ledger_demo`
//!
//! - The writer commits one entry to a WORM facade and keeps the capability
//! - A second write is refused
//! - A spent voucher is voided in place: still counted, never readable
//! - The journal is persisted to a file for inspection

use spdg::{Facade, FacadeConfig, Policy};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 1. Setup
    let audit_path = std::env::temp_dir().join("spdg_audit.jsonl");
    let config = FacadeConfig {
        policy: Policy::Worm,
        label: "ledger".into(),
        audit_path: Some(audit_path.clone()),
    };
    let ledger = Facade::from_config(&config)?;

    // 2. The one permitted write
    let sealed = ledger.poke(b"invoice #42: paid");
    println!("first write: {}", sealed.outcome);
    let capability = sealed
        .capability
        .ok_or("ledger refused the first write")?;

    // 3. WORM refuses a rewrite
    println!("second write: {}", ledger.poke(b"invoice #42: unpaid").outcome);

    // 4. Reader peels with the capability
    let peeled = ledger.peek(&capability);
    println!(
        "read back: {} {:?}",
        peeled.outcome,
        String::from_utf8_lossy(&peeled.plaintext)
    );

    // 5. A voucher spent in place
    let vouchers = Facade::with_label(Policy::Open, "vouchers");
    println!("voided: {}", vouchers.poke_destructive(b"voucher 7f3a"));
    println!("voucher layers still present: {}", vouchers.len());

    // 6. Journal
    let (records, _) = ledger.audit_records();
    println!("ledger journal: {} record(s)", records.len());
    for record in &records {
        println!("  {:?} -> {} @ {}", record.operation, record.outcome, record.timestamp);
    }
    println!("Full journal also written to: {}", audit_path.display());

    Ok(())
}
