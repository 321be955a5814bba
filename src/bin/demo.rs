use agrichain::ledger::synthetic::{sample_batch, sample_history};
use agrichain::ledger::{BatchLedger, SyntheticLedger};
use agrichain::store::MemoryStore;
use agrichain::BatchEngine;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let ledger = Arc::new(SyntheticLedger::new());
    ledger.insert(sample_batch("batch-001"), sample_history()).await;
    let ledger: Arc<dyn BatchLedger> = ledger;

    let engine = BatchEngine::new(Arc::new(MemoryStore::new()), Some(ledger));
    engine
        .register_metadata(
            "batch-001",
            serde_json::json!({
                "productType": "maize",
                "origin": {"county": "Nakuru", "country": "KE"},
                "weightKg": 1200,
                "certifications": ["organic"]
            }),
        )
        .await?;

    let verification = engine.lookup("batch-001").await?;
    println!("{}", serde_json::to_string_pretty(&verification)?);
    Ok(())
}
