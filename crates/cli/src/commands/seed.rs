use quill_db::{SeedDataset, SeedResult};

use crate::commands::{self, CommandResult, Failure};

pub fn run() -> CommandResult {
    match execute() {
        Ok(seeded) => CommandResult::success(
            "seed",
            format!(
                "seeded {} staff members and {} demo leads (verified)",
                seeded.staff_seeded, seeded.leads_seeded
            ),
        ),
        Err(failure) => failure.into_result("seed"),
    }
}

fn execute() -> Result<SeedResult, Failure> {
    let config = commands::load_validated_config()?;
    let runtime = commands::current_thread_runtime()?;

    runtime.block_on(async {
        let pool = commands::open_migrated_pool(&config).await?;
        let outcome = load_and_verify(&pool).await;
        pool.close().await;
        outcome
    })
}

async fn load_and_verify(pool: &quill_db::DbPool) -> Result<SeedResult, Failure> {
    let seeded = SeedDataset::load(pool)
        .await
        .map_err(|error| Failure::new("seed_execution", error.to_string(), 5))?;

    let verification = SeedDataset::verify(pool)
        .await
        .map_err(|error| Failure::new("seed_verification", error.to_string(), 6))?;

    if verification.all_present {
        return Ok(seeded);
    }

    let failed: Vec<&str> = verification
        .checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect();
    Err(Failure::new(
        "seed_verification",
        format!("seed verification failed for checks: {}", failed.join(", ")),
        6,
    ))
}
