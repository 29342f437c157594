use quill_db::repositories::{SqlStaffRepository, StaffRepository};

use crate::commands::{self, CommandResult, Failure};

/// Startup preflight: config, connectivity, schema, and a read of the
/// rotation pool so operators see the eligible headcount before traffic.
pub fn run() -> CommandResult {
    match execute() {
        Ok(eligible) => CommandResult::success(
            "start",
            format!("preflight complete; {eligible} rotation-eligible staff on file"),
        ),
        Err(failure) => failure.into_result("start"),
    }
}

fn execute() -> Result<usize, Failure> {
    let config = commands::load_validated_config()?;
    let runtime = commands::current_thread_runtime()?;

    runtime.block_on(async {
        let pool = commands::open_migrated_pool(&config).await?;

        let eligible = SqlStaffRepository::new(pool.clone())
            .rotation_pool()
            .await
            .map_err(|error| Failure::new("rotation_pool", error.to_string(), 5))?
            .len();

        pool.close().await;
        Ok(eligible)
    })
}
