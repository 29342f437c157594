use crate::commands::{self, CommandResult, Failure};

pub fn run() -> CommandResult {
    match execute() {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => failure.into_result("migrate"),
    }
}

fn execute() -> Result<(), Failure> {
    let config = commands::load_validated_config()?;
    let runtime = commands::current_thread_runtime()?;

    runtime.block_on(async {
        let pool = commands::open_migrated_pool(&config).await?;
        pool.close().await;
        Ok(())
    })
}
