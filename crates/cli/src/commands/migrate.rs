use crate::commands::{CommandResult, EXIT_FAILURE};
use smartshop_core::config::{AppConfig, LoadOptions};
use smartshop_db::{connect_with_config, migrations};

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_FAILURE,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_FAILURE,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string()))?;
        migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string()))?;
        pool.close().await;
        Ok::<(), (&'static str, String)>(())
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err((error_class, message)) => {
            CommandResult::failure("migrate", error_class, message, EXIT_FAILURE)
        }
    }
}
