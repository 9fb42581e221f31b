use std::sync::Arc;

use smartshop_agent::{CompositeResult, CoordinationAgent, LlmClient, OllamaClient};
use smartshop_core::config::{AppConfig, LoadOptions};
use smartshop_core::domain::context::{ContextSpec, Season};
use smartshop_core::domain::customer::CustomerId;
use smartshop_core::domain::product::ProductId;
use smartshop_core::errors::{InterfaceError, OrchestrationError};
use smartshop_core::gateway::DataGateway;
use smartshop_db::{connect_with_config, migrations, SqlDataGateway};
use tracing::error;
use uuid::Uuid;

use crate::commands::{CommandResult, EXIT_FAILURE, EXIT_NOT_FOUND};
use crate::logging::init_logging;

/// One presentation call, as requested on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrchestrationRequest {
    Recommend { customer_id: CustomerId, context: ContextSpec },
    AnalyzeCustomer { customer_id: CustomerId },
    AnalyzeProduct { product_id: ProductId },
    AnalyzeCategory { category: String },
    Seasonal { customer_id: CustomerId, season: Season },
}

impl OrchestrationRequest {
    pub fn command_name(&self) -> &'static str {
        match self {
            Self::Recommend { .. } => "recommend",
            Self::AnalyzeCustomer { .. } => "analyze-customer",
            Self::AnalyzeProduct { .. } => "analyze-product",
            Self::AnalyzeCategory { .. } => "analyze-category",
            Self::Seasonal { .. } => "seasonal",
        }
    }
}

pub fn run(request: OrchestrationRequest, options: LoadOptions) -> CommandResult {
    let command = request.command_name();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_FAILURE,
            );
        }
    };
    init_logging(&config);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_FAILURE,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| CommandResult::failure(command, "db_connectivity", error.to_string(), EXIT_FAILURE))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| CommandResult::failure(command, "migration", error.to_string(), EXIT_FAILURE))?;

        let gateway = Arc::new(SqlDataGateway::from_pool(pool.clone()));
        let llm: Arc<dyn LlmClient> = Arc::new(OllamaClient::from_config(&config.llm));
        let outcome = dispatch(&CoordinationAgent::new(gateway, llm, &config), &request).await;
        pool.close().await;
        Ok::<_, CommandResult>(outcome)
    });

    match result {
        Ok(outcome) => render(command, outcome),
        Err(failure) => failure,
    }
}

/// Routes `request` to the matching coordinator call.
pub async fn dispatch<G: DataGateway>(
    coordinator: &CoordinationAgent<G>,
    request: &OrchestrationRequest,
) -> Result<CompositeResult, OrchestrationError> {
    match request {
        OrchestrationRequest::Recommend { customer_id, context } => {
            coordinator.recommend(customer_id, context.clone()).await
        }
        OrchestrationRequest::AnalyzeCustomer { customer_id } => {
            coordinator.analyze_customer(customer_id).await
        }
        OrchestrationRequest::AnalyzeProduct { product_id } => {
            coordinator.analyze_product(product_id).await
        }
        OrchestrationRequest::AnalyzeCategory { category } => {
            coordinator.analyze_category(category).await
        }
        OrchestrationRequest::Seasonal { customer_id, season } => {
            coordinator.seasonal_recommend(customer_id, *season).await
        }
    }
}

/// Pretty JSON on success; a `CommandResult` error payload otherwise.
pub fn render(command: &str, outcome: Result<CompositeResult, OrchestrationError>) -> CommandResult {
    match outcome {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(output) => CommandResult { exit_code: 0, output },
            Err(error) => {
                CommandResult::failure(command, "serialization", error.to_string(), EXIT_FAILURE)
            }
        },
        Err(failure) => {
            let correlation_id = Uuid::new_v4().to_string();
            error!(
                event_name = "cli.command.failed",
                command,
                correlation_id = %correlation_id,
                error = %failure,
                "command failed"
            );
            let interface = failure.into_interface(correlation_id);
            let (error_class, exit_code) = match &interface {
                InterfaceError::NotFound { .. } => ("not_found", EXIT_NOT_FOUND),
                InterfaceError::ServiceUnavailable { .. } => ("service_unavailable", EXIT_FAILURE),
                InterfaceError::Internal { .. } => ("internal", EXIT_FAILURE),
            };
            CommandResult::failure_with_correlation(
                command,
                error_class,
                interface.user_message(),
                exit_code,
                Some(interface.correlation_id().to_string()),
            )
        }
    }
}
