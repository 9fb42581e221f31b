pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use smartshop_core::config::{ConfigOverrides, LoadOptions};
use smartshop_core::domain::context::{ContextSpec, Season};

use commands::orchestrate::OrchestrationRequest;

#[derive(Debug, Parser)]
#[command(
    name = "smartshop",
    about = "SmartShop recommendation CLI",
    long_about = "Run SmartShop recommendations and catalog analyses against the configured \
                  database and LLM runtime. Every command prints JSON on stdout.",
    after_help = "Examples:\n  smartshop recommend C123 --season winter\n  smartshop analyze-product P1001\n  smartshop analyze-category Electronics\n  smartshop config"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Read configuration from this file instead of smartshop.toml")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override database.url")]
    database_url: Option<String>,
    #[arg(long, global = true, help = "Override llm.base_url")]
    llm_url: Option<String>,
    #[arg(long, global = true, help = "Override llm.model")]
    model: Option<String>,
    #[arg(long, global = true, help = "Override logging.level")]
    log_level: Option<String>,
}

impl GlobalArgs {
    fn load_options(&self, top_k: Option<usize>) -> LoadOptions {
        LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config.clone(),
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                log_level: self.log_level.clone(),
                llm_base_url: self.llm_url.clone(),
                llm_model: self.model.clone(),
                top_k,
            },
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Recommend products for a customer, optionally focused on one context")]
    Recommend {
        customer_id: String,
        #[arg(long, conflicts_with_all = ["occasion", "category"], help = "Season to focus on")]
        season: Option<Season>,
        #[arg(long, conflicts_with = "category", help = "Occasion tag to focus on")]
        occasion: Option<String>,
        #[arg(long, help = "Category to focus on")]
        category: Option<String>,
        #[arg(long, help = "Number of products to recommend")]
        top_k: Option<usize>,
    },
    #[command(about = "Summarise a customer's profile and behaviour")]
    AnalyzeCustomer { customer_id: String },
    #[command(about = "Describe a product with similar and complementary products")]
    AnalyzeProduct { product_id: String },
    #[command(about = "Describe a category with price and popularity trends")]
    AnalyzeCategory { category: String },
    #[command(about = "Recommend products for a customer for one season")]
    Seasonal {
        customer_id: String,
        season: Season,
        #[arg(long, help = "Number of products to recommend")]
        top_k: Option<usize>,
    },
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let result = execute(cli);
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

pub fn execute(cli: Cli) -> commands::CommandResult {
    let Cli { global, command } = cli;
    match command {
        Command::Recommend { customer_id, season, occasion, category, top_k } => {
            let context = match (season, occasion, category) {
                (Some(season), _, _) => ContextSpec::Season(season),
                (None, Some(occasion), _) => ContextSpec::Occasion(occasion),
                (None, None, Some(category)) => ContextSpec::Category(category),
                (None, None, None) => ContextSpec::None,
            };
            commands::orchestrate::run(
                OrchestrationRequest::Recommend { customer_id: customer_id.as_str().into(), context },
                global.load_options(top_k),
            )
        }
        Command::AnalyzeCustomer { customer_id } => commands::orchestrate::run(
            OrchestrationRequest::AnalyzeCustomer { customer_id: customer_id.as_str().into() },
            global.load_options(None),
        ),
        Command::AnalyzeProduct { product_id } => commands::orchestrate::run(
            OrchestrationRequest::AnalyzeProduct { product_id: product_id.as_str().into() },
            global.load_options(None),
        ),
        Command::AnalyzeCategory { category } => commands::orchestrate::run(
            OrchestrationRequest::AnalyzeCategory { category },
            global.load_options(None),
        ),
        Command::Seasonal { customer_id, season, top_k } => commands::orchestrate::run(
            OrchestrationRequest::Seasonal { customer_id: customer_id.as_str().into(), season },
            global.load_options(top_k),
        ),
        Command::Migrate => commands::migrate::run(global.load_options(None)),
        Command::Config => commands::CommandResult {
            exit_code: 0,
            output: commands::config::run(global.load_options(None)),
        },
    }
}
