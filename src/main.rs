use anyhow::Result;
use resource_runner::command_line;
use resource_runner::config::{Backend, Config};
use resource_runner::dynamodb::DynamoDb;
use resource_runner::logging;
use resource_runner::runner::{Runner, Services};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let config = Config::from_env()?;
    logging::init_logging(config.log_level)?;

    let services = match config.backend {
        Backend::Aws => {
            let sdk_config = aws_config::load_from_env().await;
            if let Err(e) = DynamoDb::new(&sdk_config).check_auth().await {
                warn!("{e}; operations will report their own errors");
            }
            Services::aws(&sdk_config, &config)?
        }
        Backend::Memory => {
            info!("Using in-memory services");
            Services::in_memory(&config)
        }
    };

    let runner = Runner::new(&config, &services);
    command_line::run(&runner).await
}
