use dotenvy::dotenv;
use kassa_bot::{config::BotConfig, run};
use log::info;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let config = BotConfig::from_env_or_default();
    info!("🚀️ Starting Kassa bot (operator: {})", config.operator_id);
    match run(config).await {
        Ok(_) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}
