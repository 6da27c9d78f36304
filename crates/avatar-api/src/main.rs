use avatar_core::AvatarConfig;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = AvatarConfig::from_env()?;

    avatar_api::telemetry::init_tracing();

    let (_state, router) = avatar_api::setup::initialize_app(config.clone()).await?;

    avatar_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
