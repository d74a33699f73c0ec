use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_observability::init();

    let settings = warden_api::config::ServerSettings::from_env();
    let security = warden_api::config::load_security_config(settings.config_path.as_deref())?;

    let app = warden_api::app::build_app(security, &settings.zone)
        .with_context(|| format!("failed to configure firewall zone '{}'", settings.zone))?;

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, zone = %settings.zone, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
