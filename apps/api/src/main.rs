use std::net::SocketAddr;

use dotenvy::dotenv;
use tracing::info;
use verdant_api::infra::{
    app::create_app,
    lifecycle_worker::run_lifecycle_loop,
    setup::{init_app_state, init_tracing},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let app_state = init_app_state().await?;
    let bind_addr = app_state.config.bind_addr;

    tokio::spawn(run_lifecycle_loop(
        app_state.subscription_use_cases.clone(),
        app_state.config.lifecycle_sweep_interval,
    ));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "verdant-api listening");

    axum::serve(
        listener,
        create_app(app_state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
