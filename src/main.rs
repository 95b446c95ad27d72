use std::sync::Arc;

use tokio::{net::TcpListener, spawn, sync::mpsc::unbounded_channel};
use tracing::{error, info};

use feegrant_faucet::{
    blocks::BlockSource,
    broadcaster::Broadcaster,
    chain::lcd::LcdClient,
    config::Config,
    error::{AppResult, Application},
    log,
    queue::BroadcastQueue,
    server::{self, ServiceState},
    wallet::Wallet,
};

#[tokio::main]
async fn main() -> AppResult<()> {
    log::setup(std::io::stdout);

    let result = run().await;

    if let Err(error) = &result {
        error!("{error}");
    }

    result
}

async fn run() -> AppResult<()> {
    let config = Config::from_env()?;

    info!("Configuration read from the environment.");

    let wallet = Wallet::from_hex(&config.secret_key)?;

    let granter = wallet.address().to_owned();

    info!(granter = %granter, "Derived granter account.");

    let lcd = LcdClient::new(&config.lcd_url);

    let queue = Arc::new(BroadcastQueue::new());

    let (block_sender, block_receiver) = unbounded_channel();

    spawn(BlockSource::new(&config.rpc_url, block_sender).run());

    spawn(
        Broadcaster::new(
            queue.clone(),
            lcd.clone(),
            wallet,
            config.gas_price,
            config.memo.clone(),
        )
        .run(block_receiver),
    );

    let state = Arc::new(ServiceState {
        queue,
        lcd,
        granter,
        allowance_amount: config.allowance_amount,
    });

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(Application::Bind)?;

    info!(host = %config.host, port = config.port, "Serving the claim endpoint.");

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(Application::Serve)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C. Shutting down..."),
        Err(signal_error) => {
            error!(%signal_error, "Failed to listen for the shutdown signal!");

            std::future::pending::<()>().await;
        }
    }
}
