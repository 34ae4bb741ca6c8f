use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};

use underround::bus::EventBus;
use underround::config::{Config, StrategyKind};
use underround::discovery::DiscoveryService;
use underround::engine::Engine;
use underround::exchange::{ExchangeClient, MockExchange};
use underround::market_data::MarketDataService;
use underround::order_manager::OrderManager;
use underround::risk::RiskManager;
use underround::store::{SqliteStore, Store};
use underround::strategy::{
    ArbitrageConfig, ArbitrageStrategy, MarketMakerConfig, MarketMakerStrategy,
    MeanReversionConfig, MeanReversionStrategy, MomentumConfig, MomentumStrategy,
};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    config.init_logging();
    info!("underround starting");

    let engine = match build_engine(&config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Startup failed: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = engine.start().await {
        eprintln!("Engine start failed: {e}");
        std::process::exit(1);
    }

    wait_for_shutdown().await;
    info!("Shutdown signal received");

    engine.stop().await;
    engine.close();
    info!("underround stopped");
}

fn build_engine(config: &Config) -> anyhow::Result<Engine> {
    let store: Arc<dyn Store> = Arc::new(
        SqliteStore::open(&config.database_url)
            .with_context(|| format!("opening store at {}", config.database_url))?,
    );

    // The live exchange adapter is linked by deployments that have one;
    // this binary always carries the in-process mock.
    let exchange: Arc<dyn ExchangeClient> = Arc::new(MockExchange::new());
    if !config.dry_run {
        warn!("No live exchange adapter is linked; orders will hit the in-process mock");
    }

    let bus = EventBus::new();
    let market_data = Arc::new(MarketDataService::new(
        Arc::clone(&exchange),
        bus.clone(),
        config.poll_interval,
    ));
    let risk = Arc::new(RiskManager::new(
        Arc::clone(&store),
        bus.clone(),
        config.risk_limits.clone(),
    ));
    let orders = Arc::new(OrderManager::new(
        exchange,
        Arc::clone(&store),
        Arc::clone(&risk),
        bus.clone(),
        config.dry_run,
    ));
    let discovery = config
        .wants_discovery()
        .then(|| Arc::new(DiscoveryService::new(config.discovery.clone(), bus.clone())));

    let engine = Engine::new(
        bus,
        Arc::clone(&market_data),
        discovery,
        risk,
        orders,
        Arc::clone(&store),
    );

    for kind in &config.strategies {
        match kind {
            StrategyKind::MarketMaker => {
                engine.register_strategy(Arc::new(MarketMakerStrategy::new(
                    MarketMakerConfig::default(),
                )));
            }
            StrategyKind::Momentum => {
                engine.register_strategy(Arc::new(MomentumStrategy::new(
                    MomentumConfig::default(),
                )));
            }
            StrategyKind::MeanReversion => {
                engine.register_strategy(Arc::new(MeanReversionStrategy::new(
                    MeanReversionConfig::default(),
                )));
            }
            StrategyKind::BregmanArb => {
                let arb_config = ArbitrageConfig {
                    max_position_size: config.risk_limits.max_position_size,
                    ..ArbitrageConfig::default()
                };
                engine.register_strategy(Arc::new(ArbitrageStrategy::new(
                    arb_config,
                    Arc::clone(&market_data),
                    Arc::clone(&store),
                )));
            }
        }
    }

    engine.set_tokens(&config.token_ids);
    Ok(engine)
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal as unix_signal, SignalKind};
        match unix_signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                let _ = signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
}
