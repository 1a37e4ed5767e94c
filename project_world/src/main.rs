use std::path::Path;
use std::time::Duration;

use engine_core::{Simulation, TickLoop};
use net::channels::{NetEnds, OutputTx, PlayerRx, RouterEnds, TickEnds};
use observability::TickMetrics;
use persistence::{FileStore, RegionCache};
use project_world::config::parse_cli_args;
use project_world::{Content, ServerConfig, World};
use tokio::net::TcpListener;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    observability::init_logging();

    let config = parse_cli_args();
    tracing::info!(addr = %config.net.addr, "world server starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (net_ends, router_ends, tick_ends) = net::channels::wire_channels();

    let server_future = run_world_server(config, net_ends, router_ends, tick_ends, shutdown_rx);

    tokio::select! {
        _ = wait_for_signal() => {
            tracing::info!("shutdown signal received, stopping server");
            let _ = shutdown_tx.send(true);
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        _ = server_future => {}
    }

    tracing::info!("server stopped");
}

/// SIGINT or SIGTERM on Unix, Ctrl+C elsewhere. A handler that cannot be
/// installed is logged and the server runs until its listener stops.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigint, mut sigterm) = match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "signal handler not installed");
                return std::future::pending().await;
            }
        };
        tokio::select! {
            _ = sigint.recv() => tracing::info!("received SIGINT"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "signal handler not installed");
            return std::future::pending().await;
        }
        tracing::info!("received Ctrl+C");
    }
}

async fn run_world_server(
    config: ServerConfig,
    net_ends: NetEnds,
    router_ends: RouterEnds,
    tick_ends: TickEnds,
    shutdown_rx: watch::Receiver<bool>,
) {
    tokio::spawn(net::output_router::run_output_router(router_ends, shutdown_rx.clone()));

    let listener = match TcpListener::bind(&config.net.addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %config.net.addr, error = %e, "bind failed");
            return;
        }
    };
    let max_line = config.net.max_line_length;
    tokio::spawn(async move {
        if let Err(e) = net::server::run_line_server(listener, net_ends, max_line).await {
            tracing::error!(error = %e, "line server stopped");
        }
    });

    let tick_handle = std::thread::spawn(move || run_tick_thread(config, tick_ends, shutdown_rx));
    // Joined off the runtime so the router keeps draining while the tick
    // thread sends its goodbyes.
    let _ = tokio::task::spawn_blocking(move || tick_handle.join()).await;
}

/// The world plus its channel ends: one `step` drains the inbox, advances
/// the world and hands the packets to the router.
struct Server {
    world: World,
    player_rx: PlayerRx,
    output_tx: OutputTx,
}

impl Server {
    fn send_output(&mut self) {
        for out in self.world.take_output() {
            let _ = self.output_tx.send(out);
        }
    }
}

impl Simulation for Server {
    fn step(&mut self, elapsed_ms: u64) -> TickMetrics {
        while let Ok(event) = self.player_rx.try_recv() {
            self.world.handle_net(event);
        }
        let metrics = self.world.tick(elapsed_ms);
        self.send_output();
        metrics
    }
}

fn build_world(config: &ServerConfig) -> Result<World, Box<dyn std::error::Error>> {
    let content = Content::load(
        Path::new(&config.content.mobs_path),
        Path::new(&config.content.areas_path),
    )?;
    tracing::info!(
        mobs = content.mobs.len(),
        spawns = content.spawns.len(),
        areas = content.areas.len(),
        "content loaded"
    );
    let map = content.build_map(config.map.width, config.map.height);
    let mut world = World::new(config.clone(), content, Box::new(map))?
        .with_store(Box::new(FileStore::new(&config.content.players_dir)));
    world.build_tiles(Some(&RegionCache::new(&config.map.cache_dir)))?;
    Ok(world)
}

fn run_tick_thread(config: ServerConfig, ends: TickEnds, shutdown_rx: watch::Receiver<bool>) {
    let world = match build_world(&config) {
        Ok(world) => world,
        Err(e) => {
            tracing::error!(error = %e, "world failed to start");
            std::process::exit(1);
        }
    };
    let mut server = Server {
        world,
        player_rx: ends.player_rx,
        output_tx: ends.output_tx,
    };

    tracing::info!(update_time_ms = config.tick.update_time_ms, "tick loop running (Ctrl+C to stop)");
    let ticks = TickLoop::new(config.to_tick_config()).run(&mut server, || *shutdown_rx.borrow());

    for out in server.world.shutdown() {
        let _ = server.output_tx.send(out);
    }
    tracing::info!(ticks, "tick loop stopped");
}
