use clap::Parser;
use std::path::Path;
use std::time::Instant;
use streetrace_sim::{
    assets::{FsModelSource, ModelCache, PLAYER_FALLBACK_COLOR},
    car_loader::CarLoader,
    config::{LoggingSettings, SimConfig},
    data::*,
    error::SimError,
    ghost::{offer_ghost, FileGhostStore, GhostStore},
    input::InputState,
    map_loader::MapLoader,
    physics::normalize_angle,
    race_session::{RaceEvent, RaceSession, SessionOptions},
};
use tokio::task::JoinSet;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to streetrace.toml configuration file
    #[arg(short, long, default_value = "./streetrace.toml")]
    config: String,

    /// Map record (JSON or YAML); a built-in loop is used when omitted
    #[arg(short, long)]
    map: Option<String>,

    /// Car stats file (TOML)
    #[arg(long)]
    car: Option<String>,

    /// Race mode (normal|bots|ghost)
    #[arg(long, default_value = "bots")]
    mode: RaceMode,

    #[arg(long, default_value_t = 4)]
    bots: usize,

    /// Overrides the configured seed
    #[arg(long)]
    seed: Option<u64>,

    /// Tick on a wall-clock interval instead of as fast as possible
    #[arg(long)]
    realtime: bool,

    /// Override log level (trace|debug|info|warn|error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Give up after this much simulated time
    #[arg(long, default_value_t = 300.0)]
    max_seconds: f32,
}

fn init_tracing(level: &str, logging: &LoggingSettings) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console = logging.console_enabled.then(|| fmt::layer());

    let (file, guard) = match &logging.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "streetrace-sim.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().json().with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    guard
}

/// Small closed loop used when no map file is given
fn demo_map() -> Result<TrackMap, SimError> {
    let checkpoint = |x: f32, z: f32| CheckpointSpec { x, y: 0.0, z };
    TrackMap::try_from(MapRecord {
        id: Uuid::nil(),
        name: "Harbour Loop".to_string(),
        description: "Built-in demo circuit".to_string(),
        checkpoints: vec![
            checkpoint(0.0, 0.0),
            checkpoint(0.0, 220.0),
            checkpoint(160.0, 320.0),
            checkpoint(320.0, 220.0),
            checkpoint(320.0, 0.0),
            checkpoint(160.0, -90.0),
        ],
        obstacles: vec![],
        difficulty: 1,
    })
}

/// Steer the player straight at the next checkpoint
fn autopilot(session: &RaceSession) -> InputState {
    let target = session.next_checkpoint();
    let car = &session.player;
    let target_angle = (target.x - car.position.x).atan2(target.z - car.position.z);
    let angle_diff = normalize_angle(target_angle - car.rotation);
    let forward = if angle_diff.abs() > 0.6 { 0.6 } else { 1.0 };
    InputState::new(forward, (-angle_diff * 3.0).clamp(-1.0, 1.0))
}

async fn attach_renderables(session: &mut RaceSession, config: &SimConfig, car: &CarStats) {
    let cache = ModelCache::new(FsModelSource::new(&config.content.models_dir));

    let player_model = car
        .model_path
        .clone()
        .unwrap_or_else(|| config.content.default_model.clone());
    let player = cache.load_renderable(&player_model, PLAYER_FALLBACK_COLOR).await;
    session.attach_player_renderable(player);

    let mut loads = JoinSet::new();
    for (index, bot) in session.bots().iter().enumerate() {
        let cache = cache.clone();
        let path = bot.profile.model_path.clone();
        let color = bot.profile.fallback_color;
        loads.spawn(async move { (index, cache.load_renderable(&path, color).await) });
    }
    while let Some(joined) = loads.join_next().await {
        match joined {
            Ok((index, renderable)) => {
                session.attach_bot_renderable(index, renderable);
            }
            Err(e) => warn!("Bot model task failed: {}", e),
        }
    }

    info!("Models resolved: {} cached", cache.loaded_count());
}

fn log_event(session: &RaceSession, event: &RaceEvent) {
    match event {
        RaceEvent::RaceStarted => info!("Lights out"),
        RaceEvent::CheckpointCaptured { index, race_time } => {
            debug!("Checkpoint {} at {:.2}s", index, race_time)
        }
        RaceEvent::Collision { impact_speed, damage } => debug!(
            "Collision at {:.1} m/s, {:.1} damage, condition {:.0}",
            impact_speed, damage, session.player.condition
        ),
        RaceEvent::Launched => debug!("Airborne"),
        RaceEvent::Finished { race_time, position } => {
            info!("Finished P{} in {:.3}s", position, race_time)
        }
        RaceEvent::BotFinished { bot, race_time } => {
            let name = session.bots().get(*bot).map(|b| b.profile.name.as_str()).unwrap_or("?");
            info!("{} finished in {:.3}s", name, race_time)
        }
    }
}

async fn run_race(session: &mut RaceSession, tick_rate: u16, realtime: bool, max_seconds: f32) {
    let fixed_dt = 1.0 / tick_rate as f32;
    let mut ticker = interval(Duration::from_secs_f32(fixed_dt));
    let mut last_tick = Instant::now();
    let mut elapsed = 0.0;

    while !session.is_finished() && elapsed < max_seconds {
        let dt = if realtime {
            ticker.tick().await;
            let now = Instant::now();
            let dt = now.duration_since(last_tick).as_secs_f32();
            last_tick = now;
            dt
        } else {
            fixed_dt
        };
        elapsed += dt;

        let input = autopilot(session);
        for event in session.tick(dt, input) {
            log_event(session, &event);
        }
    }

    if !session.is_finished() {
        warn!(
            "Gave up after {:.0}s at checkpoint {}",
            elapsed,
            session.current_checkpoint()
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = SimConfig::load_or_default(&args.config);
    if let Some(seed) = args.seed {
        config.simulation.seed = Some(seed);
    }

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let _log_guard = init_tracing(&log_level, &config.logging);

    info!("Starting streetrace-sim v{}", env!("CARGO_PKG_VERSION"));

    let map = match &args.map {
        Some(path) => MapLoader::load_from_file(path)?,
        None => demo_map()?,
    };
    let car = match &args.car {
        Some(path) => CarLoader::load_from_file(Path::new(path))?,
        None => CarStats::default(),
    };
    info!(
        "Map '{}' ({} checkpoints), car '{}' ({} km/h)",
        map.name,
        map.checkpoints.len(),
        car.name,
        car.max_speed
    );

    let ghosts = FileGhostStore::new(&config.content.ghosts_dir);
    let ghost = if args.mode == RaceMode::Ghost {
        let ghost = ghosts.get_ghost(map.id).await;
        if ghost.is_none() {
            info!("No ghost stored for this map yet");
        }
        ghost
    } else {
        None
    };

    let options = SessionOptions {
        mode: args.mode,
        bot_count: args.bots.min(config.simulation.max_bots),
        countdown_seconds: config.simulation.countdown_seconds,
        max_dt: config.simulation.max_dt,
        seed: config.simulation.seed.unwrap_or_else(rand::random),
        ghost,
    };

    let map_id = map.id;
    let mut session = RaceSession::new(map, car.clone(), options)?;
    attach_renderables(&mut session, &config, &car).await;

    run_race(
        &mut session,
        config.simulation.tick_rate_hz,
        args.realtime,
        args.max_seconds,
    )
    .await;

    if let Some(report) = session.take_report() {
        let mut leaderboard = MemoryLeaderboard::default();
        leaderboard.submit(&report)?;
        info!("Race report: {}", serde_json::to_string(&report)?);
    }

    if let Some(run) = session.ghost_run() {
        tokio::fs::create_dir_all(&config.content.ghosts_dir).await?;
        if offer_ghost(&ghosts, map_id, &run).await? {
            info!("New best ghost saved to {:?}", ghosts.path_for(map_id));
        }
    }

    Ok(())
}
