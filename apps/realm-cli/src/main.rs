use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use realm_common::{EntityId, IVec2, IdAllocator};
use realm_input::{InputMapper, Intent};
use realm_kernel::{EntityMoved, Simulation, WorldRegistry};
use realm_persist::{ContentDir, LoadReport, RegistrySnapshot, SnapshotArchive};
use realm_script::ObjectTypeRegistry;
use realm_tick::{RunningFlag, SERVER_TICK_PERIOD, TickScheduler};
use realm_tools::{TpsReport, WorldInspector};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "realm-cli", about = "Operator tool for realm content and snapshots")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Content and state directory
    #[arg(long, global = true, default_value = "./realm_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default tiles and world if none exist
    Init,
    /// Print loaded worlds, areas and counts
    Inspect {
        /// Show a single entity
        #[arg(long)]
        entity: Option<u64>,
    },
    /// Load all content and fail if anything was skipped
    Validate,
    /// Run the simulation headless for a number of ticks
    Run {
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "40")]
        ticks: u64,
        /// Tick period in milliseconds
        #[arg(long, default_value_t = SERVER_TICK_PERIOD.as_millis() as u64)]
        period_ms: u64,
        /// Horizontal speed given to every entity before the run
        #[arg(long, allow_hyphen_values = true)]
        dx: Option<i32>,
        /// Vertical speed given to every entity before the run
        #[arg(long, allow_hyphen_values = true)]
        dy: Option<i32>,
        /// Print every movement broadcast as a JSON line
        #[arg(long)]
        print: bool,
    },
    /// Work with the compressed snapshot archive
    Snapshot {
        /// Archive directory [default: <data-dir>/snapshots]
        #[arg(long)]
        archive: Option<PathBuf>,
        #[command(subcommand)]
        action: SnapshotAction,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// Capture the current content into the archive
    Write,
    /// Check every file hash and the hash chain
    Verify,
    /// List archived snapshots
    List,
    /// Summarize one snapshot (latest when no index is given)
    Show { index: Option<u32> },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let content = ContentDir::new(&cli.data_dir);
    match cli.command {
        Commands::Init => {
            content.write_defaults()?;
            println!("Content ready in {}", content.root().display());
        }
        Commands::Inspect { entity } => {
            let (registry, _) = load(&content)?;
            match entity {
                Some(id) => match WorldInspector::inspect_entity(&registry, EntityId(id)) {
                    Some(info) => println!("{info}"),
                    None => bail!("entity {id} not found"),
                },
                None => {
                    println!("{}", WorldInspector::summary(&registry));
                    for world in registry.iter() {
                        print!("{}", WorldInspector::world(world));
                    }
                }
            }
        }
        Commands::Validate => {
            if !content.has_worlds() {
                bail!("no worlds/ directory under {}", content.root().display());
            }
            let (registry, report) = load(&content)?;
            println!(
                "tiles={} object_types={} worlds={} areas={} skipped={}",
                report.tiles, report.object_types, report.worlds, report.areas, report.skipped
            );
            println!("{}", WorldInspector::summary(&registry));
            if report.skipped > 0 {
                bail!("{} item(s) failed to load", report.skipped);
            }
            println!("OK");
        }
        Commands::Run {
            ticks,
            period_ms,
            dx,
            dy,
            print,
        } => {
            let (registry, _) = load(&content)?;
            run(registry, ticks, Duration::from_millis(period_ms), dx, dy, print);
        }
        Commands::Snapshot { archive, action } => {
            let path = archive.unwrap_or_else(|| cli.data_dir.join("snapshots"));
            let mut archive =
                SnapshotArchive::open(&path).with_context(|| format!("opening archive {}", path.display()))?;
            match action {
                SnapshotAction::Write => {
                    let (registry, _) = load(&content)?;
                    let snapshot = RegistrySnapshot::capture(&registry, 0);
                    let index = archive.write(&snapshot)?;
                    println!("Snapshot {index} written ({} entities)", snapshot.entity_count());
                }
                SnapshotAction::Verify => {
                    archive.verify()?;
                    println!("OK: {} snapshot(s), hash chain intact", archive.entries().len());
                }
                SnapshotAction::List => {
                    for (i, entry) in archive.entries().iter().enumerate() {
                        println!("{:>4}  tick={:<8} {}  {}", i + 1, entry.tick, &entry.sha256[..12], entry.filename);
                    }
                }
                SnapshotAction::Show { index } => {
                    let snapshot = match index {
                        Some(i) => archive.load(i)?,
                        None => archive.latest()?,
                    };
                    let registry = snapshot.restore(&ObjectTypeRegistry::new(), &IdAllocator::new());
                    println!("tick={} {}", snapshot.tick, WorldInspector::summary(&registry));
                }
            }
        }
    }

    Ok(())
}

fn load(content: &ContentDir) -> anyhow::Result<(WorldRegistry, LoadReport)> {
    let mut types = ObjectTypeRegistry::new();
    let ids = IdAllocator::new();
    content
        .load_all(&mut types, &ids)
        .with_context(|| format!("loading {}", content.root().display()))
}

fn run(registry: WorldRegistry, ticks: u64, period: Duration, dx: Option<i32>, dy: Option<i32>, print: bool) {
    let mut sim = Simulation::new(registry);

    if dx.is_some() || dy.is_some() {
        let speed = IVec2::new(dx.unwrap_or(0), dy.unwrap_or(0));
        let entities: Vec<EntityId> = sim
            .registry()
            .iter()
            .flat_map(WorldInspector::list_entities)
            .collect();
        let intents = entities.into_iter().map(|entity| Intent::SetSpeed { entity, speed });
        let applied = InputMapper::default().apply_all(sim.registry_mut(), intents);
        println!("Speed ({}, {}) set on {applied} entities", speed.x, speed.y);
    }

    let scheduler = TickScheduler::new(period, RunningFlag::new());
    let mut broadcasts = 0;
    let mut out: Vec<EntityMoved> = Vec::new();
    if ticks > 0 {
        scheduler.run(|| {
            let report = sim.step(&mut out);
            broadcasts += report.broadcasts;
            for message in out.drain(..) {
                if print {
                    match serde_json::to_string(&message) {
                        Ok(line) => println!("{line}"),
                        Err(err) => tracing::error!(error = %err, "broadcast not printable"),
                    }
                }
            }
            if report.tick >= ticks {
                scheduler.stop();
            }
        });
    }

    println!("Ran {} ticks, {broadcasts} broadcasts", sim.tick());
    println!("{}", TpsReport::from_samples(&scheduler.history().snapshot()));
    println!("{}", WorldInspector::summary(sim.registry()));
}
