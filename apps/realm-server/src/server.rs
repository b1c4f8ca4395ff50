use crate::config::ServerConfig;
use crate::snapshots::SnapshotWriter;
use anyhow::Context;
use realm_common::{EntityId, IVec2, IdAllocator};
use realm_input::{InputMapper, Intent};
use realm_kernel::{Entity, EntityMoved, Simulation, TickReport, WorldRegistry};
use realm_net::{ClientId, ClientPacket, NetEvent, Outbox, ServerPacket};
use realm_persist::{ArchiveError, ContentDir, RegistrySnapshot, SnapshotArchive};
use realm_script::ObjectTypeRegistry;
use realm_tools::{TpsReport, WorldInspector};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// A connected client and the player entity it drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub entity: EntityId,
    pub world: String,
    pub area: String,
}

/// Everything the simulation thread owns: the simulation, input state,
/// client sessions and the persistence handles.
pub struct WorldServer {
    config: ServerConfig,
    content: ContentDir,
    types: ObjectTypeRegistry,
    ids: IdAllocator,
    sim: Simulation,
    input: InputMapper,
    sessions: HashMap<ClientId, Session>,
    /// Held here only while no writer thread owns it.
    archive: Option<SnapshotArchive>,
    writer: Option<SnapshotWriter>,
}

impl WorldServer {
    /// Load content from `data_dir` (writing defaults on first start) and,
    /// when configured, resume from the newest archived snapshot.
    pub fn load(config: ServerConfig, data_dir: &Path) -> anyhow::Result<Self> {
        let content = ContentDir::new(data_dir);
        let mut types = ObjectTypeRegistry::new();
        let ids = IdAllocator::new();
        let (registry, report) = content
            .load_all(&mut types, &ids)
            .with_context(|| format!("loading content from {}", data_dir.display()))?;

        let archive = if config.snapshot_interval_ticks > 0 || config.restore_snapshot {
            let path = data_dir.join(&config.snapshot_dir);
            Some(SnapshotArchive::open(&path).with_context(|| format!("opening archive {}", path.display()))?)
        } else {
            None
        };

        let resumable = archive
            .as_ref()
            .filter(|a| config.restore_snapshot && !a.entries().is_empty());
        let sim = match resumable {
            Some(archive) => {
                archive.verify().context("snapshot archive failed verification")?;
                let snapshot = archive.latest().context("reading latest snapshot")?;
                tracing::info!(tick = snapshot.tick, entities = snapshot.entity_count(), "resuming from snapshot");
                Simulation::resume(snapshot.restore(&types, &ids), snapshot.tick)
            }
            None => Simulation::new(registry),
        };
        let (archive, writer) = match archive {
            Some(archive) if config.snapshot_interval_ticks > 0 => {
                let writer = SnapshotWriter::spawn(archive).context("starting snapshot writer")?;
                (None, Some(writer))
            }
            other => (other, None),
        };

        tracing::info!(
            worlds = report.worlds,
            areas = report.areas,
            object_types = report.object_types,
            skipped = report.skipped,
            "world server ready"
        );
        Ok(Self {
            input: InputMapper::new(config.walk_speed),
            config,
            content,
            types,
            ids,
            sim,
            sessions: HashMap::new(),
            archive,
            writer,
        })
    }

    pub fn registry(&self) -> &WorldRegistry {
        self.sim.registry()
    }

    pub fn tick(&self) -> u64 {
        self.sim.tick()
    }

    pub fn object_types(&self) -> &ObjectTypeRegistry {
        &self.types
    }

    /// Apply queued network events, then advance the simulation one tick.
    pub fn step(&mut self, events: impl IntoIterator<Item = NetEvent>, outbox: &mut Outbox) -> TickReport {
        for event in events {
            self.handle(event, outbox);
        }
        let report = self.sim.step(outbox);

        let interval = self.config.snapshot_interval_ticks;
        if interval > 0 && report.tick % interval == 0 {
            if let Some(writer) = &self.writer {
                writer.submit(self.capture());
            }
        }
        report
    }

    pub fn handle(&mut self, event: NetEvent, outbox: &Outbox) {
        match event {
            NetEvent::Connected(client) => self.connect(client, outbox),
            NetEvent::Packet(client, packet) => self.packet(client, packet),
            NetEvent::Disconnected(client) => self.disconnect(client),
        }
    }

    fn connect(&mut self, client: ClientId, outbox: &Outbox) {
        let Some(session) = self.spawn_player() else {
            tracing::warn!(%client, "no area to spawn into");
            return;
        };
        let welcome = ServerPacket::Welcome {
            client,
            entity: session.entity,
            world: session.world.clone(),
            area: session.area.clone(),
        };
        if let Err(err) = outbox.send_to(client, &welcome) {
            tracing::debug!(%client, error = %err, "welcome not sent");
        }
        let known = self.send_world_state(client, session.entity, outbox);
        tracing::info!(%client, entity = %session.entity, area = %session.area, known, "player joined");
        self.sessions.insert(client, session);
    }

    /// Tell a newcomer where every other entity is. The gate only reports
    /// changes, so entities at rest would otherwise stay invisible to it.
    fn send_world_state(&self, client: ClientId, own: EntityId, outbox: &Outbox) -> usize {
        let states = self
            .sim
            .registry()
            .iter()
            .flat_map(|world| world.areas())
            .flat_map(|(_, area)| {
                area.entities()
                    .filter(move |e| e.id() != own)
                    .map(move |e| EntityMoved::from_entity(area.name(), e))
            });
        let mut sent = 0;
        for state in states {
            if let Err(err) = outbox.send_to(client, &ServerPacket::EntityMove(state)) {
                tracing::debug!(%client, error = %err, "world state not sent");
                break;
            }
            sent += 1;
        }
        sent
    }

    fn spawn_player(&mut self) -> Option<Session> {
        let registry = self.sim.registry_mut();
        let configured = registry
            .get(&self.config.spawn_world)
            .and_then(|w| w.area_id(&self.config.spawn_area));
        let (world_name, area_id) = match configured {
            Some(area) => (self.config.spawn_world.clone(), area),
            None => {
                let world = registry.iter().find(|w| w.area_count() > 0)?;
                let (area, _) = world.areas().next()?;
                tracing::warn!(
                    world = %self.config.spawn_world,
                    area = %self.config.spawn_area,
                    fallback = %world.name(),
                    "configured spawn area missing"
                );
                (world.name().to_string(), area)
            }
        };

        let world = registry.get_mut(&world_name)?;
        let area_name = world.area(area_id)?.name().to_string();
        let mut entity = Entity::new(
            self.ids.next_entity(),
            IVec2::new(self.config.spawn_x, self.config.spawn_y),
        );
        // Announce the newcomer on the next gate pass.
        entity.force_update();
        match world.spawn_entity(area_id, entity) {
            Ok(entity) => Some(Session {
                entity,
                world: world_name,
                area: area_name,
            }),
            Err(err) => {
                tracing::error!(error = %err, "player entity not spawned");
                None
            }
        }
    }

    fn packet(&mut self, client: ClientId, packet: ClientPacket) {
        let Some(session) = self.sessions.get(&client) else {
            tracing::debug!(%client, "packet from client without session");
            return;
        };
        let entity = session.entity;
        let intent = match packet {
            ClientPacket::ControlPressed { control } => Intent::ControlPressed { entity, control },
            ClientPacket::ControlReleased { control } => Intent::ControlReleased { entity, control },
            ClientPacket::Interact { object } => {
                let world = session.world.clone();
                match self.sim.interact(&world, object, Some(entity)) {
                    Ok(true) => tracing::debug!(%client, %object, "interacted"),
                    Ok(false) => tracing::debug!(%client, %object, "interaction cancelled"),
                    Err(err) => tracing::warn!(%client, %object, error = %err, "interaction failed"),
                }
                return;
            }
        };
        if let Err(err) = self.input.apply(self.sim.registry_mut(), intent) {
            tracing::debug!(%client, error = %err, "intent dropped");
        }
    }

    fn disconnect(&mut self, client: ClientId) {
        let Some(session) = self.sessions.remove(&client) else {
            return;
        };
        self.sim.registry_mut().despawn(session.entity);
        self.input.forget(session.entity);
        tracing::info!(%client, entity = %session.entity, "player left");
    }

    /// Copy of the current state without player entities.
    fn capture(&self) -> RegistrySnapshot {
        let players: HashSet<EntityId> = self.sessions.values().map(|s| s.entity).collect();
        let mut snapshot = RegistrySnapshot::capture(self.sim.registry(), self.sim.tick());
        snapshot.retain_entities(|id| !players.contains(&id));
        snapshot
    }

    /// Archive the current state on the calling thread, after any queued
    /// background writes. `Ok(None)` when no archive is configured.
    pub fn checkpoint(&mut self) -> Result<Option<u32>, ArchiveError> {
        if let Some(writer) = self.writer.take() {
            self.archive = writer.finish();
        }
        let snapshot = self.capture();
        match self.archive.as_mut() {
            Some(archive) => archive.write(&snapshot).map(Some),
            None => Ok(None),
        }
    }

    /// Log a one-line status with world counts and the TPS window.
    pub fn log_status(&self, samples: &[u32]) {
        let tps = TpsReport::from_samples(samples);
        let summary = WorldInspector::summary(self.sim.registry());
        let target = realm_tick::tps_for(self.config.tick_period());
        if tps.is_behind(target) {
            tracing::warn!(tick = self.sim.tick(), clients = self.sessions.len(), %summary, %tps, target, "running behind");
        } else {
            tracing::info!(tick = self.sim.tick(), clients = self.sessions.len(), %summary, %tps, "status");
        }
    }

    /// Drop every session, archive a final snapshot and, when configured,
    /// write the worlds back to the content directory.
    pub fn shutdown(&mut self) -> anyhow::Result<()> {
        let clients: Vec<ClientId> = self.sessions.keys().copied().collect();
        for client in clients {
            self.disconnect(client);
        }
        if self.config.snapshot_interval_ticks > 0 {
            self.checkpoint().context("writing final snapshot")?;
        }
        if self.config.save_on_shutdown {
            for world in self.sim.registry().iter() {
                self.content
                    .save_world(world)
                    .with_context(|| format!("saving world {}", world.name()))?;
            }
        }
        tracing::info!(tick = self.sim.tick(), "world server shut down");
        Ok(())
    }
}
