//! The game runner: session lifecycle, per-frame loop and host surface.
//!
//! A [`GameRunner`] owns at most one simulation plus everything the host
//! interacts with around it: camera, selection, control groups, the
//! compositor and the event queue. Hosts drive it from their frame callback:
//!
//! 1. [`tick`](GameRunner::tick) steps the simulation one frame, refreshes
//!    the snapshot and queues events.
//! 2. [`drain_events`](GameRunner::drain_events) hands those events over.
//! 3. [`render`](GameRunner::render) paints the framebuffer and
//!    [`present`](GameRunner::present) pushes it to a sink.
//!
//! Commands may be issued at any point between ticks.
//!
//! # State machine
//!
//! ```text
//! NoGame --start--> Loading --ok--> Running <--pause/resume--> Paused
//!           ^                 |         \                        /
//!           +------failed-----+          +------ stop() --------+--> Stopped
//! ```
//!
//! `stop()` is accepted in every state. A new session may start from
//! `NoGame` or `Stopped` only.

use std::collections::BTreeSet;
use std::path::Path;

use bwbridge_render::assets::AssetSource;
use bwbridge_render::compositor::{Compositor, RenderStrategy};
use bwbridge_render::minimap::MinimapImage;
use bwbridge_render::present::PresentationSink;
use bwbridge_sim::command::{AbilityTarget, OrderKind};
use bwbridge_sim::sandbox::{SandboxLoader, SandboxSim};
use bwbridge_sim::simulation::{GameSetup, Simulation, SimulationLoader};
use bwbridge_sim::types::{
    AbilityId, AbilityInfo, GameOutcome, PlayerId, Race, UnitTypeId, WorldPoint,
};
use bwbridge_sim::unit::UnitId;

use crate::camera::{Camera, ScreenPoint};
use crate::config::RunnerConfig;
use crate::dispatch::Dispatcher;
use crate::events::{EventQueue, FrameUpdate, GameEvent};
use crate::replay::{ReplayLog, ReplayPlayback, ReplayRecorder};
use crate::selection::{ControlGroups, SelectionSet};
use crate::snapshot::{extract, FrameSnapshot, UnitDescriptor};
use crate::sprites::{build_legacy_units, build_sprites, minimap_dots, SpriteArt};
use crate::BridgeError;

/// Lifecycle of a [`GameRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    NoGame,
    Loading,
    Running,
    Paused,
    Stopped,
}

/// Queue spawn and death events by comparing the snapshot with the ids seen
/// so far.
fn diff_units(
    sim: &dyn Simulation,
    snapshot: &FrameSnapshot,
    known: &mut BTreeSet<UnitId>,
    events: &mut EventQueue,
) {
    let dead: Vec<UnitId> = known.iter().copied().filter(|id| !sim.is_alive(*id)).collect();
    for id in dead {
        known.remove(&id);
        events.push(GameEvent::UnitDied { id });
    }
    for unit in &snapshot.units {
        if known.insert(unit.id) {
            events.push(GameEvent::UnitSpawned {
                id: unit.id,
                unit_type: unit.type_id,
                owner: unit.owner,
            });
        }
    }
}

/// Owner of one game session and everything the host touches around it.
pub struct GameRunner {
    config: RunnerConfig,
    loader: Box<dyn SimulationLoader>,
    state: RunnerState,
    sim: Option<Box<dyn Simulation>>,
    /// The player the session is viewed and controlled as.
    player: PlayerId,
    camera: Camera,
    selection: SelectionSet,
    groups: ControlGroups,
    events: EventQueue,
    compositor: Compositor,
    art: SpriteArt,
    snapshot: FrameSnapshot,
    /// Ids seen in some snapshot and not yet reported dead.
    known: BTreeSet<UnitId>,
    game_ended: bool,
    recorder: Option<ReplayRecorder>,
    playback: Option<ReplayPlayback>,
    /// Log of the last recorded session after it stopped.
    finished_log: Option<ReplayLog>,
}

impl GameRunner {
    pub fn new(config: RunnerConfig, loader: Box<dyn SimulationLoader>) -> Self {
        let mut compositor = Compositor::new(config.framebuffer_width, config.framebuffer_height);
        compositor.set_strategy(config.render_strategy);
        let camera = Camera::new(
            config.framebuffer_width as f32,
            config.framebuffer_height as f32,
        );
        Self {
            player: config.local_player,
            config,
            loader,
            state: RunnerState::NoGame,
            sim: None,
            camera,
            selection: SelectionSet::new(),
            groups: ControlGroups::new(),
            events: EventQueue::new(),
            compositor,
            art: SpriteArt::new(),
            snapshot: FrameSnapshot::empty(),
            known: BTreeSet::new(),
            game_ended: false,
            recorder: None,
            playback: None,
            finished_log: None,
        }
    }

    /// A runner that loads scenario files into the sandbox simulation.
    pub fn with_sandbox(config: RunnerConfig) -> Self {
        Self::new(config, Box::new(SandboxLoader::default()))
    }

    // -- lifecycle ----------------------------------------------------------

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunnerState::Running
    }

    fn set_state(&mut self, state: RunnerState) {
        if self.state != state {
            tracing::info!(from = ?self.state, to = ?state, "runner state changed");
            self.state = state;
        }
    }

    fn ensure_idle(&self) -> Result<(), BridgeError> {
        match self.state {
            RunnerState::NoGame | RunnerState::Stopped => Ok(()),
            state => Err(BridgeError::SessionActive(state)),
        }
    }

    /// Load `map_path` through the loader and start a recorded session.
    ///
    /// # Errors
    ///
    /// [`BridgeError::SessionActive`] while another session is loaded, and
    /// any load failure. After a failure the runner is in `NoGame`.
    pub fn start_game(
        &mut self,
        map_path: impl AsRef<Path>,
        race: Race,
        ai_difficulty: u8,
    ) -> Result<(), BridgeError> {
        self.ensure_idle()?;
        let setup = GameSetup {
            map_path: map_path.as_ref().to_path_buf(),
            local_player: self.config.local_player,
            race,
            ai_difficulty,
        };
        self.set_state(RunnerState::Loading);
        let result = self
            .loader
            .load(&setup)
            .map_err(BridgeError::from)
            .and_then(|sim| {
                let recorder = ReplayRecorder::new(&setup, self.config.checkpoint_interval);
                self.begin(sim, setup.local_player, Some(recorder), None)
            });
        if let Err(e) = &result {
            tracing::warn!(error = %e, map = %setup.map_path.display(), "game failed to start");
            self.set_state(RunnerState::NoGame);
        }
        result
    }

    /// Start a session on a simulation the host built itself. Nothing is
    /// recorded.
    pub fn start_session(&mut self, sim: Box<dyn Simulation>) -> Result<(), BridgeError> {
        self.ensure_idle()?;
        self.set_state(RunnerState::Loading);
        let result = self.begin(sim, self.config.local_player, None, None);
        if result.is_err() {
            self.set_state(RunnerState::NoGame);
        }
        result
    }

    /// Recreate a recorded session and play it back.
    ///
    /// Orders from host commands are ignored while the replay runs; selection
    /// and camera commands still work. Playback pauses when the recording
    /// ends.
    pub fn load_replay(&mut self, path: impl AsRef<Path>) -> Result<(), BridgeError> {
        self.ensure_idle()?;
        self.set_state(RunnerState::Loading);
        let result = ReplayLog::load(path.as_ref()).and_then(|log| {
            let mut playback = ReplayPlayback::new(&log)?;
            let empty = playback.take_end(0);
            let setup = log.setup();
            let sim = self.loader.load(&setup)?;
            tracing::info!(
                frames = log.total_frames,
                orders = log.order_count(),
                checkpoints = log.checkpoint_count(),
                "replay loaded"
            );
            self.begin(sim, setup.local_player, None, Some(playback))?;
            if empty {
                self.events.push(GameEvent::ReplayFinished { frames: 0 });
                self.set_state(RunnerState::Paused);
            }
            Ok(())
        });
        if let Err(e) = &result {
            tracing::warn!(error = %e, path = %path.as_ref().display(), "replay failed to load");
            self.set_state(RunnerState::NoGame);
        }
        result
    }

    fn begin(
        &mut self,
        sim: Box<dyn Simulation>,
        player: PlayerId,
        recorder: Option<ReplayRecorder>,
        playback: Option<ReplayPlayback>,
    ) -> Result<(), BridgeError> {
        let map = sim.map();
        let map_name = map.name.clone();
        self.compositor.clear();
        self.compositor
            .set_map_tiles(&map.tiles, map.width_tiles, map.height_tiles);
        self.compositor.set_tileset_index(map.tileset)?;
        let map_centre = WorldPoint::new(map.width_px() as f32 / 2.0, map.height_px() as f32 / 2.0);

        self.player = player;
        self.selection.clear();
        self.groups.clear();
        self.known.clear();
        self.game_ended = false;
        self.recorder = recorder;
        self.playback = playback;

        self.snapshot = extract(
            Some(&*sim),
            player,
            &mut self.selection,
            &mut self.groups,
        );
        self.known.extend(self.snapshot.units.iter().map(|u| u.id));
        self.camera.position = self
            .snapshot
            .units
            .iter()
            .find(|u| u.owner == player)
            .map_or(map_centre, |u| u.position);

        self.sim = Some(sim);
        self.events.push(GameEvent::GameStarted {
            map: map_name.clone(),
            local_player: player,
        });
        tracing::info!(
            map = %map_name,
            player = player.0,
            units = self.known.len(),
            replay = self.playback.is_some(),
            "session started"
        );
        self.set_state(RunnerState::Running);
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.state == RunnerState::Running {
            self.set_state(RunnerState::Paused);
        } else {
            tracing::debug!(state = ?self.state, "pause ignored");
        }
    }

    pub fn resume(&mut self) {
        if self.state == RunnerState::Paused {
            self.set_state(RunnerState::Running);
        } else {
            tracing::debug!(state = ?self.state, "resume ignored");
        }
    }

    /// Release the simulation. Accepted in every state.
    pub fn stop(&mut self) {
        self.sim = None;
        if let Some(recorder) = self.recorder.take() {
            self.finished_log = Some(recorder.finish());
        }
        self.playback = None;
        self.selection.clear();
        self.groups.clear();
        self.known.clear();
        self.snapshot = FrameSnapshot::empty();
        self.compositor.clear();
        self.set_state(RunnerState::Stopped);
    }

    // -- frame loop ---------------------------------------------------------

    /// Advance the session by one frame. A no-op unless running.
    pub fn tick(&mut self) {
        if self.state != RunnerState::Running {
            tracing::trace!(state = ?self.state, "tick ignored");
            return;
        }
        let Some(sim) = self.sim.as_deref_mut() else {
            return;
        };

        let frame = sim.current_frame();
        if let Some(playback) = &mut self.playback {
            for order in playback.take_orders(frame) {
                let label = order.kind.label();
                if let Err(reason) = sim.issue(order) {
                    tracing::warn!(frame, order = label, %reason, "recorded order refused");
                }
            }
        }
        sim.step_one_frame();

        let sim: &dyn Simulation = sim;
        self.snapshot = extract(Some(sim), self.player, &mut self.selection, &mut self.groups);
        diff_units(sim, &self.snapshot, &mut self.known, &mut self.events);
        self.events.push(GameEvent::FrameUpdated(FrameUpdate::new(
            self.snapshot.frame,
            self.snapshot.resources,
        )));

        let snapshot = &self.snapshot;
        if let Some(recorder) = &mut self.recorder {
            recorder.record_frame(snapshot.frame, || snapshot.state_hash());
        }
        let mut replay_done = false;
        if let Some(playback) = &mut self.playback {
            if let Some(d) = playback.check(snapshot.frame, || snapshot.state_hash()) {
                tracing::warn!(
                    frame = d.frame,
                    expected = %d.expected_hash,
                    actual = %d.actual_hash,
                    "replay diverged"
                );
                self.events.push(GameEvent::ReplayDiverged {
                    frame: d.frame,
                    expected_hash: d.expected_hash,
                    actual_hash: d.actual_hash,
                });
            }
            if playback.take_end(snapshot.frame) {
                self.events.push(GameEvent::ReplayFinished {
                    frames: snapshot.frame,
                });
                replay_done = true;
            }
        }

        if !self.game_ended {
            if let Some(outcome) = sim.outcome(self.player) {
                let victory = outcome == GameOutcome::Victory;
                tracing::info!(frame = snapshot.frame, victory, "game ended");
                self.events.push(GameEvent::GameEnded { victory });
                self.game_ended = true;
            }
        }

        if replay_done {
            self.set_state(RunnerState::Paused);
        }
    }

    /// Take every event queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain()
    }

    /// The snapshot refreshed by the last tick (or session start).
    pub fn snapshot(&self) -> &FrameSnapshot {
        &self.snapshot
    }

    // -- rendering ----------------------------------------------------------

    fn map_size_px(&self) -> (u32, u32) {
        self.sim
            .as_deref()
            .map_or((0, 0), |s| (s.map().width_px(), s.map().height_px()))
    }

    /// Paint the current snapshot into the framebuffer.
    pub fn render(&mut self) {
        let view = self.camera.framebuffer_view(
            self.config.framebuffer_width,
            self.config.framebuffer_height,
        );
        match self.compositor.strategy() {
            RenderStrategy::Sprites => {
                let (sprites, selected) = build_sprites(
                    &self.snapshot,
                    &view,
                    self.player,
                    &mut self.art,
                    self.compositor.frames_mut(),
                );
                self.compositor.set_sprites(sprites, selected);
            }
            RenderStrategy::Legacy => {
                self.compositor
                    .set_units(build_legacy_units(&self.snapshot, &view, self.player));
            }
        }
        let (ox, oy) = view.origin();
        let (mw, mh) = self.map_size_px();
        self.compositor.render(ox, oy, mw, mh);
    }

    /// Paint the diagnostic pattern for the current camera and map.
    pub fn render_test_pattern(&mut self) {
        let view = self.camera.framebuffer_view(
            self.config.framebuffer_width,
            self.config.framebuffer_height,
        );
        let (ox, oy) = view.origin();
        let (mw, mh) = self.map_size_px();
        self.compositor.render_test_pattern(ox, oy, mw, mh);
    }

    /// Hand the framebuffer and active palette to `sink`.
    pub fn present(&self, sink: &mut dyn PresentationSink) -> Result<(), BridgeError> {
        sink.present(self.compositor.framebuffer(), self.compositor.palette())?;
        Ok(())
    }

    pub fn load_image_data_from_path(&mut self, path: impl AsRef<Path>) -> Result<usize, BridgeError> {
        let loaded = self.compositor.load_image_data_from_path(path.as_ref())?;
        self.reapply_tileset();
        Ok(loaded)
    }

    pub fn load_image_data(&mut self, source: &dyn AssetSource) -> Result<usize, BridgeError> {
        let loaded = self.compositor.load_image_data(source)?;
        self.reapply_tileset();
        Ok(loaded)
    }

    fn reapply_tileset(&mut self) {
        let Some(tileset) = self.sim.as_deref().map(|s| s.map().tileset) else {
            return;
        };
        if let Err(e) = self.compositor.set_tileset_index(tileset) {
            tracing::warn!(error = %e, "loaded image data lacks the map's tileset");
        }
    }

    pub fn set_render_strategy(&mut self, strategy: RenderStrategy) {
        self.compositor.set_strategy(strategy);
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut Compositor {
        &mut self.compositor
    }

    /// Per-type sprite art; register real frames here.
    pub fn art_mut(&mut self) -> &mut SpriteArt {
        &mut self.art
    }

    /// Minimap of the map and visible units; empty without a session.
    pub fn minimap_rgba(&self) -> MinimapImage {
        if self.sim.is_none() {
            return MinimapImage::empty();
        }
        self.compositor
            .minimap(&minimap_dots(&self.snapshot), self.config.minimap_size)
    }

    pub fn minimap_size(&self) -> u32 {
        self.config.minimap_size
    }

    // -- camera -------------------------------------------------------------

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn set_camera_position(&mut self, position: WorldPoint) {
        self.camera.position = position;
    }

    /// Shift the camera by a screen-space delta.
    pub fn pan_camera(&mut self, dx: f32, dy: f32) {
        self.camera.position.x += dx / self.camera.zoom;
        self.camera.position.y += dy / self.camera.zoom;
    }

    /// Set the zoom, clamped to the configured bounds.
    pub fn set_zoom(&mut self, zoom: f32) {
        self.camera.zoom = self.config.clamp_zoom(zoom);
    }

    pub fn zoom(&self) -> f32 {
        self.camera.zoom
    }

    /// Size of the host's view in screen pixels.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.camera.viewport_width = width.max(1.0);
        self.camera.viewport_height = height.max(1.0);
    }

    pub fn screen_to_world(&self, p: ScreenPoint) -> WorldPoint {
        self.camera.screen_to_world(p)
    }

    pub fn world_to_screen(&self, p: WorldPoint) -> ScreenPoint {
        self.camera.world_to_screen(p)
    }

    // -- session queries ----------------------------------------------------

    pub fn local_player(&self) -> PlayerId {
        self.player
    }

    pub fn current_frame(&self) -> u32 {
        self.sim.as_deref().map_or(0, |s| s.current_frame())
    }

    pub fn map_width(&self) -> u32 {
        self.map_size_px().0
    }

    pub fn map_height(&self) -> u32 {
        self.map_size_px().1
    }

    pub fn simulation(&self) -> Option<&dyn Simulation> {
        self.sim.as_deref()
    }

    pub fn simulation_mut(&mut self) -> Option<&mut (dyn Simulation + 'static)> {
        self.sim.as_deref_mut()
    }

    /// The running sandbox, if the session uses one.
    pub fn sandbox_mut(&mut self) -> Option<&mut SandboxSim> {
        self.sim
            .as_mut()
            .and_then(|s| s.as_any_mut().downcast_mut::<SandboxSim>())
    }

    /// The recording of the current session, or of the last one stopped.
    pub fn replay_log(&self) -> Option<&ReplayLog> {
        self.recorder
            .as_ref()
            .map(ReplayRecorder::log)
            .or(self.finished_log.as_ref())
    }

    pub fn save_replay(&self, path: impl AsRef<Path>) -> Result<(), BridgeError> {
        let log = self
            .replay_log()
            .ok_or_else(|| BridgeError::InvalidReplay("no recorded session".to_owned()))?;
        log.applied().save(path.as_ref())
    }

    // -- selection queries --------------------------------------------------

    pub fn selection(&self) -> &[UnitId] {
        self.selection.ids()
    }

    pub fn selection_count(&self) -> usize {
        self.selection.len()
    }

    pub fn has_selection(&self) -> bool {
        !self.selection.is_empty()
    }

    /// Current state of every selected unit.
    pub fn selected_units_info(&self) -> Vec<UnitDescriptor> {
        let Some(sim) = self.sim.as_deref() else {
            return Vec::new();
        };
        self.selection
            .ids()
            .iter()
            .filter_map(|id| sim.unit(*id))
            .map(UnitDescriptor::from)
            .collect()
    }

    /// Abilities of the selected own units, each listed once in first-seen
    /// order.
    pub fn available_abilities(&self) -> Vec<AbilityInfo> {
        let Some(sim) = self.sim.as_deref() else {
            return Vec::new();
        };
        let mut out: Vec<AbilityInfo> = Vec::new();
        for id in self.selection.ids() {
            if sim.unit(*id).map_or(true, |u| u.owner != self.player) {
                continue;
            }
            for ability in sim.abilities(*id) {
                if !out.iter().any(|a| a.id == ability.id) {
                    out.push(ability);
                }
            }
        }
        out
    }

    // -- commands -----------------------------------------------------------

    /// Run a dispatcher call against the active session, recording the
    /// orders it issues.
    fn dispatch<R>(&mut self, f: impl FnOnce(&mut Dispatcher<'_>) -> R) -> Option<R> {
        if !matches!(self.state, RunnerState::Running | RunnerState::Paused) {
            tracing::debug!(state = ?self.state, "command ignored without an active session");
            return None;
        }
        let sim = self.sim.as_deref_mut()?;
        let frame = sim.current_frame();
        let mut issued = Vec::new();
        let mut dispatcher = Dispatcher {
            sim,
            player: self.player,
            selection: &mut self.selection,
            groups: &mut self.groups,
            events: &mut self.events,
            max_selection: self.config.max_selection,
            read_only: self.playback.is_some(),
            issued: &mut issued,
        };
        let result = f(&mut dispatcher);
        if let Some(recorder) = &mut self.recorder {
            if !issued.is_empty() {
                recorder.record_orders(frame, issued);
            }
        }
        Some(result)
    }

    fn world(&self, p: ScreenPoint) -> WorldPoint {
        self.camera.screen_to_world(p)
    }

    /// Point-select tolerance in world pixels.
    fn slop(&self) -> f32 {
        self.config.point_select_radius / self.camera.zoom
    }

    pub fn select_at(&mut self, at: ScreenPoint) {
        let (world, slop) = (self.world(at), self.slop());
        self.dispatch(|d| d.select_at(world, slop));
    }

    pub fn select_box(&mut self, a: ScreenPoint, b: ScreenPoint) {
        let (wa, wb) = (self.world(a), self.world(b));
        self.dispatch(|d| d.select_box(wa, wb));
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn move_selected_to(&mut self, at: ScreenPoint) {
        let world = self.world(at);
        self.dispatch(|d| d.move_to(world));
    }

    pub fn attack_move_to(&mut self, at: ScreenPoint) {
        let world = self.world(at);
        self.dispatch(|d| d.attack_move(world));
    }

    pub fn patrol_to(&mut self, at: ScreenPoint) {
        let world = self.world(at);
        self.dispatch(|d| d.patrol(world));
    }

    pub fn hold_position(&mut self) {
        self.dispatch(|d| d.hold());
    }

    pub fn stop_selected(&mut self) {
        self.dispatch(|d| d.stop());
    }

    pub fn build(&mut self, unit_type: UnitTypeId, at: ScreenPoint) {
        let world = self.world(at);
        self.dispatch(|d| d.build(unit_type, world));
    }

    pub fn train(&mut self, unit_type: UnitTypeId) {
        self.dispatch(|d| d.train(unit_type));
    }

    pub fn use_ability(&mut self, ability: AbilityId) {
        self.dispatch(|d| d.use_ability(ability, AbilityTarget::None));
    }

    pub fn use_ability_at(&mut self, ability: AbilityId, at: ScreenPoint) {
        let world = self.world(at);
        self.dispatch(|d| d.use_ability(ability, AbilityTarget::Ground(world)));
    }

    pub fn use_ability_on(&mut self, ability: AbilityId, target: UnitId) {
        self.dispatch(|d| d.use_ability(ability, AbilityTarget::Unit(target)));
    }

    pub fn assign_control_group(&mut self, index: i32) {
        self.dispatch(|d| d.assign_group(index));
    }

    pub fn add_to_control_group(&mut self, index: i32) {
        self.dispatch(|d| d.add_to_group(index));
    }

    pub fn select_control_group(&mut self, index: i32) {
        self.dispatch(|d| d.select_group(index));
    }

    /// Live members of control group `index`.
    pub fn control_group_size(&mut self, index: i32) -> usize {
        self.dispatch(|d| d.group_size(index)).unwrap_or(0)
    }

    pub fn rally_to_position(&mut self, at: ScreenPoint) {
        let world = self.world(at);
        self.dispatch(|d| d.rally_to_position(world));
    }

    pub fn rally_to_unit(&mut self, target: UnitId) {
        self.dispatch(|d| d.rally_to_unit(target));
    }

    /// Context-sensitive command at a screen position (see
    /// [`Dispatcher::command_to`]).
    pub fn command_selected_to(&mut self, at: ScreenPoint, right_click: bool) {
        let (world, slop) = (self.world(at), self.slop());
        self.dispatch(|d| d.command_to(world, right_click, slop));
    }

    /// Issue a fully specified order (world coordinates) to the selection.
    pub fn issue_command(&mut self, kind: OrderKind) {
        self.dispatch(|d| d.issue_command(kind));
    }
}
