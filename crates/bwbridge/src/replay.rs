//! Session recording and playback with checkpoint verification.
//!
//! A [`ReplayLog`] holds the game setup, every order the simulation accepted
//! (tagged with the frame during which it was issued) and periodic BLAKE3
//! checkpoints of the local player's [`FrameSnapshot`]. Loading a log with
//! [`GameRunner::load_replay`](crate::runner::GameRunner::load_replay)
//! recreates the simulation from the setup, feeds the recorded orders back in
//! before the frames they belong to and compares checkpoints as it goes.
//!
//! Orders recorded at frame `f` were issued while the simulation stood at
//! frame `f`, so they take effect during the step from `f` to `f + 1`.
//! Checkpoints hash the snapshot extracted right after that step.
//!
//! [`FrameSnapshot`]: crate::snapshot::FrameSnapshot

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use bwbridge_sim::command::Order;
use bwbridge_sim::simulation::GameSetup;
use bwbridge_sim::types::{PlayerId, Race};

use crate::BridgeError;

// ---------------------------------------------------------------------------
// ReplayLog
// ---------------------------------------------------------------------------

/// A recorded session, serializable to JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayLog {
    pub map_path: PathBuf,
    pub local_player: PlayerId,
    pub race: Race,
    pub ai_difficulty: u8,
    /// Frames stepped while recording. Playback pauses once it gets there.
    pub total_frames: u32,
    pub entries: Vec<ReplayEntry>,
}

/// One recorded fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplayEntry {
    /// An order accepted while the simulation stood at `frame`.
    Order { frame: u32, order: Order },
    /// Snapshot digest after stepping to `frame`.
    Checkpoint { frame: u32, state_hash: String },
}

impl ReplayLog {
    /// An empty log for a session created from `setup`.
    pub fn new(setup: &GameSetup) -> Self {
        Self {
            map_path: setup.map_path.clone(),
            local_player: setup.local_player,
            race: setup.race,
            ai_difficulty: setup.ai_difficulty,
            total_frames: 0,
            entries: Vec::new(),
        }
    }

    /// The setup that recreates the recorded session.
    pub fn setup(&self) -> GameSetup {
        GameSetup {
            map_path: self.map_path.clone(),
            local_player: self.local_player,
            race: self.race,
            ai_difficulty: self.ai_difficulty,
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, BridgeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let text = std::fs::read_to_string(path).map_err(|source| BridgeError::ReplayIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn save(&self, path: &Path) -> Result<(), BridgeError> {
        let text = self.to_json()?;
        std::fs::write(path, text).map_err(|source| BridgeError::ReplayIo {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), frames = self.total_frames, "replay saved");
        Ok(())
    }

    pub fn order_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, ReplayEntry::Order { .. }))
            .count()
    }

    pub fn checkpoint_count(&self) -> usize {
        self.entries.len() - self.order_count()
    }

    /// A copy without the orders issued after the last stepped frame.
    ///
    /// Orders accepted at `total_frames` would only apply on a step that
    /// never happened.
    pub fn applied(&self) -> ReplayLog {
        let total_frames = self.total_frames;
        let entries = self
            .entries
            .iter()
            .filter(|e| match e {
                ReplayEntry::Order { frame, .. } => *frame < total_frames,
                ReplayEntry::Checkpoint { .. } => true,
            })
            .cloned()
            .collect();
        ReplayLog {
            entries,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// ReplayRecorder
// ---------------------------------------------------------------------------

/// Builds a [`ReplayLog`] while a live session runs.
#[derive(Debug, Clone)]
pub struct ReplayRecorder {
    log: ReplayLog,
    /// Frames between checkpoints; 0 checkpoints every frame.
    checkpoint_interval: u32,
}

impl ReplayRecorder {
    pub fn new(setup: &GameSetup, checkpoint_interval: u32) -> Self {
        Self {
            log: ReplayLog::new(setup),
            checkpoint_interval,
        }
    }

    /// Record orders accepted while the simulation stood at `frame`.
    pub fn record_orders(&mut self, frame: u32, orders: impl IntoIterator<Item = Order>) {
        self.log.entries.extend(
            orders
                .into_iter()
                .map(|order| ReplayEntry::Order { frame, order }),
        );
    }

    /// Record that the simulation reached `frame`, checkpointing `state_hash`
    /// when the frame falls on the interval.
    pub fn record_frame(&mut self, frame: u32, state_hash: impl FnOnce() -> String) {
        self.log.total_frames = frame;
        let due = self.checkpoint_interval == 0 || frame % self.checkpoint_interval == 0;
        if due {
            self.log.entries.push(ReplayEntry::Checkpoint {
                frame,
                state_hash: state_hash(),
            });
        }
    }

    /// The log as recorded so far.
    pub fn log(&self) -> &ReplayLog {
        &self.log
    }

    /// The finished log, minus orders that never reached a step.
    pub fn finish(self) -> ReplayLog {
        let dropped = self.log.order_count();
        let log = self.log.applied();
        let dropped = dropped - log.order_count();
        if dropped > 0 {
            tracing::debug!(dropped, frame = log.total_frames, "unapplied orders dropped");
        }
        log
    }
}

// ---------------------------------------------------------------------------
// ReplayPlayback
// ---------------------------------------------------------------------------

/// Details of the first checkpoint that did not match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    pub frame: u32,
    pub expected_hash: String,
    pub actual_hash: String,
}

/// Feeds a [`ReplayLog`] back into a running session.
#[derive(Debug, Clone)]
pub struct ReplayPlayback {
    orders: BTreeMap<u32, Vec<Order>>,
    checkpoints: BTreeMap<u32, String>,
    total_frames: u32,
    divergence: Option<ReplayDivergence>,
    end_reported: bool,
}

impl ReplayPlayback {
    /// Index the log by frame.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidReplay`] if two checkpoints share a frame or an
    /// entry lies beyond `total_frames`.
    pub fn new(log: &ReplayLog) -> Result<Self, BridgeError> {
        let mut orders: BTreeMap<u32, Vec<Order>> = BTreeMap::new();
        let mut checkpoints: BTreeMap<u32, String> = BTreeMap::new();
        for entry in &log.entries {
            match entry {
                ReplayEntry::Order { frame, order } => {
                    if *frame >= log.total_frames {
                        return Err(BridgeError::InvalidReplay(format!(
                            "order at frame {frame} is never applied (log ends at {})",
                            log.total_frames
                        )));
                    }
                    orders.entry(*frame).or_default().push(order.clone());
                }
                ReplayEntry::Checkpoint { frame, state_hash } => {
                    if *frame > log.total_frames {
                        return Err(BridgeError::InvalidReplay(format!(
                            "checkpoint at frame {frame} lies beyond the end ({})",
                            log.total_frames
                        )));
                    }
                    if checkpoints.insert(*frame, state_hash.clone()).is_some() {
                        return Err(BridgeError::InvalidReplay(format!(
                            "duplicate checkpoint at frame {frame}"
                        )));
                    }
                }
            }
        }
        Ok(Self {
            orders,
            checkpoints,
            total_frames: log.total_frames,
            divergence: None,
            end_reported: false,
        })
    }

    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }

    /// Remove and return the orders recorded at `frame`, in issue order.
    pub fn take_orders(&mut self, frame: u32) -> Vec<Order> {
        self.orders.remove(&frame).unwrap_or_default()
    }

    /// Compare the snapshot digest at `frame` with the recording.
    ///
    /// Returns the divergence the first time a checkpoint mismatches and
    /// `None` afterwards.
    pub fn check(&mut self, frame: u32, actual: impl FnOnce() -> String) -> Option<ReplayDivergence> {
        if self.divergence.is_some() {
            return None;
        }
        let expected = self.checkpoints.get(&frame)?;
        let actual = actual();
        if &actual == expected {
            return None;
        }
        let divergence = ReplayDivergence {
            frame,
            expected_hash: expected.clone(),
            actual_hash: actual,
        };
        self.divergence = Some(divergence.clone());
        Some(divergence)
    }

    pub fn divergence(&self) -> Option<&ReplayDivergence> {
        self.divergence.as_ref()
    }

    /// True once `frame` has reached the end of the recording.
    pub fn is_finished(&self, frame: u32) -> bool {
        frame >= self.total_frames
    }

    /// True the first time `frame` reaches the end, false afterwards.
    pub fn take_end(&mut self, frame: u32) -> bool {
        if self.end_reported || !self.is_finished(frame) {
            return false;
        }
        self.end_reported = true;
        true
    }
}
