//! Tick scheduler, match handles and the registry of running matches

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{tick_delta, Timer, DEFAULT_SIMULATION_TPS, DEFAULT_SNAPSHOT_TPS};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::r#match::Match;
use super::snapshot::{MatchSnapshot, SnapshotBuilder};
use super::state::{MatchOutcome, MatchStatus, PlayerId};
use super::stats::StatsSink;
use super::{PlayerInput, TickInput};

/// How long a finished match stays queryable
pub const RETAIN_FINISHED: Duration = Duration::from_secs(60);

/// Scheduler rates for a running match
#[derive(Debug, Clone, Copy)]
pub struct RunnerSettings {
    pub simulation_tps: u32,
    pub snapshot_tps: u32,
}

impl RunnerSettings {
    pub fn tick_delta(&self) -> Duration {
        tick_delta(self.simulation_tps)
    }

    /// Ticks between snapshot broadcasts
    pub fn snapshot_interval(&self) -> u32 {
        (self.simulation_tps / self.snapshot_tps.max(1)).max(1)
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            simulation_tps: DEFAULT_SIMULATION_TPS,
            snapshot_tps: DEFAULT_SNAPSHOT_TPS,
        }
    }
}

/// Handle to a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub event_tx: broadcast::Sender<ServerMsg>,
    abort_tx: mpsc::Sender<String>,
    latest: Arc<RwLock<MatchSnapshot>>,
    players: Arc<Vec<PlayerId>>,
}

impl MatchHandle {
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn has_player(&self, id: &PlayerId) -> bool {
        self.players.contains(id)
    }

    /// Last committed snapshot
    pub fn snapshot(&self) -> MatchSnapshot {
        self.latest.read().clone()
    }

    /// Ask the match to stop at the next tick boundary.
    ///
    /// Returns false if the match loop is gone or an abort is already queued.
    pub fn request_abort(&self, reason: impl Into<String>) -> bool {
        self.abort_tx.try_send(reason.into()).is_ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.event_tx.subscribe()
    }
}

/// Registry of all active matches
pub struct MatchRegistry {
    matches: DashMap<Uuid, MatchHandle>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn insert(&self, handle: MatchHandle) {
        self.matches.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.remove(id).map(|(_, h)| h)
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn total_players(&self) -> usize {
        self.matches
            .iter()
            .map(|m| m.value().player_count())
            .sum()
    }

    /// Register a match and spawn its tick loop
    pub fn launch(
        self: &Arc<Self>,
        game: Match,
        settings: RunnerSettings,
        stats_sink: Arc<dyn StatsSink>,
    ) -> MatchHandle {
        let (game_match, handle) = GameMatch::new(game, settings, stats_sink);
        self.insert(handle.clone());

        let registry = self.clone();
        let match_id = handle.id;
        tokio::spawn(async move {
            game_match.run().await;
            tokio::time::sleep(RETAIN_FINISHED).await;
            registry.remove(&match_id);
            info!(match_id = %match_id, "Match removed from registry");
        });

        handle
    }

    /// Abort every running match, used on shutdown
    pub fn abort_all(&self, reason: &str) {
        for entry in self.matches.iter() {
            entry.value().request_abort(reason);
        }
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative game match loop
pub struct GameMatch {
    game: Match,
    settings: RunnerSettings,
    input_rx: mpsc::Receiver<PlayerInput>,
    abort_rx: mpsc::Receiver<String>,
    event_tx: broadcast::Sender<ServerMsg>,
    latest: Arc<RwLock<MatchSnapshot>>,
    snapshot_builder: SnapshotBuilder,
    /// Held movement and aim, plus one-shot requests since the last tick
    pending: HashMap<PlayerId, TickInput>,
    last_seq: HashMap<PlayerId, u32>,
    stats_sink: Arc<dyn StatsSink>,
}

impl GameMatch {
    /// Wrap a started match
    pub fn new(
        game: Match,
        settings: RunnerSettings,
        stats_sink: Arc<dyn StatsSink>,
    ) -> (Self, MatchHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (abort_tx, abort_rx) = mpsc::channel(1);
        let (event_tx, _) = broadcast::channel(64);
        let latest = Arc::new(RwLock::new(MatchSnapshot::capture(game.state())));

        let handle = MatchHandle {
            id: game.state().id,
            input_tx,
            event_tx: event_tx.clone(),
            abort_tx,
            latest: latest.clone(),
            players: Arc::new(game.state().players.iter().map(|p| p.id).collect()),
        };

        let game_match = Self {
            game,
            settings,
            input_rx,
            abort_rx,
            event_tx,
            latest,
            snapshot_builder: SnapshotBuilder::new(settings.snapshot_interval()),
            pending: HashMap::new(),
            last_seq: HashMap::new(),
            stats_sink,
        };

        (game_match, handle)
    }

    /// Run the authoritative tick loop until the match ends or is aborted
    pub async fn run(mut self) {
        let match_id = self.game.state().id;
        let dt = self.settings.tick_delta();
        info!(
            match_id = %match_id,
            seed = self.game.state().seed,
            tick_ms = dt.as_secs_f32() * 1000.0,
            "Match loop running"
        );

        let mut tick_interval = interval(dt);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // Aborts only land between ticks
            if let Ok(reason) = self.abort_rx.try_recv() {
                self.abort(reason);
                break;
            }

            // Drain input queue
            self.process_inputs();

            if self.step(dt) {
                self.finish();
                break;
            }
        }
    }

    /// Run one tick, publish its snapshot when due. Returns true once the match has ended.
    fn step(&mut self, dt: Duration) -> bool {
        let timer = Timer::new();
        let inputs = self.pending.clone();
        for held in self.pending.values_mut() {
            *held = held.held();
        }
        let report = self.game.tick(dt, &inputs);
        if timer.elapsed() > dt {
            warn!(
                match_id = %self.game.state().id,
                tick = report.tick,
                elapsed = ?timer.elapsed(),
                "Tick overran its budget"
            );
        }

        let ended = !report.status.is_running();
        if ended {
            self.snapshot_builder.force_next();
        }

        let snapshot = MatchSnapshot::capture(self.game.state());
        if self.snapshot_builder.on_tick(report.events) {
            let _ = self.event_tx.send(ServerMsg::Snapshot {
                snapshot: snapshot.clone(),
                events: self.snapshot_builder.take_events(),
            });
        }
        *self.latest.write() = snapshot;

        ended
    }

    /// Fold queued client messages into the next tick's input
    fn process_inputs(&mut self) {
        while let Ok(input) = self.input_rx.try_recv() {
            match input.msg {
                ClientMsg::Input { seq, input: tick_input } => {
                    let last = self.last_seq.entry(input.player_id).or_insert(0);
                    if seq < *last {
                        debug!(
                            player_id = %input.player_id,
                            seq,
                            received_at = input.received_at,
                            "Dropping stale input"
                        );
                        continue;
                    }
                    *last = seq;
                    self.pending
                        .entry(input.player_id)
                        .or_default()
                        .merge(tick_input);
                }
                // Answered by the connection itself
                ClientMsg::Ping { .. } => {}
                ClientMsg::Leave => {
                    // A reconnect starts its sequence over
                    self.pending.remove(&input.player_id);
                    self.last_seq.remove(&input.player_id);
                    info!(
                        match_id = %self.game.state().id,
                        player_id = %input.player_id,
                        "Player left match"
                    );
                }
            }
        }
    }

    /// Discard everything pending for the next tick and end the match.
    ///
    /// Events of committed ticks still waiting for a broadcast go out first.
    fn abort(&mut self, reason: String) {
        while self.input_rx.try_recv().is_ok() {}
        self.pending.clear();

        let batched = self.snapshot_builder.take_events();
        if !batched.is_empty() {
            let _ = self.event_tx.send(ServerMsg::Snapshot {
                snapshot: self.latest.read().clone(),
                events: batched,
            });
        }

        if self.game.abort(reason.clone()) {
            *self.latest.write() = MatchSnapshot::capture(self.game.state());
            let _ = self.event_tx.send(ServerMsg::MatchAborted { reason });
        }
    }

    /// Report the outcome to subscribers and the stats sink
    fn finish(&mut self) {
        let Some(stats) = self.game.stats() else {
            return;
        };
        self.stats_sink.record(&stats);

        let winner_id = match &self.game.state().status {
            MatchStatus::Ended {
                outcome: MatchOutcome::Winner { player_id },
            } => Some(*player_id),
            _ => None,
        };
        let _ = self.event_tx.send(ServerMsg::MatchEnded { winner_id, stats });
    }
}
