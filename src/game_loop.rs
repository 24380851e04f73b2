//! Phase machinery shared by room runtimes: timer handles, role selection,
//! and per-player blitz bookkeeping.
//!
//! Timers never mutate state. Each armed timer is a spawned task that
//! sleeps and posts a [`RoomMsg::Timer`] back onto the owning runtime's
//! inbox, so firings are serialized with every other mutation. Arming a
//! key that is already armed cancels and replaces the old handle.

use crate::config::GameConfig;
use crate::protocol::{PlayerId, Question};
use crate::room::runtime::RoomMsg;
use rand::RngExt;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Timer identity, doubling as the fire payload. Keyed by purpose; the
/// per-player and per-item variants carry their subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Timer {
    /// Cap on the synchronized blitz round.
    Blitz,
    /// Short display window between blitz results and the hunt.
    RoundEnd,
    /// Wall-clock cap on the whole game.
    Global,
    /// Next scheduled sinkhole spawn attempt.
    SinkholeSpawn,
    /// Periodic collision-cooldown GC.
    CooldownGc,
    /// Periodic empty-room check.
    Sweep,
    /// A player's personal hunt window elapsed.
    PlayerHunt(PlayerId),
    /// A tagged player's invincibility window elapsed.
    IFrames(PlayerId),
    /// A disconnected player's grace window elapsed.
    Grace(PlayerId),
    /// A collected coin is due to respawn.
    CoinRespawn(String),
    /// A collected trap is due to respawn.
    TrapRespawn(String),
}

/// Per-room timer table. All handles are aborted on cleanup; a fire that
/// raced its cancellation is delivered as a message whose handler re-checks
/// the invariant and bails out.
#[derive(Debug)]
pub struct GameTimers {
    tx: mpsc::Sender<RoomMsg>,
    handles: HashMap<Timer, JoinHandle<()>>,
}

impl GameTimers {
    pub fn new(tx: mpsc::Sender<RoomMsg>) -> Self {
        Self {
            tx,
            handles: HashMap::new(),
        }
    }

    /// Arm `timer` to fire after `delay`, replacing any outstanding handle
    /// for the same key.
    pub fn arm(&mut self, timer: Timer, delay: Duration) {
        self.cancel(&timer);
        let tx = self.tx.clone();
        let fire = timer.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(RoomMsg::Timer(fire)).await;
        });
        self.handles.insert(timer, handle);
    }

    pub fn cancel(&mut self, timer: &Timer) {
        if let Some(handle) = self.handles.remove(timer) {
            handle.abort();
        }
    }

    /// Cancel every timer keyed to a player (hunt, i-frames, grace).
    pub fn cancel_player(&mut self, player_id: &PlayerId) {
        let keys: Vec<Timer> = self
            .handles
            .keys()
            .filter(|t| {
                matches!(t,
                    Timer::PlayerHunt(id) | Timer::IFrames(id) | Timer::Grace(id)
                        if id == player_id)
            })
            .cloned()
            .collect();
        for key in keys {
            self.cancel(&key);
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub fn armed(&self, timer: &Timer) -> bool {
        self.handles.contains_key(timer)
    }
}

impl Drop for GameTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// One player's current entry quiz.
#[derive(Debug, Clone)]
pub struct BlitzAssignment {
    pub questions: Vec<Question>,
    pub answered: usize,
    pub correct: usize,
}

impl BlitzAssignment {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            answered: 0,
            correct: 0,
        }
    }

    pub fn finished(&self) -> bool {
        self.answered >= self.questions.len()
    }

    pub fn all_correct(&self) -> bool {
        self.finished() && self.correct == self.questions.len()
    }
}

/// Pick the next hunter set.
///
/// Target count is `ceil(players * hunter_percentage)` clamped into
/// `[min_hunters, max_hunters]` and then to `players - 1` so at least one
/// survivor remains. Fairness: players who have not been hunters this
/// rotation cycle are preferred; only when that partition is exhausted does
/// the sample reach into the rest. Once everyone has served, the rotation
/// resets to the new selection.
pub fn select_hunters(
    order: &[PlayerId],
    rotation: &mut HashSet<PlayerId>,
    cfg: &GameConfig,
) -> Vec<PlayerId> {
    let n = order.len();
    if n == 0 {
        return Vec::new();
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let raw = (n as f64 * cfg.hunter_percentage).ceil() as usize;
    let target = raw
        .clamp(cfg.min_hunters, cfg.max_hunters)
        .min(n.saturating_sub(1));
    if target == 0 {
        return Vec::new();
    }

    let mut never: Vec<PlayerId> = order
        .iter()
        .filter(|id| !rotation.contains(*id))
        .copied()
        .collect();
    let mut seasoned: Vec<PlayerId> = order
        .iter()
        .filter(|id| rotation.contains(*id))
        .copied()
        .collect();

    let mut rng = rand::rng();
    shuffle(&mut never, &mut rng);
    shuffle(&mut seasoned, &mut rng);

    let chosen: Vec<PlayerId> = never
        .into_iter()
        .chain(seasoned.into_iter())
        .take(target)
        .collect();

    rotation.extend(chosen.iter().copied());
    if order.iter().all(|id| rotation.contains(id)) {
        // Everyone has served; the new cycle starts with this selection.
        rotation.clear();
        rotation.extend(chosen.iter().copied());
    }

    chosen
}

fn shuffle<T, R: RngExt>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn players(n: usize) -> Vec<PlayerId> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn hunter_count_follows_percentage_and_clamps() {
        let cfg = GameConfig::default();
        let order = players(10);
        let mut rotation = HashSet::new();
        let chosen = select_hunters(&order, &mut rotation, &cfg);
        // ceil(10 * 0.3) = 3
        assert_eq!(chosen.len(), 3);
    }

    #[test]
    fn survivor_floor_is_preserved() {
        let mut cfg = GameConfig::default();
        cfg.hunter_percentage = 1.0;
        cfg.max_hunters = 30;

        let order = players(4);
        let mut rotation = HashSet::new();
        let chosen = select_hunters(&order, &mut rotation, &cfg);
        assert_eq!(chosen.len(), 3, "at least one survivor remains");
    }

    #[test]
    fn single_player_gets_no_hunters() {
        let cfg = GameConfig::default();
        let order = players(1);
        let mut rotation = HashSet::new();
        assert!(select_hunters(&order, &mut rotation, &cfg).is_empty());
    }

    #[test]
    fn rotation_prefers_players_who_never_served() {
        let cfg = GameConfig::default();
        let order = players(10);
        let mut rotation = HashSet::new();
        let mut served: HashSet<PlayerId> = HashSet::new();

        // ceil(10 * 0.3) = 3 per round; within four rounds everyone must
        // have served before anyone repeats.
        for _ in 0..3 {
            let chosen = select_hunters(&order, &mut rotation, &cfg);
            for id in &chosen {
                assert!(
                    !served.contains(id),
                    "player selected twice before everyone served once"
                );
                served.insert(*id);
            }
        }
        // Round four: only one player has never served; the other two slots
        // come from the seasoned partition.
        let chosen = select_hunters(&order, &mut rotation, &cfg);
        let fresh: Vec<_> = chosen.iter().filter(|id| !served.contains(id)).collect();
        assert_eq!(fresh.len(), 1, "the last unserved player must be picked");
    }

    #[test]
    fn rotation_resets_after_full_cycle() {
        let mut cfg = GameConfig::default();
        cfg.hunter_percentage = 0.5;
        let order = players(2);
        let mut rotation = HashSet::new();

        let first = select_hunters(&order, &mut rotation, &cfg);
        assert_eq!(first.len(), 1);
        let second = select_hunters(&order, &mut rotation, &cfg);
        assert_eq!(second.len(), 1);
        assert_ne!(first[0], second[0], "fairness alternates the pair");

        // Both have served; the cycle resets to the latest selection, so
        // the next pick must be the player who served longest ago.
        let third = select_hunters(&order, &mut rotation, &cfg);
        assert_eq!(third[0], first[0]);
    }

    #[test]
    fn blitz_assignment_tracks_progress() {
        let questions = crate::quiz::fallback::local_pool()
            .into_iter()
            .take(3)
            .collect();
        let mut a = BlitzAssignment::new(questions);
        assert!(!a.finished());
        a.answered = 3;
        a.correct = 3;
        assert!(a.finished());
        assert!(a.all_correct());
    }

    #[tokio::test]
    async fn timer_fires_into_the_inbox() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = GameTimers::new(tx);
        timers.arm(Timer::Blitz, Duration::from_millis(10));
        assert!(timers.armed(&Timer::Blitz));

        match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
            Ok(Some(RoomMsg::Timer(Timer::Blitz))) => {}
            other => panic!("expected blitz fire, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_prevents_the_fire() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = GameTimers::new(tx);
        timers.arm(Timer::Blitz, Duration::from_millis(20));
        timers.cancel(&Timer::Blitz);

        let fired = tokio::time::timeout(Duration::from_millis(80), rx.recv()).await;
        assert!(fired.is_err(), "cancelled timer must not fire");
    }

    #[tokio::test]
    async fn cancel_player_clears_only_their_keys() {
        let (tx, _rx) = mpsc::channel(8);
        let mut timers = GameTimers::new(tx);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        timers.arm(Timer::PlayerHunt(alice), Duration::from_secs(60));
        timers.arm(Timer::IFrames(alice), Duration::from_secs(60));
        timers.arm(Timer::PlayerHunt(bob), Duration::from_secs(60));

        timers.cancel_player(&alice);
        assert!(!timers.armed(&Timer::PlayerHunt(alice)));
        assert!(!timers.armed(&Timer::IFrames(alice)));
        assert!(timers.armed(&Timer::PlayerHunt(bob)));
    }
}
