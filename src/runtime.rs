//! Run sessions and the orchestrator that drives every sprite's script concurrently.

use crate::collision::{detect_and_swap, CollisionPairs};
use crate::editing::clone_blocks;
use crate::flatten::{RunQueues, MAX_REPEAT};
use crate::interpreter::{Runner, Step};
use crate::model::{Block, BlockKind, BubbleKind, Script, Sprite};
use crate::scheduler::{Clock, ClockMode, Scheduler, Task};
use crate::timers::{TimerKey, Timers};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Callbacks fired while a run is in progress. Observers receive read-only snapshots.
pub trait RuntimeObserver {
    fn on_update(&mut self, _sprite: &Sprite) {}

    /// `text` is empty and `ms` zero when the bubble is dismissed.
    fn on_say(&mut self, _sprite: &Sprite, _text: &str, _ms: u64) {}

    fn on_think(&mut self, _sprite: &Sprite, _text: &str, _ms: u64) {}

    fn on_collision(&mut self, _a: &Sprite, _b: &Sprite) {}

    fn on_banner(&mut self, _text: Option<&str>) {}

    /// The simulated timeline moved forward to `now_ms`.
    fn on_clock(&mut self, _now_ms: u64) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl RuntimeObserver for NullObserver {}

/// Process-wide stop signal. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub move_delay_ms: u64,
    pub turn_delay_ms: u64,
    pub goto_delay_ms: u64,
    pub max_repeat: u32,
    pub flash_ms: u64,
    pub banner_ms: u64,
    pub clock: ClockMode,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            move_delay_ms: 250,
            turn_delay_ms: 150,
            goto_delay_ms: 250,
            max_repeat: MAX_REPEAT,
            flash_ms: 300,
            banner_ms: 3000,
            clock: ClockMode::Virtual,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub elapsed_ms: u64,
    /// Sprite names of every swapped pair, in detection order.
    pub collisions: Vec<(String, String)>,
    pub stopped: bool,
    pub blocks_executed: usize,
}

pub fn collision_banner(a: &Sprite, b: &Sprite) -> String {
    format!("Collision! {} ↔ {} - Animations swapped!", a.name, b.name)
}

/// State shared by every runner of one run: working sprites, run queues, the pair set, the
/// scheduler and the session's timers.
pub struct Session<'o> {
    sprites: Vec<Sprite>,
    queues: RunQueues,
    pairs: CollisionPairs,
    timers: Timers,
    scheduler: Scheduler,
    clock: Box<dyn Clock>,
    banner: Option<String>,
    config: RuntimeConfig,
    stop: StopToken,
    observer: &'o mut dyn RuntimeObserver,
    collisions: Vec<(String, String)>,
    blocks_executed: usize,
    stop_logged: bool,
    finished: HashSet<usize>,
}

impl<'o> Session<'o> {
    pub fn new(
        sprites: Vec<Sprite>,
        config: RuntimeConfig,
        stop: StopToken,
        observer: &'o mut dyn RuntimeObserver,
    ) -> Self {
        let clock = config.clock.clock();
        Self {
            sprites,
            queues: RunQueues::new(),
            pairs: CollisionPairs::new(),
            timers: Timers::new(),
            scheduler: Scheduler::new(),
            clock,
            banner: None,
            config,
            stop,
            observer,
            collisions: Vec::new(),
            blocks_executed: 0,
            stop_logged: false,
            finished: HashSet::new(),
        }
    }

    pub fn sprites(&self) -> &[Sprite] {
        &self.sprites
    }

    pub fn sprite(&self, idx: usize) -> &Sprite {
        &self.sprites[idx]
    }

    pub fn queues(&self) -> &RunQueues {
        &self.queues
    }

    pub fn now_ms(&self) -> u64 {
        self.scheduler.now()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn should_stop(&self) -> bool {
        self.stop.is_requested()
    }

    pub fn into_sprites(self) -> Vec<Sprite> {
        self.sprites
    }

    pub fn index_of(&self, sprite_id: &str) -> Option<usize> {
        self.sprites.iter().position(|s| s.id == sprite_id)
    }

    /// Runs one runner per sprite, interleaved, until every one of them is done.
    pub fn run_all(&mut self) -> RunReport {
        info!(
            sprites = self.sprites.len(),
            clock = %self.config.clock,
            "run_started"
        );
        let mut runners = (0..self.sprites.len())
            .map(Runner::for_queue)
            .collect::<Vec<_>>();
        self.drive(&mut runners);
        self.settle();
        let report = self.report();
        info!(
            elapsed_ms = report.elapsed_ms,
            collisions = report.collisions.len(),
            blocks = report.blocks_executed,
            stopped = report.stopped,
            "run_finished"
        );
        report
    }

    /// Seeds and drains the run queue of a single sprite.
    pub fn run_sprite(&mut self, sprite_id: &str) -> Option<RunReport> {
        let idx = self.index_of(sprite_id)?;
        self.drive(&mut [Runner::for_queue(idx)]);
        Some(self.report())
    }

    /// Executes one block for one sprite, including its timed suspension.
    pub fn run_block(&mut self, sprite_id: &str, block: Block) -> Option<RunReport> {
        let idx = self.index_of(sprite_id)?;
        self.drive(&mut [Runner::for_block(idx, block)]);
        Some(self.report())
    }

    fn report(&self) -> RunReport {
        RunReport {
            elapsed_ms: self.scheduler.now(),
            collisions: self.collisions.clone(),
            stopped: self.should_stop(),
            blocks_executed: self.blocks_executed,
        }
    }

    fn drive(&mut self, runners: &mut [Runner]) {
        for idx in 0..runners.len() {
            self.scheduler.schedule(0, Task::Runner(idx));
        }
        let mut active = runners.len();
        let mut last_tick = self.scheduler.now();
        while active > 0 {
            let Some(task) = self.scheduler.next(self.clock.as_mut()) else {
                break;
            };
            let now = self.scheduler.now();
            if now != last_tick {
                last_tick = now;
                self.observer.on_clock(now);
            }
            match task {
                Task::Runner(idx) => match runners[idx].advance(self) {
                    Step::Suspend(ms) => self.scheduler.schedule(ms, Task::Runner(idx)),
                    Step::Done => active -= 1,
                },
                Task::Timer { key, generation } => self.fire_timer(key, generation),
            }
            if self.should_stop() {
                if !self.stop_logged {
                    self.stop_logged = true;
                    info!(at_ms = now, "stop_requested");
                }
                self.cancel_timers();
            }
        }
        self.cancel_timers();
    }

    /// Clears whatever transient state outlived the runners and tells the observer about it.
    fn settle(&mut self) {
        for idx in 0..self.sprites.len() {
            let sprite = &mut self.sprites[idx];
            if sprite.current_animation.is_none() && sprite.bubble.is_none() && !sprite.flash {
                continue;
            }
            sprite.clear_transient();
            self.emit_update(idx);
        }
        if self.banner.take().is_some() {
            self.observer.on_banner(None);
        }
    }

    fn cancel_timers(&mut self) {
        if self.timers.pending() == 0 {
            return;
        }
        self.timers.cancel_all();
        self.scheduler.drop_timers();
    }

    fn arm_timer(&mut self, key: TimerKey, delay_ms: u64) {
        let generation = self.timers.arm(key);
        self.scheduler
            .schedule(delay_ms, Task::Timer { key, generation });
    }

    fn fire_timer(&mut self, key: TimerKey, generation: u64) {
        if !self.timers.fire(key, generation) {
            return;
        }
        match key {
            TimerKey::Flash(idx) => {
                self.sprites[idx].flash = false;
                self.emit_update(idx);
            }
            TimerKey::Banner => {
                self.banner = None;
                self.observer.on_banner(None);
            }
        }
    }

    pub(crate) fn sprite_mut(&mut self, idx: usize) -> &mut Sprite {
        &mut self.sprites[idx]
    }

    pub(crate) fn seed_queue(&mut self, idx: usize) {
        let len = self.queues.seed(&self.sprites[idx], self.config.max_repeat);
        debug!(sprite = %self.sprites[idx].name, blocks = len, "queue_seeded");
    }

    pub(crate) fn pop_queued(&mut self, idx: usize) -> Option<Block> {
        self.queues.pop_front(&self.sprites[idx].id)
    }

    pub(crate) fn begin_block(&mut self, idx: usize, kind: BlockKind) {
        self.blocks_executed += 1;
        let sprite = &mut self.sprites[idx];
        sprite.current_animation = Some(kind);
        debug!(sprite = %sprite.name, block = %kind, "block_started");
    }

    pub(crate) fn emit_update(&mut self, idx: usize) {
        self.observer.on_update(&self.sprites[idx]);
    }

    pub(crate) fn emit_speech(&mut self, idx: usize, kind: BubbleKind, text: &str, ms: u64) {
        let sprite = &self.sprites[idx];
        match kind {
            BubbleKind::Say => self.observer.on_say(sprite, text, ms),
            BubbleKind::Think => self.observer.on_think(sprite, text, ms),
        }
    }

    /// Tail of a primitive block once its delay has elapsed.
    pub(crate) fn complete_block(&mut self, idx: usize, block: &Block) {
        if let Some(kind) = BubbleKind::for_block(block.kind) {
            self.sprites[idx].bubble = None;
            self.emit_speech(idx, kind, "", 0);
        }
        self.after_block();
    }

    /// Collision pass over the whole stage, run after every block.
    pub(crate) fn after_block(&mut self) {
        let observer = &mut *self.observer;
        let swapped = detect_and_swap(
            &mut self.sprites,
            &mut self.pairs,
            &mut self.queues,
            Some(&mut |a: &Sprite, b: &Sprite| {
                observer.on_update(a);
                observer.on_update(b);
                observer.on_collision(a, b);
            }),
            None,
        );
        for (i, j) in swapped {
            let (a, b) = (&self.sprites[i], &self.sprites[j]);
            info!(
                a = %a.name,
                b = %b.name,
                queue_a = self.queues.len_of(&a.id),
                queue_b = self.queues.len_of(&b.id),
                "collision_swap"
            );
            let banner = collision_banner(a, b);
            self.collisions.push((a.name.clone(), b.name.clone()));
            self.observer.on_banner(Some(&banner));
            self.banner = Some(banner);
            self.arm_timer(TimerKey::Flash(i), self.config.flash_ms);
            self.arm_timer(TimerKey::Flash(j), self.config.flash_ms);
            self.arm_timer(TimerKey::Banner, self.config.banner_ms);
            for idx in [i, j] {
                let queued = self.queues.len_of(&self.sprites[idx].id);
                if queued > 0 && self.finished.contains(&idx) {
                    debug!(sprite = %self.sprites[idx].name, blocks = queued, "blocks_stranded");
                }
            }
        }
    }

    /// A sprite's queue drained or its runner observed the stop signal.
    pub(crate) fn finish_sprite(&mut self, idx: usize) {
        self.finished.insert(idx);
        self.timers.disarm(TimerKey::Flash(idx));
        let sprite = &mut self.sprites[idx];
        sprite.clear_transient();
        debug!(sprite = %sprite.name, "sprite_finished");
        self.emit_update(idx);
    }
}

/// Resets the stop flag when the run ends, however it ends.
struct StopReset<'a>(&'a StopToken);

impl Drop for StopReset<'_> {
    fn drop(&mut self) {
        self.0.reset();
    }
}

#[derive(Debug, Clone, Default)]
pub struct Runtime {
    config: RuntimeConfig,
    stop: StopToken,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            stop: StopToken::new(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.request();
    }

    /// Runs every sprite's scripts concurrently on deep copies of their block trees, then
    /// copies final poses back and clears transient state on every sprite.
    pub fn run_all(&self, sprites: &mut [Sprite], observer: &mut dyn RuntimeObserver) -> RunReport {
        let _reset = StopReset(&self.stop);
        let working = sprites.iter().map(working_copy).collect::<Vec<_>>();
        let mut session = Session::new(working, self.config.clone(), self.stop.clone(), observer);
        let report = session.run_all();
        for (sprite, finished) in sprites.iter_mut().zip(session.into_sprites()) {
            sprite.x = finished.x;
            sprite.y = finished.y;
            sprite.rotation = finished.rotation;
            sprite.clear_transient();
        }
        report
    }
}

fn working_copy(sprite: &Sprite) -> Sprite {
    Sprite {
        scripts: sprite
            .scripts
            .iter()
            .map(|script| Script::new(script.id.clone(), clone_blocks(&script.blocks)))
            .collect(),
        bubble: None,
        flash: false,
        ..sprite.clone()
    }
}
