//! Block interpreter.
//!
//! A [`Runner`] executes blocks for one sprite as an explicit frame stack so that it can
//! hand control back to the scheduler at every timed suspension and pick up where it left
//! off on the next wakeup.

use crate::flatten::loop_count;
use crate::model::{Block, BlockKind, Bubble, BubbleKind, Params};
use crate::runtime::{RuntimeConfig, Session};

/// Outcome of advancing a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Resume after this many milliseconds.
    Suspend(u64),
    Done,
}

/// Block parameters read into concrete values, with malformed entries already replaced by
/// their defaults.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Move { steps: f64 },
    Turn { degrees: f64 },
    Goto { x: Option<f64>, y: Option<f64> },
    Repeat { times: u32 },
    Speak { kind: BubbleKind, text: String, ms: u64 },
}

impl Action {
    pub fn decode(block: &Block, config: &RuntimeConfig) -> Self {
        let params = &block.params;
        match block.kind {
            BlockKind::Move => Action::Move {
                steps: params.number_or("steps", 20.0),
            },
            BlockKind::Turn => Action::Turn {
                degrees: params.number_or("degrees", 90.0),
            },
            BlockKind::Goto => Action::Goto {
                x: params.number("x"),
                y: params.number("y"),
            },
            BlockKind::Repeat => Action::Repeat {
                times: loop_count(params, config.max_repeat),
            },
            BlockKind::Say => Action::speak(BubbleKind::Say, params),
            BlockKind::Think => Action::speak(BubbleKind::Think, params),
        }
    }

    fn speak(kind: BubbleKind, params: &Params) -> Self {
        let seconds = params.number_or("seconds", 1.0);
        Action::Speak {
            kind,
            text: params.text_or("text", ""),
            ms: (seconds * 1000.0).max(0.0).round() as u64,
        }
    }
}

#[derive(Debug)]
enum Source {
    /// Drain the sprite's shared run queue, seeding it on first use.
    Queue { seeded: bool },
    /// Run a single block, then stop.
    Once(Option<Block>),
}

#[derive(Debug)]
enum Frame {
    /// A primitive block whose delay is elapsing.
    Pending(Block),
    Loop(LoopFrame),
}

#[derive(Debug)]
struct LoopFrame {
    body: Vec<Block>,
    times: u32,
    iteration: u32,
    next: usize,
}

impl LoopFrame {
    fn new(body: Vec<Block>, times: u32) -> Self {
        Self {
            body,
            times,
            iteration: 0,
            next: 0,
        }
    }

    fn next_child(&mut self) -> Option<Block> {
        if self.body.is_empty() {
            return None;
        }
        while self.iteration < self.times {
            if let Some(child) = self.body.get(self.next) {
                self.next += 1;
                return Some(child.clone());
            }
            self.next = 0;
            self.iteration += 1;
        }
        None
    }
}

#[derive(Debug)]
pub struct Runner {
    sprite: usize,
    source: Source,
    frames: Vec<Frame>,
}

impl Runner {
    /// Script runner: drains the sprite's run queue until it is empty or a stop is requested.
    pub fn for_queue(sprite: usize) -> Self {
        Self {
            sprite,
            source: Source::Queue { seeded: false },
            frames: Vec::new(),
        }
    }

    pub fn for_block(sprite: usize, block: Block) -> Self {
        Self {
            sprite,
            source: Source::Once(Some(block)),
            frames: Vec::new(),
        }
    }

    pub fn sprite(&self) -> usize {
        self.sprite
    }

    /// Runs until the next suspension point or until there is nothing left to do.
    pub fn advance(&mut self, session: &mut Session<'_>) -> Step {
        loop {
            match self.frames.pop() {
                Some(Frame::Pending(block)) => session.complete_block(self.sprite, &block),
                Some(Frame::Loop(mut frame)) => {
                    if session.should_stop() {
                        continue;
                    }
                    match frame.next_child() {
                        Some(child) => {
                            self.frames.push(Frame::Loop(frame));
                            if let Some(delay) = self.start(child, session) {
                                return Step::Suspend(delay);
                            }
                        }
                        None => session.after_block(),
                    }
                }
                None => match self.next_block(session) {
                    Some(block) => {
                        if let Some(delay) = self.start(block, session) {
                            return Step::Suspend(delay);
                        }
                    }
                    None => {
                        if matches!(self.source, Source::Queue { .. }) {
                            session.finish_sprite(self.sprite);
                        }
                        return Step::Done;
                    }
                },
            }
        }
    }

    fn next_block(&mut self, session: &mut Session<'_>) -> Option<Block> {
        match &mut self.source {
            Source::Once(block) => block.take(),
            Source::Queue { seeded } => {
                if !*seeded {
                    *seeded = true;
                    session.seed_queue(self.sprite);
                }
                if session.should_stop() {
                    return None;
                }
                session.pop_queued(self.sprite)
            }
        }
    }

    /// Begins `block`. Returns the delay to suspend for, or `None` when control stays with
    /// this runner.
    fn start(&mut self, block: Block, session: &mut Session<'_>) -> Option<u64> {
        if session.should_stop() {
            return None;
        }
        let idx = self.sprite;
        session.begin_block(idx, block.kind);
        let config = session.config();
        let (move_ms, turn_ms, goto_ms) = (
            config.move_delay_ms,
            config.turn_delay_ms,
            config.goto_delay_ms,
        );

        match Action::decode(&block, config) {
            Action::Move { steps } => {
                let sprite = session.sprite_mut(idx);
                let rad = sprite.rotation.to_radians();
                sprite.x += rad.cos() * steps;
                sprite.y += rad.sin() * steps;
                session.emit_update(idx);
                self.frames.push(Frame::Pending(block));
                Some(move_ms)
            }
            Action::Turn { degrees } => {
                let sprite = session.sprite_mut(idx);
                sprite.rotation = (sprite.rotation + degrees) % 360.0;
                session.emit_update(idx);
                self.frames.push(Frame::Pending(block));
                Some(turn_ms)
            }
            Action::Goto { x, y } => {
                let sprite = session.sprite_mut(idx);
                if let Some(x) = x {
                    sprite.x = x;
                }
                if let Some(y) = y {
                    sprite.y = y;
                }
                session.emit_update(idx);
                self.frames.push(Frame::Pending(block));
                Some(goto_ms)
            }
            Action::Repeat { times } => {
                session.emit_update(idx);
                self.frames
                    .push(Frame::Loop(LoopFrame::new(block.children, times)));
                None
            }
            Action::Speak { kind, text, ms } => {
                session.emit_update(idx);
                session.sprite_mut(idx).bubble = Some(Bubble {
                    text: text.clone(),
                    kind,
                });
                session.emit_speech(idx, kind, &text, ms);
                self.frames.push(Frame::Pending(block));
                Some(ms)
            }
        }
    }
}
