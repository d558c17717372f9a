use crate::model::{format_num, BlockKind, Bubble, Sprite};
use crate::runtime::RuntimeObserver;
use serde_json::{json, Value};

/// Pose and transient state of a sprite at the moment an update was emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteSnapshot {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub current_animation: Option<BlockKind>,
    pub bubble: Option<Bubble>,
    pub flash: bool,
}

impl From<&Sprite> for SpriteSnapshot {
    fn from(sprite: &Sprite) -> Self {
        Self {
            id: sprite.id.clone(),
            name: sprite.name.clone(),
            x: sprite.x,
            y: sprite.y,
            rotation: sprite.rotation,
            current_animation: sprite.current_animation,
            bubble: sprite.bubble.clone(),
            flash: sprite.flash,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TraceKind {
    Update(SpriteSnapshot),
    Say { sprite: String, text: String, ms: u64 },
    Think { sprite: String, text: String, ms: u64 },
    Collision { a: String, b: String },
    Banner(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    pub at_ms: u64,
    pub kind: TraceKind,
}

/// Observer that records every callback against the simulated timeline.
#[derive(Debug, Clone, Default)]
pub struct TraceRecorder {
    now: u64,
    events: Vec<TraceEvent>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn updates_for<'a>(&'a self, sprite_id: &'a str) -> impl Iterator<Item = &'a SpriteSnapshot> {
        self.events.iter().filter_map(move |event| match &event.kind {
            TraceKind::Update(snapshot) if snapshot.id == sprite_id => Some(snapshot),
            _ => None,
        })
    }

    /// Sprite ids of every collision, in the order they were reported.
    pub fn collisions(&self) -> Vec<(String, String)> {
        self.events
            .iter()
            .filter_map(|event| match &event.kind {
                TraceKind::Collision { a, b } => Some((a.clone(), b.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.events.iter().map(event_json).collect())
    }

    fn push(&mut self, kind: TraceKind) {
        self.events.push(TraceEvent {
            at_ms: self.now,
            kind,
        });
    }
}

impl RuntimeObserver for TraceRecorder {
    fn on_update(&mut self, sprite: &Sprite) {
        self.push(TraceKind::Update(sprite.into()));
    }

    fn on_say(&mut self, sprite: &Sprite, text: &str, ms: u64) {
        self.push(TraceKind::Say {
            sprite: sprite.id.clone(),
            text: text.to_string(),
            ms,
        });
    }

    fn on_think(&mut self, sprite: &Sprite, text: &str, ms: u64) {
        self.push(TraceKind::Think {
            sprite: sprite.id.clone(),
            text: text.to_string(),
            ms,
        });
    }

    fn on_collision(&mut self, a: &Sprite, b: &Sprite) {
        self.push(TraceKind::Collision {
            a: a.id.clone(),
            b: b.id.clone(),
        });
    }

    fn on_banner(&mut self, text: Option<&str>) {
        self.push(TraceKind::Banner(text.map(str::to_string)));
    }

    fn on_clock(&mut self, now_ms: u64) {
        self.now = now_ms;
    }
}

fn event_json(event: &TraceEvent) -> Value {
    let mut out = match &event.kind {
        TraceKind::Update(s) => json!({
            "event": "update",
            "sprite": s.id,
            "name": s.name,
            "x": format_num(s.x),
            "y": format_num(s.y),
            "rotation": format_num(s.rotation),
            "animation": s.current_animation.map(BlockKind::as_str),
            "bubble": s.bubble.as_ref().map(|b| json!({ "text": b.text, "kind": b.kind.as_str() })),
            "flash": s.flash,
        }),
        TraceKind::Say { sprite, text, ms } => json!({
            "event": "say",
            "sprite": sprite,
            "text": text,
            "ms": ms,
        }),
        TraceKind::Think { sprite, text, ms } => json!({
            "event": "think",
            "sprite": sprite,
            "text": text,
            "ms": ms,
        }),
        TraceKind::Collision { a, b } => json!({
            "event": "collision",
            "a": a,
            "b": b,
        }),
        TraceKind::Banner(text) => json!({
            "event": "banner",
            "text": text,
        }),
    };
    if let Some(obj) = out.as_object_mut() {
        obj.insert("at_ms".to_string(), json!(event.at_ms));
    }
    out
}
