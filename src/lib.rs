pub mod collision;
pub mod editing;
pub mod flatten;
pub mod ids;
pub mod interpreter;
pub mod model;
pub mod project;
pub mod runtime;
pub mod scheduler;
pub mod timers;
pub mod trace;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(all(target_arch = "wasm32", feature = "wasm-bindings"))]
pub mod wasm;

use anyhow::{Context, Result};
use ids::{IdGenerator, UuidIds};
use model::format_num;
use project::Project;
use runtime::{RunReport, Runtime, RuntimeConfig};
use scheduler::ClockMode;
use std::path::Path;
use trace::TraceRecorder;

#[cfg(not(target_arch = "wasm32"))]
pub fn run_cli(args: &cli::Args) -> Result<()> {
    if args.trace && args.summary {
        anyhow::bail!("--trace cannot be used with --summary.");
    }
    if args.realtime && args.output.is_some() {
        anyhow::bail!("--realtime cannot be used with --output.");
    }

    let total_stages = 2 + usize::from(args.output.is_some());
    let progress = CliProgress::new("Run", total_stages);
    let mut stage = 0usize;
    let mut ids = UuidIds;

    stage += 1;
    let mut project = match &args.input {
        Some(input) => {
            progress.emit(stage, "Loading project");
            load_project(input, &mut ids)?
        }
        None => {
            progress.emit(stage, "Building demo project");
            Project::demo(&mut ids)
        }
    };

    stage += 1;
    progress.emit(stage, "Running scripts");
    let runtime = Runtime::new(runtime_config(args)?);
    let mut recorder = TraceRecorder::new();
    let report = project.run(&runtime, &mut recorder);

    if let Some(output) = &args.output {
        stage += 1;
        progress.emit(stage, "Writing trace");
        let text = serde_json::to_string_pretty(&recorder.to_json())?;
        std::fs::write(output, text)
            .with_context(|| format!("failed to write trace to {}", output.display()))?;
    }

    if args.trace {
        println!("{}", serde_json::to_string_pretty(&recorder.to_json())?);
    } else {
        print!("{}", render_summary(&project, &report));
    }
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn runtime_config(args: &cli::Args) -> Result<RuntimeConfig> {
    let defaults = RuntimeConfig::default();
    let max_repeat = args.max_repeat.unwrap_or(defaults.max_repeat);
    if max_repeat == 0 {
        anyhow::bail!("--max-repeat must be at least 1.");
    }
    Ok(RuntimeConfig {
        move_delay_ms: args.move_ms.unwrap_or(defaults.move_delay_ms),
        turn_delay_ms: args.turn_ms.unwrap_or(defaults.turn_delay_ms),
        goto_delay_ms: args.goto_ms.unwrap_or(defaults.goto_delay_ms),
        max_repeat,
        flash_ms: args.flash_ms.unwrap_or(defaults.flash_ms),
        banner_ms: args.banner_ms.unwrap_or(defaults.banner_ms),
        clock: if args.realtime {
            ClockMode::Realtime
        } else {
            ClockMode::Virtual
        },
    })
}

pub fn load_project(path: &Path, ids: &mut dyn IdGenerator) -> Result<Project> {
    if !path.is_file() {
        anyhow::bail!("Input file not found: {}", pretty_path(path));
    }
    Project::load_file(path, ids).with_context(|| format!("failed to load {}", pretty_path(path)))
}

/// Runs a project given as JSON text on the virtual clock and returns the trace as JSON.
pub fn run_project_json(source: &str) -> Result<String> {
    let mut project = Project::from_json_str(source, &mut UuidIds)?;
    let mut recorder = TraceRecorder::new();
    let report = project.run(&Runtime::default(), &mut recorder);
    let out = serde_json::json!({
        "elapsed_ms": report.elapsed_ms,
        "stopped": report.stopped,
        "events": recorder.to_json(),
    });
    Ok(serde_json::to_string(&out)?)
}

pub fn render_summary(project: &Project, report: &RunReport) -> String {
    let mut out = format!(
        "Finished after {} ms ({} blocks{})\n",
        report.elapsed_ms,
        report.blocks_executed,
        if report.stopped { ", stopped" } else { "" }
    );
    for sprite in &project.sprites {
        out.push_str(&format!(
            "  {}: x={} y={} rotation={}\n",
            sprite.name,
            format_num(sprite.x),
            format_num(sprite.y),
            format_num(sprite.rotation)
        ));
    }
    if report.collisions.is_empty() {
        out.push_str("No collisions.\n");
    } else {
        for (a, b) in &report.collisions {
            out.push_str(&format!("  collision: {a} <-> {b}\n"));
        }
    }
    out
}

fn pretty_path(path: &Path) -> String {
    let s = path.display().to_string();
    if let Some(stripped) = s.strip_prefix(r"\\?\") {
        stripped.to_string()
    } else {
        s
    }
}

#[cfg(not(target_arch = "wasm32"))]
struct CliProgress {
    prefix: &'static str,
    total: usize,
}

#[cfg(not(target_arch = "wasm32"))]
impl CliProgress {
    fn new(prefix: &'static str, total: usize) -> Self {
        Self {
            prefix,
            total: total.max(1),
        }
    }

    fn emit(&self, step: usize, label: &str) {
        let step = step.clamp(1, self.total);
        let bar = render_progress_bar(step, self.total, 14);
        eprintln!(
            "[{}] {}... ({}/{}) {}",
            self.prefix, label, step, self.total, bar
        );
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    let width = width.max(1);
    let filled = ((step * width) + (total / 2)) / total;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < filled { '=' } else { '-' });
    }
    s.push(']');
    s
}
