use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "blockstage-rs",
    about = "Run block-based sprite scripts with collision-driven animation swapping."
)]
pub struct Args {
    #[arg(
        value_name = "INPUT",
        help = "Project JSON file. Runs the built-in demo project when omitted."
    )]
    pub input: Option<PathBuf>,

    #[arg(long, help = "Print the full event trace as JSON instead of the summary.")]
    pub trace: bool,

    #[arg(long, help = "Print the final sprite poses and collisions (default).")]
    pub summary: bool,

    #[arg(long, value_name = "PATH", help = "Also write the event trace JSON to this path.")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Sleep through every delay instead of simulating the timeline.")]
    pub realtime: bool,

    #[arg(long, value_name = "MS", help = "Delay after each move block (default 250).")]
    pub move_ms: Option<u64>,

    #[arg(long, value_name = "MS", help = "Delay after each turn block (default 150).")]
    pub turn_ms: Option<u64>,

    #[arg(long, value_name = "MS", help = "Delay after each goto block (default 250).")]
    pub goto_ms: Option<u64>,

    #[arg(long, value_name = "MS", help = "How long sprites flash after a collision (default 300).")]
    pub flash_ms: Option<u64>,

    #[arg(long, value_name = "MS", help = "How long the collision banner stays up (default 3000).")]
    pub banner_ms: Option<u64>,

    #[arg(long, value_name = "N", help = "Upper bound for repeat counts (default 50).")]
    pub max_repeat: Option<u32>,
}
