use clap::Parser;
use std::path::PathBuf;

// Build version with target info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Images: image 0.25 (png, jpeg, gif, webp)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Looping banner carousel, run headless against a simulated surface
#[derive(Parser, Debug, Clone)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Banner feed JSON (HeadTitle / TagData / DraftData)
    #[arg(value_name = "FEED")]
    pub feed: PathBuf,

    /// Tag to show (default: the tag with the lowest sort order)
    #[arg(short = 't', long = "tag", value_name = "TAG")]
    pub tag: Option<String>,

    /// How long to run, in simulated seconds
    #[arg(short = 's', long = "seconds", value_name = "N", default_value_t = 30.0)]
    pub seconds: f64,

    /// Scripted user drag: at time AT (seconds) drag to physical page PAGE.
    /// Can be given multiple times.
    #[arg(short = 'd', long = "drag", value_names = ["AT", "PAGE"], num_args = 2)]
    pub drags: Vec<f64>,

    /// Simulate an OS memory warning at the given time (seconds)
    #[arg(long = "memory-warning", value_name = "AT")]
    pub memory_warning: Option<f64>,

    /// Enable debug logging to file (default: bannerloop.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Fetch worker threads (overrides settings; 0 = auto)
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,
}

impl Args {
    /// `--drag AT PAGE` pairs, sorted by time
    pub fn drag_script(&self) -> Vec<(f64, usize)> {
        let mut script: Vec<(f64, usize)> = self
            .drags
            .chunks_exact(2)
            .filter(|pair| pair[0].is_finite() && pair[1] >= 0.0)
            .map(|pair| (pair[0].max(0.0), pair[1] as usize))
            .collect();
        script.sort_by(|a, b| a.0.total_cmp(&b.0));
        script
    }
}
