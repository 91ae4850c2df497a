use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Motion quartet parity-ratio session")]
pub struct Args {
    /// Participant initials, used in folder and file names
    #[arg(long, default_value = "test")]
    pub participant: String,

    /// Subject number recorded in the session log
    #[arg(long, default_value_t = 99)]
    pub subject_id: u32,

    /// Monitor preset from the config file
    #[arg(long, default_value = "TseLab")]
    pub monitor: String,

    /// Shortened session for checking the setup
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Path to the session config TOML (created with defaults if missing)
    #[arg(long, default_value = "quartet.toml")]
    pub config: PathBuf,

    /// Root directory for participant data
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// TTF/OTF font for instruction screens
    #[arg(long)]
    pub font: Option<PathBuf>,
}
