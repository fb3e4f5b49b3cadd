use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "policy-scout")]
#[command(about = "Finds privacy, terms, cookie and legal links on a page and summarizes them")]
#[command(version)]
pub struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a page, detect its policy links and request a summary
    Analyze {
        /// Address of the page to analyze
        url: String,

        /// Read the page source from this file instead of loading it through WebDriver
        #[arg(long)]
        html_file: Option<PathBuf>,

        /// Start the detector with the page instead of letting the popup inject it
        #[arg(long, default_value_t = false)]
        preinstalled: bool,
    },

    /// Print the last persisted summary
    Show,
}
