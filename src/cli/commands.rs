//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Pipeline name, resolved as <dir>/<name>.yaml
    pub name: String,

    /// Directory containing pipeline definitions
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Free-form input text for the pipeline's context parser
    #[arg(short, long)]
    pub input: Option<String>,

    /// Context seed values (key=value), set before the run starts
    #[arg(long, value_parser = parse_key_value)]
    pub set: Vec<(String, String)>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Pipeline name, resolved as <dir>/<name>.yaml
    pub name: String,

    /// Directory containing pipeline definitions
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Print the parsed definition as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
