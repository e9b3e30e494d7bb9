//! Command implementations for the artifetch CLI.
//!
//! Each submodule handles one subcommand. [`PatternArgs`] holds the search
//! options shared by all of them.

use clap::{ArgAction, Args};

use af_core::{Error, FileSpec};

pub mod download;
pub mod query;
pub mod search;

#[derive(Args, Debug, Clone)]
pub struct PatternArgs {
    /// Wildcard pattern: <repo>/<path>, e.g. libs-release/com/acme/*.jar
    pub pattern: Option<String>,

    /// Match in subdirectories too
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub recursive: bool,

    /// Only match artifacts with these properties (key=value;key=value)
    #[arg(long, default_value = "")]
    pub props: String,

    /// Only match artifacts of a build: <name>[/<number>], number may be LATEST
    #[arg(long)]
    pub build: Option<String>,

    /// Skip paths matching this pattern (repeatable)
    #[arg(long = "exclude")]
    pub exclude_patterns: Vec<String>,

    /// Sort by these fields (repeatable)
    #[arg(long)]
    pub sort_by: Vec<String>,

    /// Skip the first N results
    #[arg(long)]
    pub offset: Option<u64>,

    /// Return at most N results
    #[arg(long)]
    pub limit: Option<u64>,
}

impl PatternArgs {
    pub fn to_file_spec(&self) -> Result<FileSpec, Error> {
        let file = FileSpec {
            pattern: self.pattern.clone(),
            props: self.props.clone(),
            recursive: Some(self.recursive),
            build: self.build.clone(),
            exclude_patterns: self.exclude_patterns.clone(),
            sort_by: self.sort_by.clone(),
            offset: self.offset,
            limit: self.limit,
            ..Default::default()
        };
        file.validate()?;
        Ok(file)
    }
}
