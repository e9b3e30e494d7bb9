use std::path::Path;

use console::style;
use indicatif::MultiProgress;
use tracing::debug;

use af_core::{DownloadSpec, Error, ResolverConfig};
use af_io::Resolver;

use crate::commands::PatternArgs;
use crate::display::{
    ProgressStyles, create_progress_callback, finish_progress_bars, format_local_path,
};

pub fn read_spec(path: &Path) -> Result<DownloadSpec, Error> {
    let json = std::fs::read_to_string(path).map_err(|e| Error::file_system(path, e))?;
    let spec = DownloadSpec::from_json(&json)?;
    debug!(path = %path.display(), files = spec.files.len(), "Loaded download spec");
    Ok(spec)
}

/// Single-entry spec from command-line arguments.
pub fn pattern_spec(
    pattern: &PatternArgs,
    target: Option<&str>,
    flat: bool,
    explode: bool,
    sync_deletes: bool,
) -> Result<DownloadSpec, Error> {
    let mut file = pattern.to_file_spec()?;
    file.target = target.unwrap_or_default().to_string();
    file.flat = Some(flat);
    file.explode = Some(explode);
    file.sync_deletes = Some(sync_deletes);
    Ok(DownloadSpec::single(file))
}

pub async fn run_download(
    config: ResolverConfig,
    spec: &DownloadSpec,
    show_progress: bool,
) -> Result<(), Error> {
    let working_dir = config.working_dir().to_path_buf();
    let mut resolver = Resolver::new(config);

    let bars = if show_progress {
        let (callback, bars) =
            create_progress_callback(MultiProgress::new(), ProgressStyles::default());
        resolver = resolver.with_progress(callback);
        Some(bars)
    } else {
        None
    };

    println!(
        "{} Resolving {} file spec{}...",
        style("==>").cyan().bold(),
        spec.files.len(),
        if spec.files.len() == 1 { "" } else { "s" }
    );

    let result = resolver.download(spec).await;
    if let Some(bars) = &bars {
        finish_progress_bars(bars);
    }
    let dependencies = result?;

    if dependencies.is_empty() {
        println!("Nothing to download.");
        return Ok(());
    }

    println!(
        "{} Downloaded {} artifact{}",
        style("==>").cyan().bold(),
        style(dependencies.len()).green().bold(),
        if dependencies.len() == 1 { "" } else { "s" }
    );
    for dependency in &dependencies {
        println!(
            "    {} {}",
            style("✓").green(),
            format_local_path(&dependency.local_path, &working_dir)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use af_core::PatternType;

    fn args(pattern: &str) -> PatternArgs {
        PatternArgs {
            pattern: Some(pattern.to_string()),
            recursive: true,
            props: String::new(),
            build: None,
            exclude_patterns: Vec::new(),
            sort_by: Vec::new(),
            offset: None,
            limit: None,
        }
    }

    #[test]
    fn pattern_spec_carries_flags() {
        let spec = pattern_spec(&args("libs/*.zip"), Some("out/"), true, true, true).unwrap();
        let file = &spec.files[0];
        assert_eq!(file.target, "out/");
        assert!(file.is_flat());
        assert!(file.is_explode());
        assert_eq!(file.pattern_type(), PatternType::Delete);
    }

    #[test]
    fn read_spec_parses_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("spec.json");
        std::fs::write(&path, r#"{"files":[{"pattern":"libs/a.jar","target":"out/"}]}"#).unwrap();

        let spec = read_spec(&path).unwrap();
        assert_eq!(spec.files.len(), 1);
        assert_eq!(spec.files[0].target, "out/");
    }

    #[test]
    fn read_spec_missing_file_is_a_file_system_error() {
        let err = read_spec(Path::new("/nonexistent/spec.json")).unwrap_err();
        assert!(matches!(err, Error::FileSystem { .. }));
    }
}
