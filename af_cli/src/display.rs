//! Display utilities for progress bars and formatting helpers.

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use af_core::SearchResultEntry;
use af_io::{DownloadProgress, ProgressCallback};

pub type ProgressBars = Arc<Mutex<HashMap<String, ProgressBar>>>;

/// Progress styles used while downloading. Downloads report no byte
/// progress, so files in flight are shown as spinners.
pub struct ProgressStyles {
    pub spinner: ProgressStyle,
    pub done: ProgressStyle,
}

impl Default for ProgressStyles {
    fn default() -> Self {
        Self {
            spinner: ProgressStyle::default_spinner()
                .template("    {prefix:<24} {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
            done: ProgressStyle::default_spinner()
                .template("    {prefix:<24} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        }
    }
}

/// Create a progress callback that keeps one bar per file being fetched.
pub fn create_progress_callback(
    multi: MultiProgress,
    styles: ProgressStyles,
) -> (ProgressCallback, ProgressBars) {
    let bars: ProgressBars = Arc::new(Mutex::new(HashMap::new()));

    let bars_clone = bars.clone();
    let ProgressStyles {
        spinner: spinner_style,
        done: done_style,
    } = styles;

    let callback: ProgressCallback = Arc::new(move |event| {
        let Ok(mut bars) = bars_clone.lock() else {
            return;
        };
        match event {
            DownloadProgress::Started { url, total_bytes } => {
                let pb = multi.add(ProgressBar::new_spinner());
                pb.set_style(spinner_style.clone());
                pb.set_message(match total_bytes {
                    Some(total) => format!("downloading {}...", format_bytes(total)),
                    None => "downloading...".to_string(),
                });
                pb.enable_steady_tick(Duration::from_millis(80));
                pb.set_prefix(file_name(&url).to_string());
                bars.insert(url, pb);
            }
            DownloadProgress::Completed { url, .. } => {
                if let Some(pb) = bars.get(&url) {
                    pb.set_style(done_style.clone());
                    pb.set_message(format!("{} downloaded", style("✓").green()));
                    pb.finish();
                }
            }
            DownloadProgress::CacheHit { path } => {
                let _ = multi.println(format!(
                    "    {:<24} {} up to date",
                    file_name(&path.to_string_lossy()),
                    style("✓").green()
                ));
            }
            DownloadProgress::Deleted { path } => {
                let _ = multi.println(format!(
                    "    {} removed {}",
                    style("-").red(),
                    path.display()
                ));
            }
            DownloadProgress::Skipped { .. } => {}
        }
    });

    (callback, bars)
}

/// Finish any remaining progress bars, e.g. after a failed download.
pub fn finish_progress_bars(bars: &ProgressBars) {
    let Ok(bars) = bars.lock() else {
        return;
    };
    for pb in bars.values() {
        if !pb.is_finished() {
            pb.abandon();
        }
    }
}

fn file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

/// Format bytes into a human-readable string (e.g., "1.5 GB").
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// `repo/path/name  (size)` for one search hit.
pub fn format_search_entry(entry: &SearchResultEntry) -> String {
    format!(
        "{}/{}  {}",
        entry.repo,
        entry.relative_path(),
        style(format!("({})", format_bytes(entry.size))).dim()
    )
}

/// `path` relative to `working_dir` when it lies inside it.
pub fn format_local_path(path: &Path, working_dir: &Path) -> String {
    path.strip_prefix(working_dir)
        .unwrap_or(path)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 bytes");
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("http://host/libs/com/a.jar"), "a.jar");
        assert_eq!(file_name("a.jar"), "a.jar");
        assert_eq!(file_name("libs/dir/"), "dir");
    }

    #[test]
    fn test_format_search_entry() {
        console::set_colors_enabled(false);
        let entry = SearchResultEntry {
            repo: "libs".to_string(),
            path: "com/acme".to_string(),
            name: "a.jar".to_string(),
            size: 2048,
            ..Default::default()
        };
        assert_eq!(format_search_entry(&entry), "libs/com/acme/a.jar  (2.0 KB)");
    }

    #[test]
    fn test_format_local_path() {
        let work = PathBuf::from("/work");
        assert_eq!(
            format_local_path(Path::new("/work/out/a.jar"), &work),
            "out/a.jar"
        );
        assert_eq!(format_local_path(Path::new("/elsewhere/a.jar"), &work), "/elsewhere/a.jar");
    }

    #[test]
    fn test_progress_callback_tracks_bars() {
        let multi = MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        let (callback, bars) = create_progress_callback(multi, ProgressStyles::default());

        callback(DownloadProgress::Started {
            url: "http://host/libs/a.jar".to_string(),
            total_bytes: Some(10),
        });
        assert_eq!(bars.lock().unwrap().len(), 1);

        callback(DownloadProgress::Completed {
            url: "http://host/libs/a.jar".to_string(),
            path: PathBuf::from("/work/a.jar"),
        });
        let bars = bars.lock().unwrap();
        let pb = &bars["http://host/libs/a.jar"];
        assert!(pb.is_finished());
        assert_eq!(pb.prefix(), "a.jar");
        assert!(pb.message().contains("downloaded"));
    }
}
