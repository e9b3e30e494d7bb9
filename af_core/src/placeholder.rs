//! `{n}` placeholders in download targets.
//!
//! Parentheses in a search pattern mark capture groups. For
//! `libs/(*)/(*).jar` with target `out/{1}/{2}.jar`, the artifact
//! `libs/core/app.jar` lands in `out/core/app.jar`.

use regex::Regex;

use crate::artifact::DownloadableArtifact;
use crate::errors::Error;

/// Translate a search pattern into an anchored regex, keeping parentheses as
/// capture groups.
pub fn pattern_to_regex(pattern: &str) -> Result<Regex, Error> {
    let mut expr = String::with_capacity(pattern.len() * 2 + 2);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            '(' | ')' => expr.push(c),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    if pattern.ends_with('/') {
        expr.push_str(".*");
    }
    expr.push('$');

    Regex::new(&expr).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Replace `{n}` in `target` with group `n` of the first match in `source`.
pub fn replace_placeholders(source: &str, target: &str, regex: &Regex) -> String {
    let source = source.replace('\\', "/");
    let Some(captures) = regex.captures(&source) else {
        return target.to_string();
    };

    let mut replaced = target.to_string();
    for (index, group) in captures.iter().enumerate().skip(1) {
        if let Some(group) = group {
            replaced = replaced.replace(&format!("{{{index}}}"), group.as_str());
        }
    }
    replaced
}

/// Point every artifact at its placeholder-expanded target.
///
/// A target that is empty or ends with `/` is a directory. Any other target
/// names the file: its last segment renames the download.
pub fn apply_target(
    artifacts: &mut [DownloadableArtifact],
    pattern: &str,
    target: &str,
) -> Result<(), Error> {
    let regex = pattern_to_regex(pattern)?;

    for artifact in artifacts.iter_mut() {
        let source = format!("{}/{}", artifact.repo_name(), artifact.file_path);
        let replaced = replace_placeholders(&source, target, &regex);

        if target.is_empty() || target.ends_with('/') {
            artifact.target_dir = replaced;
            continue;
        }

        let (target_dir, file_name) = replaced.rsplit_once('/').unwrap_or(("", &replaced));
        artifact.relative_path = match artifact.relative_path.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{file_name}"),
            None => file_name.to_string(),
        };
        artifact.target_dir = target_dir.to_string();
    }

    Ok(())
}
