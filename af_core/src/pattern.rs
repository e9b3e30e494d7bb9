//! Search pattern normalization and decomposition into path triples.
//!
//! A pattern such as `libs-*/com/acme/*.jar` is split into every
//! `(repo, path, file)` alternative the remote search has to try. A `*` may
//! stand for the end of a repository name, for several directory levels or
//! for part of a file name, so one pattern usually yields several triples.

use crate::errors::Error;

/// One repository/path/file alternative of a search pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathTriple {
    pub repo: String,
    pub path: String,
    pub file: String,
}

impl PathTriple {
    pub fn new(repo: impl Into<String>, path: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            path: path.into(),
            file: file.into(),
        }
    }

    pub fn repo_is_wildcard(&self) -> bool {
        self.repo.contains('*')
    }
}

/// Insertion-ordered set of triples.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TripleSet {
    triples: Vec<PathTriple>,
}

impl TripleSet {
    pub fn insert(&mut self, triple: PathTriple) -> bool {
        if self.triples.contains(&triple) {
            return false;
        }
        self.triples.push(triple);
        true
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathTriple> {
        self.triples.iter()
    }

    pub fn into_vec(self) -> Vec<PathTriple> {
        self.triples
    }
}

impl IntoIterator for TripleSet {
    type Item = PathTriple;
    type IntoIter = std::vec::IntoIter<PathTriple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.into_iter()
    }
}

/// A validated, normalized `repo/path/file` search pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchPattern {
    normalized: String,
}

impl SearchPattern {
    /// Validate and normalize a pattern whose first segment is a repository.
    ///
    /// A pattern without `/` searches the whole repository, a trailing `/`
    /// searches the directory, and parentheses (placeholder groups) are
    /// dropped.
    pub fn parse(pattern: &str) -> Result<Self, Error> {
        let stripped = strip_groups(pattern)?;
        if stripped.starts_with('/') {
            return Err(invalid(pattern, "missing repository name before '/'"));
        }

        let mut normalized = stripped;
        if !normalized.contains('/') {
            normalized.push('/');
        }
        if normalized.ends_with('/') {
            normalized.push('*');
        }

        Ok(Self {
            normalized: collapse_stars(&normalized),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// True when root-level files of the repository may match.
    pub fn includes_root(&self) -> bool {
        self.normalized.matches('/').count() < 2
    }

    pub fn triples(&self, recursive: bool) -> TripleSet {
        repo_path_file_triples(&self.normalized, recursive)
    }
}

/// Normalize a repository-relative pattern such as an exclude pattern.
pub fn normalize_relative(pattern: &str) -> Result<String, Error> {
    let mut normalized = strip_groups(pattern)?;
    if normalized.ends_with('/') {
        normalized.push('*');
    }
    Ok(collapse_stars(&normalized))
}

fn strip_groups(pattern: &str) -> Result<String, Error> {
    if pattern.trim().is_empty() {
        return Err(invalid(pattern, "pattern is empty"));
    }

    let mut depth = 0usize;
    let mut stripped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| invalid(pattern, "unbalanced parentheses"))?;
            }
            other => stripped.push(other),
        }
    }
    if depth != 0 {
        return Err(invalid(pattern, "unbalanced parentheses"));
    }

    Ok(stripped)
}

fn collapse_stars(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c == '*' && out.ends_with('*') {
            continue;
        }
        out.push(c);
    }
    out
}

fn invalid(pattern: &str, reason: &str) -> Error {
    Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    }
}

/// Expand a normalized `repo/path/file` pattern into its triples.
///
/// When the repository segment contains `*`, each such `*` is tried as the
/// boundary between repository name and path. The `*` stays on both sides so
/// that it can still absorb characters of either. A `*` directly before the
/// first `/` may also end the repository name exactly.
pub fn repo_path_file_triples(pattern: &str, recursive: bool) -> TripleSet {
    let mut triples = TripleSet::default();
    let first_slash = pattern.find('/');
    let repo_end = first_slash.unwrap_or(pattern.len());
    let repo_stars: Vec<usize> = pattern[..repo_end]
        .match_indices('*')
        .map(|(at, _)| at)
        .collect();

    let Some(&last_star) = repo_stars.last() else {
        let (repo, rest) = match first_slash {
            Some(slash) => (&pattern[..slash], &pattern[slash + 1..]),
            None => (pattern, "*"),
        };
        path_file_triples(repo, rest, recursive, &mut triples);
        return triples;
    };

    for &star in &repo_stars {
        let repo = &pattern[..=star];
        if pattern[star + 1..].starts_with('/') {
            path_file_triples(repo, &pattern[star + 2..], recursive, &mut triples);
        }
        path_file_triples(repo, &pattern[star..], recursive, &mut triples);
    }

    // Literal characters after the last repository star pin the repo name.
    match first_slash {
        Some(slash) if last_star + 1 < slash => {
            path_file_triples(&pattern[..slash], &pattern[slash + 1..], recursive, &mut triples);
        }
        None if !pattern.ends_with('*') => {
            triples.insert(PathTriple::new(pattern, "*", "*"));
        }
        _ => {}
    }

    triples
}

/// Decompose a path+file glob inside one repository.
pub fn path_file_triples(repo: &str, glob: &str, recursive: bool, triples: &mut TripleSet) {
    if glob == "*" {
        let path = if recursive { "*" } else { "." };
        triples.insert(PathTriple::new(repo, path, "*"));
        return;
    }

    let (path, name) = match glob.rfind('/') {
        Some(slash) => {
            let (path, name) = (&glob[..slash], &glob[slash + 1..]);
            triples.insert(PathTriple::new(repo, path, name));
            (path, name)
        }
        None => {
            // A leading star already covers the root through the `*/` expansion.
            if !(recursive && glob.starts_with('*')) {
                triples.insert(PathTriple::new(repo, ".", glob));
            }
            ("", glob)
        }
    };

    if !recursive {
        return;
    }

    if name == "*" {
        triples.insert(PathTriple::new(repo, format!("{path}/*"), "*"));
        return;
    }

    let dir_prefix = if path.is_empty() || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    };
    for (star, _) in name.match_indices('*') {
        let (extra_dirs, rest) = name.split_at(star + 1);
        triples.insert(PathTriple::new(
            repo,
            format!("{dir_prefix}{extra_dirs}"),
            format!("*{rest}"),
        ));
    }
}
