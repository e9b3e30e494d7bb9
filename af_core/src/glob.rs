//! Ant-style wildcard matching.
//!
//! `*` matches any run of characters (including `/`), `?` matches exactly one
//! character. Matching is a linear segment scan rather than backtracking, so
//! pathological patterns such as `*a*a*a*a*b` stay cheap.

const STAR: char = '*';
const ANY: char = '?';

/// Match `candidate` against a wildcard `pattern`.
pub fn matches(pattern: &str, candidate: &str, case_sensitive: bool) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = candidate.chars().collect();
    let same = |p: &char, c: &char| char_matches(*p, *c, case_sensitive);

    let (Some(first_star), Some(last_star)) = (
        pat.iter().position(|&c| c == STAR),
        pat.iter().rposition(|&c| c == STAR),
    ) else {
        return pat.len() == text.len() && pat.iter().zip(&text).all(|(p, c)| same(p, c));
    };

    let prefix = &pat[..first_star];
    let suffix = &pat[last_star + 1..];
    if prefix.len() + suffix.len() > text.len() {
        return false;
    }

    let (head, rest) = text.split_at(prefix.len());
    let (middle, tail) = rest.split_at(rest.len() - suffix.len());
    if !prefix.iter().zip(head).all(|(p, c)| same(p, c))
        || !suffix.iter().zip(tail).all(|(p, c)| same(p, c))
    {
        return false;
    }

    // Adjacent stars produce empty segments and collapse away here.
    let mut remaining = middle;
    for segment in pat[first_star..=last_star]
        .split(|&c| c == STAR)
        .filter(|segment| !segment.is_empty())
    {
        match find_segment(remaining, segment, case_sensitive) {
            Some(at) => remaining = &remaining[at + segment.len()..],
            None => return false,
        }
    }

    true
}

fn find_segment(haystack: &[char], segment: &[char], case_sensitive: bool) -> Option<usize> {
    if segment.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - segment.len()).find(|&start| {
        segment
            .iter()
            .zip(&haystack[start..])
            .all(|(p, c)| char_matches(*p, *c, case_sensitive))
    })
}

fn char_matches(pattern: char, candidate: char, case_sensitive: bool) -> bool {
    if pattern == ANY || pattern == candidate {
        return true;
    }
    !case_sensitive && pattern.to_uppercase().eq(candidate.to_uppercase())
}

/// Returns true when `path` is filtered out by the include/exclude lists.
///
/// An empty include list includes everything and an empty exclude list
/// excludes nothing. Blank patterns are ignored and matching is
/// case-insensitive.
pub fn path_conflicts<S: AsRef<str>>(path: &str, includes: &[S], excludes: &[S]) -> bool {
    !is_path_included(path, includes) || is_path_excluded(path, excludes)
}

fn is_path_included<S: AsRef<str>>(path: &str, includes: &[S]) -> bool {
    includes.is_empty() || any_pattern_matches(path, includes)
}

fn is_path_excluded<S: AsRef<str>>(path: &str, excludes: &[S]) -> bool {
    !excludes.is_empty() && any_pattern_matches(path, excludes)
}

fn any_pattern_matches<S: AsRef<str>>(path: &str, patterns: &[S]) -> bool {
    patterns
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !p.trim().is_empty())
        .any(|p| matches(p, path, false))
}

/// Include and exclude pattern lists, usually read from comma-separated
/// configuration values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IncludeExcludePatterns {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

impl IncludeExcludePatterns {
    pub fn parse(includes: &str, excludes: &str) -> Self {
        Self {
            includes: split_patterns(includes),
            excludes: split_patterns(excludes),
        }
    }

    pub fn conflicts(&self, path: &str) -> bool {
        path_conflicts(path, &self.includes, &self.excludes)
    }
}

fn split_patterns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
