//! Narrowing search results down to the artifacts of one build.
//!
//! The same checksum is often produced by several builds (re-uploads,
//! promotions, copies between repositories), and the search service can only
//! filter by checksum membership. Disambiguation by build identity is done
//! here.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const BUILD_NAME_PROPERTY: &str = "build.name";
const BUILD_NUMBER_PROPERTY: &str = "build.number";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// One item returned by the search service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultEntry {
    pub repo: String,
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub actual_md5: String,
    #[serde(default)]
    pub actual_sha1: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,
}

impl SearchResultEntry {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    pub fn build_name(&self) -> Option<&str> {
        self.property(BUILD_NAME_PROPERTY)
    }

    pub fn build_number(&self) -> Option<&str> {
        self.property(BUILD_NUMBER_PROPERTY)
    }

    /// Path of the item inside its repository.
    pub fn relative_path(&self) -> String {
        if self.path == "." || self.path.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.path, self.name)
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub results: Vec<SearchResultEntry>,
}

/// Ordered set of sha1 checksums belonging to one build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildManifest {
    order: Vec<String>,
    members: HashSet<String>,
}

impl BuildManifest {
    pub fn from_results(results: &[SearchResultEntry]) -> Self {
        let mut manifest = Self::default();
        for entry in results {
            manifest.insert(&entry.actual_sha1);
        }
        manifest
    }

    pub fn insert(&mut self, sha1: &str) -> bool {
        if sha1.is_empty() || !self.members.insert(sha1.to_string()) {
            return false;
        }
        self.order.push(sha1.to_string());
        true
    }

    pub fn contains(&self, sha1: &str) -> bool {
        self.members.contains(sha1)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

#[derive(Default)]
struct Tiers {
    exact: HashMap<String, Vec<SearchResultEntry>>,
    same_name: HashMap<String, Vec<SearchResultEntry>>,
    any_build: HashMap<String, Vec<SearchResultEntry>>,
}

/// Keep the results that best match `build_name`/`build_number`.
///
/// For every checksum of the manifest, in manifest order, the entries produced
/// by the exact build win over entries from other runs of the same build,
/// which win over entries from any other build. Results whose checksum is not
/// in the manifest are dropped. An empty manifest means the build is unknown
/// and the results are returned unchanged.
pub fn filter_by_build(
    results: Vec<SearchResultEntry>,
    manifest: &BuildManifest,
    build_name: &str,
    build_number: &str,
) -> Vec<SearchResultEntry> {
    if manifest.is_empty() {
        warn!(
            build = %format!("{build_name}/{build_number}"),
            "No artifacts found for build, skipping build filtering"
        );
        return results;
    }

    let mut tiers = Tiers::default();
    let mut dropped = 0usize;
    for entry in results {
        if !manifest.contains(&entry.actual_sha1) {
            dropped += 1;
            continue;
        }
        let name_matches = entry.build_name() == Some(build_name);
        let number_matches = entry.build_number() == Some(build_number);
        let tier = match (name_matches, number_matches) {
            (true, true) => &mut tiers.exact,
            (true, false) => &mut tiers.same_name,
            _ => &mut tiers.any_build,
        };
        tier.entry(entry.actual_sha1.clone()).or_default().push(entry);
    }

    if dropped > 0 {
        debug!(dropped, "Dropped results whose checksum is not part of the build");
    }

    let mut filtered = Vec::new();
    for sha1 in manifest.iter() {
        let best = tiers
            .exact
            .remove(sha1)
            .or_else(|| tiers.same_name.remove(sha1))
            .or_else(|| tiers.any_build.remove(sha1));
        if let Some(entries) = best {
            filtered.extend(entries);
        }
    }
    filtered
}
