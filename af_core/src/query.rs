//! Query trees for the repository's `items.find(...)` search language.

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::errors::Error;
use crate::pattern::{PathTriple, SearchPattern, TripleSet, normalize_relative, path_file_triples};

/// Fields returned by a standard resolution query.
pub const STANDARD_FIELDS: &[&str] = &[
    "name",
    "repo",
    "path",
    "actual_md5",
    "actual_sha1",
    "size",
    "type",
    "property",
];

/// Fields needed to build a checksum manifest of a build.
pub const MANIFEST_FIELDS: &[&str] = &["name", "repo", "path", "actual_sha1"];

/// Boolean search criteria compiled from a single search pattern.
///
/// Serializes as the required conjuncts (property filters, the root guard and
/// the exclusions) next to an `$or` holding one `$and` clause per triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryTree {
    properties: Vec<(String, String)>,
    include_root: bool,
    exclusions: Vec<PathTriple>,
    alternatives: Vec<PathTriple>,
}

impl QueryTree {
    pub fn alternatives(&self) -> &[PathTriple] {
        &self.alternatives
    }

    pub fn exclusions(&self) -> &[PathTriple] {
        &self.exclusions
    }

    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    pub fn includes_root(&self) -> bool {
        self.include_root
    }

    pub fn to_json(&self) -> Value {
        let mut criteria = Map::new();

        for (key, value) in &self.properties {
            criteria.insert(format!("@{key}"), json!({ "$match": value }));
        }

        if !self.include_root {
            criteria.insert("path".to_string(), json!({ "$ne": "." }));
        }

        if !self.exclusions.is_empty() {
            let excluded: Vec<Value> = self
                .exclusions
                .iter()
                .map(|triple| {
                    json!({ "$or": [{
                        "path": { "$nmatch": triple.path },
                        "name": { "$nmatch": triple.file },
                    }] })
                })
                .collect();
            criteria.insert("$and".to_string(), Value::Array(excluded));
        }

        let alternatives: Vec<Value> = self
            .alternatives
            .iter()
            .map(|triple| json!({ "$and": [triple_clause(triple)] }))
            .collect();
        criteria.insert("$or".to_string(), Value::Array(alternatives));

        Value::Object(criteria)
    }

    /// The serialized criteria, ready to be wrapped by [`FindQuery`].
    pub fn criteria(&self) -> String {
        self.to_json().to_string()
    }
}

fn triple_clause(triple: &PathTriple) -> Value {
    let repo = if triple.repo_is_wildcard() {
        json!({ "$match": triple.repo })
    } else {
        Value::String(triple.repo.clone())
    };
    let path = if triple.path == "." {
        Value::String(triple.path.clone())
    } else {
        json!({ "$match": triple.path })
    };

    json!({
        "repo": repo,
        "path": path,
        "name": { "$match": triple.file },
    })
}

/// Compile a search pattern into a query tree.
///
/// `exclude_patterns` are relative to the repository (`a/b/*.tmp`), and
/// `properties` is a `key=value;key=value` filter.
pub fn compile<S: AsRef<str>>(
    pattern: &str,
    exclude_patterns: &[S],
    recursive: bool,
    properties: &str,
) -> Result<QueryTree, Error> {
    let search = SearchPattern::parse(pattern)?;
    let alternatives = search.triples(recursive).into_vec();
    let properties = parse_properties(properties)?;

    let mut excluded = TripleSet::default();
    for exclude in exclude_patterns {
        let normalized = normalize_relative(exclude.as_ref())?;
        path_file_triples("", &normalized, recursive, &mut excluded);
    }

    // Without recursion a root-level exclusion must still hide nested files.
    let widen_root = !alternatives.is_empty() && !recursive;
    let exclusions = excluded
        .into_iter()
        .map(|mut triple| {
            if widen_root && triple.path == "." {
                triple.path = "*".to_string();
            }
            triple
        })
        .collect();

    Ok(QueryTree {
        include_root: alternatives.is_empty() || search.includes_root(),
        properties,
        exclusions,
        alternatives,
    })
}

/// Parse a `key=value;key=value` property filter.
pub fn parse_properties(raw: &str) -> Result<Vec<(String, String)>, Error> {
    let mut properties = Vec::new();
    for pair in raw.split(';').filter(|pair| !pair.trim().is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .filter(|(key, value)| !key.trim().is_empty() && !value.contains('='))
            .ok_or_else(|| Error::InvalidProperties {
                props: raw.to_string(),
            })?;
        properties.push((key.trim().to_string(), value.to_string()));
    }
    Ok(properties)
}

/// Criteria selecting every artifact produced by a build.
pub fn build_criteria(build_name: &str, build_number: &str) -> String {
    json!({
        "artifact.module.build.name": build_name,
        "artifact.module.build.number": build_number,
    })
    .to_string()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn operator(self) -> &'static str {
        match self {
            SortOrder::Asc => "$asc",
            SortOrder::Desc => "$desc",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sort {
    pub fields: Vec<String>,
    pub order: SortOrder,
}

/// A complete `items.find(...)` request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FindQuery {
    criteria: String,
    fields: Vec<String>,
    sort: Option<Sort>,
    offset: Option<u64>,
    limit: Option<u64>,
}

impl FindQuery {
    pub fn new(criteria: impl Into<String>) -> Self {
        Self::with_fields(criteria, STANDARD_FIELDS)
    }

    pub fn with_fields(criteria: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            criteria: criteria.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            sort: None,
            offset: None,
            limit: None,
        }
    }

    /// Query for the artifacts a build produced, with the standard fields.
    pub fn for_build(build_name: &str, build_number: &str) -> Self {
        Self::new(build_criteria(build_name, build_number))
    }

    /// Query for the checksum manifest of a build.
    pub fn build_manifest(build_name: &str, build_number: &str) -> Self {
        Self::with_fields(build_criteria(build_name, build_number), MANIFEST_FIELDS)
    }

    pub fn sorted(mut self, sort: Sort) -> Self {
        if !sort.fields.is_empty() {
            self.sort = Some(sort);
        }
        self
    }

    pub fn offset(mut self, offset: Option<u64>) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn criteria(&self) -> &str {
        &self.criteria
    }

    fn include_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.fields.iter().map(String::as_str).collect();
        if let Some(sort) = &self.sort {
            // The search service refuses to sort when properties are included.
            fields.retain(|f| *f != "property");
            for field in &sort.fields {
                if !fields.contains(&field.as_str()) {
                    fields.push(field);
                }
            }
        }
        fields
    }
}

impl fmt::Display for FindQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let include: Vec<String> = self
            .include_fields()
            .iter()
            .map(|field| format!("\"{field}\""))
            .collect();
        write!(f, "items.find({}).include({})", self.criteria, include.join(","))?;

        if let Some(sort) = &self.sort {
            let mut sort_json = Map::new();
            sort_json.insert(sort.order.operator().to_string(), json!(sort.fields));
            write!(f, ".sort({})", Value::Object(sort_json))?;
        }
        if let Some(offset) = self.offset {
            write!(f, ".offset({offset})")?;
        }
        if let Some(limit) = self.limit {
            write!(f, ".limit({limit})")?;
        }
        Ok(())
    }
}
