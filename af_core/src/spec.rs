//! Download spec documents: `{"files":[{...}]}`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::artifact::PatternType;
use crate::errors::Error;
use crate::query::{FindQuery, Sort, SortOrder, compile};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecType {
    Pattern,
    Aql,
    Build,
}

/// One entry of a download spec.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSpec {
    #[serde(default)]
    pub pattern: Option<String>,
    /// Raw search criteria, either `{"items.find": {...}}` or the criteria
    /// object itself.
    #[serde(default)]
    pub aql: Option<Value>,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub props: String,
    #[serde(default, deserialize_with = "flag")]
    pub recursive: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    pub flat: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    pub explode: Option<bool>,
    /// Remove local files next to the downloads that this entry did not
    /// resolve.
    #[serde(default, deserialize_with = "flag")]
    pub sync_deletes: Option<bool>,
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub sort_by: Vec<String>,
    #[serde(default)]
    pub sort_order: Option<SortOrder>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

impl FileSpec {
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            ..Default::default()
        }
    }

    pub fn spec_type(&self) -> SpecType {
        if self.aql.is_some() {
            SpecType::Aql
        } else if self.pattern.as_deref().is_some_and(|p| !p.trim().is_empty()) {
            SpecType::Pattern
        } else {
            SpecType::Build
        }
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive.unwrap_or(true)
    }

    pub fn is_flat(&self) -> bool {
        self.flat.unwrap_or(false)
    }

    pub fn is_explode(&self) -> bool {
        self.explode.unwrap_or(false)
    }

    pub fn pattern_type(&self) -> PatternType {
        if self.sync_deletes.unwrap_or(false) {
            PatternType::Delete
        } else {
            PatternType::Normal
        }
    }

    pub fn build(&self) -> Option<&str> {
        self.build.as_deref().filter(|b| !b.trim().is_empty())
    }

    pub fn sort(&self) -> Option<Sort> {
        if self.sort_by.is_empty() {
            return None;
        }
        Some(Sort {
            fields: self.sort_by.clone(),
            order: self.sort_order.unwrap_or_default(),
        })
    }

    /// The criteria object of an `aql` entry rendered as JSON text.
    pub fn aql_criteria(&self) -> Option<String> {
        let aql = self.aql.as_ref()?;
        let criteria = match aql {
            Value::String(raw) => raw.clone(),
            Value::Object(map) => match map.get("items.find") {
                Some(inner) => inner.to_string(),
                None => aql.to_string(),
            },
            other => other.to_string(),
        };
        Some(criteria)
    }

    /// Search criteria of a pattern or aql entry. Build-only entries have
    /// none until their build is looked up.
    pub fn criteria(&self) -> Result<Option<String>, Error> {
        match self.spec_type() {
            SpecType::Pattern => {
                let pattern = self.pattern.as_deref().unwrap_or_default();
                let tree = compile(pattern, &self.exclude_patterns, self.is_recursive(), &self.props)?;
                Ok(Some(tree.criteria()))
            }
            SpecType::Aql => Ok(self.aql_criteria()),
            SpecType::Build => Ok(None),
        }
    }

    /// Wrap `criteria` with this entry's sort, offset and limit.
    pub fn find_query(&self, criteria: impl Into<String>) -> FindQuery {
        let mut query = FindQuery::new(criteria).offset(self.offset).limit(self.limit);
        if let Some(sort) = self.sort() {
            query = query.sorted(sort);
        }
        query
    }

    pub fn validate(&self) -> Result<(), Error> {
        let has_pattern = self.pattern.as_deref().is_some_and(|p| !p.trim().is_empty());
        if self.pattern.is_some() && !has_pattern {
            return Err(invalid("a file spec has an empty pattern"));
        }
        if has_pattern && self.aql.is_some() {
            return Err(invalid("a file spec can have either a pattern or an aql, not both"));
        }
        if !has_pattern && self.aql.is_none() && self.build().is_none() {
            return Err(invalid("a file spec needs a pattern, an aql or a build"));
        }
        if self.sort_order.is_some() && self.sort_by.is_empty() {
            return Err(invalid("sortOrder requires sortBy"));
        }
        if self.aql.is_some() && !self.exclude_patterns.is_empty() {
            return Err(invalid("excludePatterns cannot be combined with aql"));
        }
        Ok(())
    }
}

/// A complete download spec.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct DownloadSpec {
    #[serde(default)]
    pub files: Vec<FileSpec>,
}

impl DownloadSpec {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let spec: DownloadSpec = serde_json::from_str(json).map_err(|e| Error::InvalidSpec {
            message: e.to_string(),
        })?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn single(file: FileSpec) -> Self {
        Self { files: vec![file] }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.files.is_empty() {
            return Err(invalid("the spec has no files"));
        }
        self.files.iter().try_for_each(FileSpec::validate)
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidSpec {
        message: message.to_string(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

/// Flags are accepted both as booleans and as `"true"`/`"false"` strings.
fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Flag> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Flag::Bool(b)) => Some(b),
        Some(Flag::Text(text)) => match text.trim() {
            "" => None,
            t => Some(!t.eq_ignore_ascii_case("false")),
        },
        None => None,
    })
}
