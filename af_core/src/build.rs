//! Build identifiers of the form `name/number`.

use std::fmt;

use crate::errors::Error;

const DELIMITER: char = '/';
const ESCAPE: char = '\\';

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildNumber {
    /// The most recent run of the build.
    Latest,
    /// The most recent run promoted with the `RELEASED` status.
    LastRelease,
    Exact(String),
}

impl BuildNumber {
    pub fn is_symbolic(&self) -> bool {
        !matches!(self, BuildNumber::Exact(_))
    }
}

impl fmt::Display for BuildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildNumber::Latest => write!(f, "LATEST"),
            BuildNumber::LastRelease => write!(f, "LAST_RELEASE"),
            BuildNumber::Exact(number) => write!(f, "{number}"),
        }
    }
}

/// A build name plus number. Slashes inside either part are written `\/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildRef {
    pub name: String,
    pub number: BuildNumber,
}

impl BuildRef {
    pub fn parse(build: &str) -> Result<Self, Error> {
        if build.trim().is_empty() {
            return Err(invalid(build, "build name is empty"));
        }

        // The separator is the last slash that is not escaped.
        let separator = build
            .rmatch_indices(DELIMITER)
            .map(|(at, _)| at)
            .find(|&at| !build[..at].ends_with(ESCAPE));

        let Some(at) = separator else {
            return Ok(Self {
                name: unescape(build),
                number: BuildNumber::Latest,
            });
        };

        let name = unescape(&build[..at]);
        let number = unescape(&build[at + 1..]);
        if name.trim().is_empty() {
            return Err(invalid(build, "build name is empty"));
        }

        let number = match number.trim() {
            "" => return Err(invalid(build, "build number is empty")),
            "LATEST" => BuildNumber::Latest,
            "LAST_RELEASE" => BuildNumber::LastRelease,
            _ => BuildNumber::Exact(number),
        };

        Ok(Self { name, number })
    }

    pub fn exact(name: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number: BuildNumber::Exact(number.into()),
        }
    }

    /// Message logged when the build cannot be found remotely.
    pub fn not_found_message(&self) -> String {
        let status = if self.number == BuildNumber::LastRelease {
            " with the status RELEASED"
        } else {
            ""
        };
        format!("The build name {}{} could not be found.", self.name, status)
    }
}

impl fmt::Display for BuildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.number)
    }
}

fn unescape(part: &str) -> String {
    part.replace("\\/", "/")
}

fn invalid(build: &str, reason: &str) -> Error {
    Error::InvalidBuild {
        build: build.to_string(),
        reason: reason.to_string(),
    }
}
