use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A Maven-style coordinate, `org:name:version`.
///
/// The `org::name:version` form marks a cross-versioned artifact whose real
/// artifact id carries the language binary version (and, when cross-building,
/// the platform suffix), e.g. `os-lib` becomes `os-lib_sjs1_3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dependency {
    pub organization: String,
    pub name: String,
    pub version: String,
    pub cross_versioned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid dependency coordinate `{input}`: {reason}")]
pub struct DependencyParseError {
    pub input: String,
    pub reason: &'static str,
}

impl Dependency {
    pub fn new(
        organization: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            name: name.into(),
            version: version.into(),
            cross_versioned: false,
        }
    }

    pub fn cross_versioned(mut self) -> Self {
        self.cross_versioned = true;
        self
    }

    /// Artifact id as published in a repository.
    pub fn artifact_id(&self, binary_version: &str, platform_suffix: Option<&str>) -> String {
        if !self.cross_versioned {
            return self.name.clone();
        }
        match platform_suffix {
            Some(platform) => format!("{}_{platform}_{binary_version}", self.name),
            None => format!("{}_{binary_version}", self.name),
        }
    }
}

impl FromStr for Dependency {
    type Err = DependencyParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let err = |reason| DependencyParseError {
            input: input.to_string(),
            reason,
        };
        let trimmed = input.trim();
        let (organization, rest, cross_versioned) = match trimmed.split_once("::") {
            Some((org, rest)) => (org, rest, true),
            None => match trimmed.split_once(':') {
                Some((org, rest)) => (org, rest, false),
                None => return Err(err("expected `org:name:version`")),
            },
        };
        let Some((name, version)) = rest.split_once(':') else {
            return Err(err("missing version"));
        };
        if [organization, name, version]
            .iter()
            .any(|part| part.is_empty() || part.contains(':') || part.contains(char::is_whitespace))
        {
            return Err(err("empty or malformed segment"));
        }
        Ok(Self {
            organization: organization.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            cross_versioned,
        })
    }
}

impl TryFrom<String> for Dependency {
    type Error = DependencyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Dependency> for String {
    fn from(value: Dependency) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.cross_versioned { "::" } else { ":" };
        write!(f, "{}{sep}{}:{}", self.organization, self.name, self.version)
    }
}
