use crate::{base::SentinelRule, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum AuthorityStrategy {
    /// Only the listed origins pass.
    White,
    /// The listed origins are blocked.
    Black,
}

impl Default for AuthorityStrategy {
    fn default() -> AuthorityStrategy {
        AuthorityStrategy::White
    }
}

/// `Rule` limits the callers of a resource by origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// `id` represents the unique ID of the rule (optional).
    pub id: String,
    pub resource: String,
    pub limit_origins: HashSet<String>,
    pub strategy: AuthorityStrategy,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            limit_origins: HashSet::new(),
            strategy: AuthorityStrategy::default(),
        }
    }
}

impl Rule {
    /// Whether a call from `origin` is admitted by this rule.
    /// An empty origin is always admitted.
    pub fn admits(&self, origin: &str) -> bool {
        if origin.is_empty() {
            return true;
        }
        let listed = self.limit_origins.contains(origin);
        match self.strategy {
            AuthorityStrategy::White => listed,
            AuthorityStrategy::Black => !listed,
        }
    }
}

impl SentinelRule for Rule {
    fn resource_name(&self) -> String {
        self.resource.clone()
    }

    fn is_valid(&self) -> Result<()> {
        if self.resource.is_empty() {
            return Err(Error::msg("empty resource name"));
        }
        if self.limit_origins.is_empty() {
            return Err(Error::msg("empty limit_origins"));
        }
        if self.limit_origins.iter().any(|o| o.trim().is_empty()) {
            return Err(Error::msg("blank origin in limit_origins"));
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.strategy == other.strategy
            && self.limit_origins == other.limit_origins
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut origins: Vec<&str> = self.limit_origins.iter().map(|o| o.as_str()).collect();
        origins.sort_unstable();
        write!(
            f,
            "AuthorityRule{{resource={}, strategy={:?}, limit_origins=[{}]}}",
            self.resource,
            self.strategy,
            origins.join(",")
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn origins(list: &[&str]) -> HashSet<String> {
        list.iter().map(|o| o.to_string()).collect()
    }

    #[test]
    fn white_and_black() {
        let white = Rule {
            resource: "abc".into(),
            limit_origins: origins(&["app_a", "app_b"]),
            strategy: AuthorityStrategy::White,
            ..Default::default()
        };
        assert!(white.admits("app_a"));
        assert!(!white.admits("app_c"));
        // no partial matching
        assert!(!white.admits("app"));
        assert!(white.admits(""));

        let black = Rule {
            strategy: AuthorityStrategy::Black,
            ..white
        };
        assert!(!black.admits("app_b"));
        assert!(black.admits("app_c"));
        assert!(black.admits(""));
    }

    #[test]
    fn validity() {
        let rule = Rule {
            resource: "abc".into(),
            limit_origins: origins(&["app_a"]),
            ..Default::default()
        };
        assert!(rule.is_valid().is_ok());
        assert!(Rule {
            resource: String::new(),
            ..rule.clone()
        }
        .is_valid()
        .is_err());
        assert!(Rule {
            limit_origins: HashSet::new(),
            ..rule.clone()
        }
        .is_valid()
        .is_err());
        assert!(Rule {
            limit_origins: origins(&["app_a", " "]),
            ..rule
        }
        .is_valid()
        .is_err());
    }

    #[test]
    fn equality_and_display() {
        let a = Rule {
            resource: "abc".into(),
            limit_origins: origins(&["x", "y"]),
            ..Default::default()
        };
        let b = Rule {
            limit_origins: origins(&["y", "x"]),
            ..a.clone()
        };
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "AuthorityRule{resource=abc, strategy=White, limit_origins=[x,y]}");
    }

    #[test]
    fn origins_from_json() {
        let rule: Rule = serde_json::from_str(
            r#"{"resource":"abc","limit_origins":["app_a","app_b","app_a"],"strategy":"Black"}"#,
        )
        .unwrap();
        assert_eq!(rule.limit_origins.len(), 2);
        assert!(!rule.admits("app_a"));
        assert!(rule.admits("app_c"));
        assert!(rule.is_valid().is_ok());
    }
}
