//! Requirement strings: `requests`, `scipy==1.10.0`, `numpy >= 1.20`.

use std::fmt;
use std::str::FromStr;

use crate::error::{PackError, Result};

/// Relational operator of a version constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
    /// `~=` compatible release.
    Compatible,
}

impl Operator {
    /// Two-character operators come first so `>=` is never read as `>`.
    const ALL: [Operator; 7] = [
        Operator::Eq,
        Operator::Ge,
        Operator::Le,
        Operator::Ne,
        Operator::Compatible,
        Operator::Gt,
        Operator::Lt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Compatible => "~=",
        }
    }

    /// Parse an operator token exactly. `None` for anything unrecognized.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == token)
    }

    /// Longest recognized operator at the start of `s`.
    fn strip_prefix(s: &str) -> Option<(Self, &str)> {
        Self::ALL
            .into_iter()
            .find_map(|op| s.strip_prefix(op.as_str()).map(|rest| (op, rest)))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A package name plus an optional version constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requirement {
    /// Canonical name: lowercase, `_` replaced by `-`.
    pub name: String,
    /// `None` means any version is acceptable.
    pub op: Option<Operator>,
    /// Raw version text; empty iff `op` is `None`.
    pub version: String,
}

impl Requirement {
    /// Parse a free-form requirement string.
    pub fn parse(input: &str) -> Result<Self> {
        let req = input.trim();
        let name_len = req
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(req.len());
        if name_len == 0 {
            return Err(PackError::invalid_requirement(input, "missing package name"));
        }
        let name = canonical_name(&req[..name_len]);
        let remaining = req[name_len..].trim();
        if remaining.is_empty() {
            return Ok(Self {
                name,
                op: None,
                version: String::new(),
            });
        }

        let (op, rest) = Operator::strip_prefix(remaining)
            .ok_or_else(|| PackError::invalid_requirement(input, "unrecognized operator"))?;
        let version = rest.trim();
        if version.is_empty() {
            return Err(PackError::invalid_requirement(input, "version missing"));
        }
        Ok(Self {
            name,
            op: Some(op),
            version: version.to_string(),
        })
    }

    /// Exact version pin, if the constraint is `==`.
    pub fn pinned_version(&self) -> Option<&str> {
        match self.op {
            Some(Operator::Eq) => Some(&self.version),
            _ => None,
        }
    }

    /// Name used to import the package from a site directory (`-` → `_`).
    pub fn import_name(&self) -> String {
        self.name.replace('-', "_")
    }

    pub fn is_satisfied_by(&self, installed: &str) -> bool {
        crate::version::satisfies(installed, self.op, &self.version)
    }
}

impl FromStr for Requirement {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Some(op) => write!(f, "{}{}{}", self.name, op, self.version),
            None => f.write_str(&self.name),
        }
    }
}

/// Lowercase, underscore-to-hyphen package identifier.
pub fn canonical_name(name: &str) -> String {
    name.to_ascii_lowercase().replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_name() {
        let req = Requirement::parse("requests").unwrap();
        assert_eq!(req.name, "requests");
        assert_eq!(req.op, None);
        assert_eq!(req.version, "");
    }

    #[test]
    fn test_name_is_canonicalized() {
        let req = Requirement::parse("  Typing_Extensions ").unwrap();
        assert_eq!(req.name, "typing-extensions");
        assert_eq!(req.import_name(), "typing_extensions");
    }

    #[test]
    fn test_every_operator_round_trips() {
        for token in ["==", ">=", "<=", ">", "<", "!=", "~="] {
            let input = format!("My_Pkg{token}1.2.3");
            let req = Requirement::parse(&input).unwrap();
            assert_eq!(req.name, "my-pkg");
            assert_eq!(req.op.map(Operator::as_str), Some(token));
            assert_eq!(req.version, "1.2.3");
            assert_eq!(req.to_string(), format!("my-pkg{token}1.2.3"));
        }
    }

    #[test]
    fn test_whitespace_around_operator() {
        let req: Requirement = "numpy >= 1.20 ".parse().unwrap();
        assert_eq!(req.op, Some(Operator::Ge));
        assert_eq!(req.version, "1.20");
        assert_eq!(req.pinned_version(), None);

        let req = Requirement::parse("scipy== 1.10.0").unwrap();
        assert_eq!(req.pinned_version(), Some("1.10.0"));
    }

    #[test]
    fn test_malformed_requirements() {
        for bad in ["", "   ", "==1.0", ".pkg", "pkg=1.0", "pkg 1.0", "pkg@1.0", "pkg==", "pkg>=  ", "pkg=>1"] {
            let err = Requirement::parse(bad).unwrap_err();
            assert!(err.is_invalid_requirement(), "{bad:?} gave {err:?}");
        }
    }

    #[test]
    fn test_operator_from_token() {
        assert_eq!(Operator::from_token("~="), Some(Operator::Compatible));
        assert_eq!(Operator::from_token(">"), Some(Operator::Gt));
        assert_eq!(Operator::from_token("=~"), None);
        assert_eq!(Operator::from_token(""), None);
    }
}
