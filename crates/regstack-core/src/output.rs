//! Deferred output values.
//!
//! An [`Output`] is a string whose value may not be known until the engine
//! has applied the plan. It is a sequence of literal text and references to
//! attributes of other declared resources. Composing outputs (for example a
//! principal string that embeds a pool's resource name) keeps the references
//! intact, so the engine sees the data dependency instead of a value.

use derive_more::Display;
use serde::{Serialize, Serializer};

/// A reference to an attribute of a declared resource or data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{address}.{attribute}")]
pub struct Reference {
    /// Engine address of the resource, e.g. `google_storage_bucket.sbom`.
    pub address: String,
    /// Attribute name, e.g. `name`.
    pub attribute: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Reference(Reference),
}

/// A value resolved by the engine, possibly depending on other resources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    segments: Vec<Segment>,
}

impl Output {
    /// An output whose value is already known.
    pub fn known(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            return Self::default();
        }
        Self {
            segments: vec![Segment::Literal(value)],
        }
    }

    /// An output referring to `attribute` of the resource at `address`.
    pub fn reference(address: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Reference(Reference {
                address: address.into(),
                attribute: attribute.into(),
            })],
        }
    }

    /// Concatenate outputs and literals into a single output.
    pub fn concat<I, T>(parts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Output>,
    {
        let mut out = Output::default();
        for part in parts {
            out.push(part.into());
        }
        out
    }

    fn push(&mut self, other: Output) {
        for segment in other.segments {
            match (self.segments.last_mut(), segment) {
                (Some(Segment::Literal(prev)), Segment::Literal(next)) => prev.push_str(&next),
                (_, segment) => self.segments.push(segment),
            }
        }
    }

    /// The value, if it contains no references.
    pub fn known_value(&self) -> Option<String> {
        let mut value = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => value.push_str(s),
                Segment::Reference(_) => return None,
            }
        }
        Some(value)
    }

    /// Whether the value is known without applying anything.
    pub fn is_known(&self) -> bool {
        self.references().next().is_none()
    }

    /// All references this output depends on, in order of appearance.
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Reference(r) => Some(r),
            Segment::Literal(_) => None,
        })
    }

    /// Render as a Terraform-style interpolation string.
    ///
    /// Literal `${` and `%{` sequences are escaped so they are not evaluated.
    pub fn to_interpolation(&self) -> String {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => {
                    rendered.push_str(&s.replace("${", "$${").replace("%{", "%%{"));
                }
                Segment::Reference(r) => {
                    rendered.push_str("${");
                    rendered.push_str(&r.to_string());
                    rendered.push('}');
                }
            }
        }
        rendered
    }
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.known_value() {
            Some(value) => f.write_str(&value),
            None => f.write_str(&self.to_interpolation()),
        }
    }
}

impl From<&str> for Output {
    fn from(value: &str) -> Self {
        Output::known(value)
    }
}

impl From<String> for Output {
    fn from(value: String) -> Self {
        Output::known(value)
    }
}

impl From<&String> for Output {
    fn from(value: &String) -> Self {
        Output::known(value.as_str())
    }
}

impl From<&Output> for Output {
    fn from(value: &Output) -> Self {
        value.clone()
    }
}

impl Serialize for Output {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_interpolation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_value() {
        let out = Output::known("us-docker.pkg.dev");
        assert!(out.is_known());
        assert_eq!(out.known_value().as_deref(), Some("us-docker.pkg.dev"));
        assert_eq!(out.to_string(), "us-docker.pkg.dev");
    }

    #[test]
    fn test_concat_keeps_references() {
        let pool = Output::reference("google_iam_workload_identity_pool.pool", "name");
        let principal = Output::concat([
            Output::from("principalSet://iam.googleapis.com/"),
            pool,
            Output::from("/attribute.repository/test/repo"),
        ]);

        assert!(!principal.is_known());
        assert_eq!(principal.known_value(), None);
        assert_eq!(
            principal.to_interpolation(),
            "principalSet://iam.googleapis.com/${google_iam_workload_identity_pool.pool.name}/attribute.repository/test/repo"
        );

        let refs: Vec<String> = principal.references().map(|r| r.to_string()).collect();
        assert_eq!(refs, vec!["google_iam_workload_identity_pool.pool.name"]);
    }

    #[test]
    fn test_concat_of_literals_is_known() {
        let url = Output::concat(["us", "-docker.pkg.dev/", "test-project"]);
        assert_eq!(url.known_value().as_deref(), Some("us-docker.pkg.dev/test-project"));
    }

    #[test]
    fn test_literal_template_sequences_escaped() {
        let out = Output::known("echo ${HOME} %{ if }");
        assert_eq!(out.to_interpolation(), "echo $${HOME} %%{ if }");
        assert_eq!(out.to_string(), "echo ${HOME} %{ if }");
    }

    #[test]
    fn test_serializes_as_interpolation() {
        let out = Output::concat([
            Output::from("serviceAccount:"),
            Output::reference("google_service_account.sa", "email"),
        ]);
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json, serde_json::json!("serviceAccount:${google_service_account.sa.email}"));
    }

    #[test]
    fn test_empty_known() {
        let out = Output::known("");
        assert_eq!(out.known_value().as_deref(), Some(""));
        assert_eq!(out.to_interpolation(), "");
    }
}
