//! Variable interpolation for stack files.
//!
//! String values in the stack file may reference environment variables as
//! `${env.NAME}`. References that cannot be resolved are kept verbatim;
//! `ConfigLayer::check_resolved` rejects them once all layers are merged.

use regex::Regex;
use std::sync::LazyLock;

// Regex for matching ${namespace.name} variables
static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)\.([a-zA-Z_][a-zA-Z0-9_]*)\}")
        .expect("variable pattern is valid")
});

/// Resolves `${env.NAME}` references through a lookup function.
pub struct Interpolator<F> {
    lookup: F,
}

impl<F> Interpolator<F>
where
    F: Fn(&str) -> Option<String>,
{
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }

    /// Resolve a single `namespace.name` variable.
    pub fn resolve(&self, namespace: &str, name: &str) -> Option<String> {
        match namespace {
            "env" => (self.lookup)(name),
            _ => None,
        }
    }

    /// Interpolate all variables in a string.
    pub fn interpolate(&self, input: &str) -> String {
        VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                self.resolve(&caps[1], &caps[2])
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .to_string()
    }
}

/// Names of all variables referenced in a string, as `namespace.name`.
pub fn find_references(input: &str) -> Vec<String> {
    VAR_REGEX
        .captures_iter(input)
        .map(|caps| format!("{}.{}", &caps[1], &caps[2]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn interpolator(vars: &[(&str, &str)]) -> Interpolator<impl Fn(&str) -> Option<String>> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Interpolator::new(move |k: &str| vars.get(k).cloned())
    }

    #[test]
    fn test_env_variables() {
        let interp = interpolator(&[("ORG", "acme"), ("REPO", "app")]);
        let result = interp.interpolate("https://github.com/${env.ORG}/${env.REPO}");
        assert_eq!(result, "https://github.com/acme/app");
    }

    #[test]
    fn test_unknown_variable_preserved() {
        let interp = interpolator(&[]);
        assert_eq!(interp.interpolate("${env.MISSING}"), "${env.MISSING}");
        assert_eq!(interp.interpolate("${secrets.TOKEN}"), "${secrets.TOKEN}");
    }

    #[test]
    fn test_plain_text_untouched() {
        let interp = interpolator(&[("A", "b")]);
        assert_eq!(interp.interpolate("us-central1"), "us-central1");
        assert_eq!(interp.interpolate("$A {env.A}"), "$A {env.A}");
    }

    #[test]
    fn test_find_references() {
        let refs = find_references("${env.GCP_PROJECT}-${env.SUFFIX} ${git.sha}");
        assert_eq!(refs, vec!["env.GCP_PROJECT", "env.SUFFIX", "git.sha"]);
    }
}
