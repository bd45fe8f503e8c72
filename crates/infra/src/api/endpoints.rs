//! Public/protected endpoint classification

/// Whether a call needs a bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
}

/// Path-prefix rules for which endpoints skip authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPolicy {
    public_prefixes: Vec<String>,
}

impl EndpointPolicy {
    pub fn new<I, S>(public_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            public_prefixes: public_prefixes
                .into_iter()
                .map(Into::into)
                .map(|prefix| normalize(&prefix).to_string())
                .filter(|prefix| !prefix.is_empty())
                .collect(),
        }
    }

    /// A prefix matches whole path segments only, so `/tests` covers
    /// `/tests/42` but not `/testsuite`.
    pub fn classify(&self, path: &str) -> Access {
        let path = normalize(path);
        let public = self.public_prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        });
        if public {
            Access::Public
        } else {
            Access::Protected
        }
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.classify(path) == Access::Protected
    }
}

impl Default for EndpointPolicy {
    fn default() -> Self {
        Self::new(medool_domain::DEFAULT_PUBLIC_ENDPOINTS.iter().copied())
    }
}

/// Drop the query string and any trailing slash.
fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/')
}
