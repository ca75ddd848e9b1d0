/// Targets that must be reachable without a session. Matching ignores the
/// query string and trailing slashes and accepts exact or suffix matches.
#[derive(Clone, Debug, Default)]
pub struct PublicEndpoints {
    entries: Vec<String>,
}

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// Suffix match that only splits the path on a `/` boundary.
fn ends_with_segments(path: &str, suffix: &str) -> bool {
    let Some(prefix) = path.strip_suffix(suffix) else {
        return false;
    };
    suffix.starts_with('/') || prefix.ends_with('/')
}

impl PublicEndpoints {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(Into::into)
                .filter(|e: &String| !e.trim().is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, target: &str) -> bool {
        let path = normalize(target);
        self.entries.iter().any(|entry| {
            let entry = normalize(entry);
            path == entry || ends_with_segments(path, entry)
        })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}
