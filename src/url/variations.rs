//! Alternate URL forms tried after the original exhausts its retries
//!
//! Each edit is applied to the original URL on its own, never compounded:
//!
//! 1. toggle the `www.` host prefix
//! 2. toggle the scheme (`https` <-> `http`)
//! 3. add a trailing slash to the path
//! 4. remove a trailing slash from a non-root path
//!
//! Edits work on the literal string so userinfo, port, query and fragment
//! survive untouched. Duplicates and the original itself are skipped.

/// Which edit produced a variation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariationKind {
    WwwToggle,
    SchemeToggle,
    AddTrailingSlash,
    RemoveTrailingSlash,
}

const ORDER: [VariationKind; 4] = [
    VariationKind::WwwToggle,
    VariationKind::SchemeToggle,
    VariationKind::AddTrailingSlash,
    VariationKind::RemoveTrailingSlash,
];

/// One candidate URL form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variation {
    pub url: String,
    pub kind: VariationKind,
}

/// Lazy, bounded sequence of variations for one original URL
///
/// Cloning the iterator (or calling [`variations`] again) restarts it.
#[derive(Debug, Clone)]
pub struct Variations {
    original: String,
    parts: Option<UrlParts>,
    step: usize,
    yielded: usize,
    max: usize,
    seen: Vec<String>,
}

/// Returns the variation sequence for `original`, capped at `max_variations`
///
/// # Arguments
///
/// * `original` - Normalized URL to vary; it must carry a scheme
/// * `max_variations` - Upper bound on the forms yielded
///
/// # Returns
///
/// * `Variations` - A lazy iterator in fixed order that skips the original
///   form and duplicates; empty when `original` has no scheme or host
///
/// # Examples
///
/// ```
/// use tagsweep::url::variations;
///
/// let forms: Vec<String> = variations("http://example.com", 2).map(|v| v.url).collect();
/// assert_eq!(forms, vec!["http://www.example.com", "https://example.com"]);
/// ```
pub fn variations(original: &str, max_variations: usize) -> Variations {
    Variations {
        original: original.to_string(),
        parts: UrlParts::split(original),
        step: 0,
        yielded: 0,
        max: max_variations,
        seen: Vec::new(),
    }
}

impl Iterator for Variations {
    type Item = Variation;

    fn next(&mut self) -> Option<Variation> {
        let parts = self.parts.as_ref()?;

        while self.yielded < self.max && self.step < ORDER.len() {
            let kind = ORDER[self.step];
            self.step += 1;

            let Some(url) = parts.apply(kind) else {
                continue;
            };
            if url == self.original || self.seen.contains(&url) {
                continue;
            }

            self.seen.push(url.clone());
            self.yielded += 1;
            return Some(Variation { url, kind });
        }

        None
    }
}

/// Literal pieces of `scheme://userinfo@host:port/path?query#fragment`
#[derive(Debug, Clone)]
struct UrlParts {
    scheme: String,
    userinfo: String,
    host_port: String,
    path: String,
    tail: String,
}

impl UrlParts {
    fn split(url: &str) -> Option<Self> {
        let (scheme, rest) = url.split_once("://")?;
        if scheme.is_empty() {
            return None;
        }

        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (authority, after) = rest.split_at(authority_end);
        if authority.is_empty() {
            return None;
        }

        let (userinfo, host_port) = match authority.rfind('@') {
            Some(at) => authority.split_at(at + 1),
            None => ("", authority),
        };

        let path_end = after.find(['?', '#']).unwrap_or(after.len());
        let (path, tail) = after.split_at(path_end);

        Some(Self {
            scheme: scheme.to_string(),
            userinfo: userinfo.to_string(),
            host_port: host_port.to_string(),
            path: path.to_string(),
            tail: tail.to_string(),
        })
    }

    fn apply(&self, kind: VariationKind) -> Option<String> {
        match kind {
            VariationKind::WwwToggle => {
                let host_port = match self.host_port.strip_prefix("www.") {
                    Some(bare) => bare.to_string(),
                    None => format!("www.{}", self.host_port),
                };
                Some(self.join(&self.scheme, &host_port, &self.path))
            }
            VariationKind::SchemeToggle => {
                let scheme = if self.scheme.eq_ignore_ascii_case("https") {
                    "http"
                } else {
                    "https"
                };
                Some(self.join(scheme, &self.host_port, &self.path))
            }
            VariationKind::AddTrailingSlash => {
                if self.path.ends_with('/') {
                    None
                } else {
                    let path = format!("{}/", self.path);
                    Some(self.join(&self.scheme, &self.host_port, &path))
                }
            }
            VariationKind::RemoveTrailingSlash => {
                if self.path.ends_with('/') && self.path != "/" {
                    let path = self.path.trim_end_matches('/');
                    Some(self.join(&self.scheme, &self.host_port, path))
                } else {
                    None
                }
            }
        }
    }

    fn join(&self, scheme: &str, host_port: &str, path: &str) -> String {
        format!(
            "{}://{}{}{}{}",
            scheme, self.userinfo, host_port, path, self.tail
        )
    }
}
