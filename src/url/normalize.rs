use crate::UrlError;
use url::Url;

/// Normalizes an input line into an attempt target
///
/// The only rewrite is adding `https://` to scheme-less inputs such as
/// `example.com/page`. Everything else (case, trailing slashes, query order)
/// is left untouched because the variation generator works on the literal
/// form and the original string remains the checkpoint identity.
///
/// # Examples
///
/// ```
/// use tagsweep::url::normalize_url;
///
/// assert_eq!(normalize_url("example.com"), "https://example.com");
/// assert_eq!(normalize_url("  http://example.com/a "), "http://example.com/a");
/// ```
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

fn has_scheme(s: &str) -> bool {
    match s.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        }
        None => false,
    }
}

/// Parses a URL and checks that it is something the fetcher can request
///
/// # Returns
///
/// * `Ok(Url)` - An http(s) URL with a host
/// * `Err(UrlError)` - Malformed URL, unsupported scheme, or missing host
pub fn parse_http_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}
