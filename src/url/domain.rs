use url::Url;

/// Extracts the domain key used for politeness and block accounting
///
/// The key is the lowercased host with a leading `www.` removed, so the
/// www-toggle variation of a URL shares its budget with the original. Inputs
/// that do not parse fall back to a best-effort host slice of the raw string.
///
/// # Examples
///
/// ```
/// use tagsweep::url::extract_domain;
///
/// assert_eq!(extract_domain("https://EXAMPLE.com/path"), "example.com");
/// assert_eq!(extract_domain("http://www.example.com:8080/"), "example.com");
/// assert_eq!(extract_domain("https://blog.example.com"), "blog.example.com");
/// ```
pub fn extract_domain(url: &str) -> String {
    let host = match Url::parse(url) {
        Ok(parsed) => parsed.host_str().map(|h| h.to_lowercase()),
        Err(_) => None,
    };

    let host = host.unwrap_or_else(|| raw_host(url));
    match host.strip_prefix("www.") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => host,
    }
}

/// Host portion of a string that `url` refused to parse
fn raw_host(url: &str) -> String {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    let host = host_port.split(':').next().unwrap_or(host_port);
    host.to_lowercase()
}
