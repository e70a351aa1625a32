//! URL Policy (component C5): scheme/extension/keyword filtering,
//! normalization to a dedup key, and a same-domain predicate.

use url::Url;

/// Binary/asset extensions a crawler has no business fetching as HTML.
const BINARY_EXTENSIONS: &[&str] = &[
    ".zip", ".tar", ".gz", ".bz2", ".xz", ".7z", ".rar", ".exe", ".msi", ".dmg", ".pkg", ".deb",
    ".rpm", ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".jpg", ".jpeg", ".png",
    ".gif", ".bmp", ".svg", ".ico", ".mp3", ".mp4", ".avi", ".mov", ".wmv", ".flv", ".mkv",
    ".iso", ".img", ".bin", ".dat", ".db", ".sqlite", ".sqlite3", ".jar", ".war", ".ear", ".apk",
    ".ipa", ".pyc", ".pyo", ".so", ".dll", ".dylib", ".a", ".o", ".class", ".swf", ".fla",
    ".psd", ".ai", ".eps", ".ttf", ".otf", ".woff", ".woff2", ".eot",
];

const DENIED_KEYWORDS: &[&str] = &["download", "file", "attachment", "binary", "install"];

/// Whether a URL is allowed to be enqueued/fetched at all, per §4.5.
/// `extra_denied_keywords` lets `PolicyConfig` extend the keyword list
/// without touching this function.
pub fn is_allowed(url: &Url, extra_denied_keywords: &[String]) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }

    let path_lower = url.path().to_lowercase();
    if BINARY_EXTENSIONS.iter().any(|ext| path_lower.ends_with(ext)) {
        return false;
    }

    let url_lower = url.as_str().to_lowercase();
    if DENIED_KEYWORDS.iter().any(|kw| url_lower.contains(kw))
        || extra_denied_keywords
            .iter()
            .any(|kw| url_lower.contains(&kw.to_lowercase()))
    {
        return false;
    }

    true
}

/// Canonical dedup key: lowercase scheme/host, drop fragment, strip a
/// trailing `/` on non-root paths, keep query strings. `www.` is *not*
/// stripped here — same-domain comparisons that want to ignore it should
/// use [`same_domain`], which does strip it; the dedup key keeps the raw
/// normalized host so that `www.example.com` and `example.com` remain
/// distinct visited-set entries (per §4.5: "strip `www.` for same-domain
/// comparison ... but keep it in the key used for the visited set").
pub fn normalize(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    let scheme = normalized.scheme().to_lowercase();
    let host = normalized.host_str().unwrap_or("").to_lowercase();
    let port = normalized.port_or_known_default();
    let default_port = match scheme.as_str() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    let authority = match port {
        Some(p) if Some(p) != default_port => format!("{host}:{p}"),
        _ => host,
    };

    let mut path = normalized.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }

    let mut key = format!("{scheme}://{authority}{path}");
    if let Some(query) = normalized.query() {
        key.push('?');
        key.push_str(query);
    }
    key
}

/// True when `a` and `b` share a host once a leading `www.` is stripped
/// from each side — used by extensions, not required by the core enqueue
/// path.
pub fn same_domain(a: &Url, b: &Url) -> bool {
    let strip_www = |h: &str| h.strip_prefix("www.").unwrap_or(h).to_lowercase();
    match (a.host_str(), b.host_str()) {
        (Some(ha), Some(hb)) => strip_www(ha) == strip_www(hb),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(!is_allowed(&u("ftp://example.com/a"), &[]));
        assert!(!is_allowed(&u("mailto:a@example.com"), &[]));
    }

    #[test]
    fn rejects_binary_extensions_case_insensitive() {
        assert!(!is_allowed(&u("https://example.com/archive.ZIP"), &[]));
        assert!(!is_allowed(&u("https://example.com/report.pdf"), &[]));
        assert!(is_allowed(&u("https://example.com/index.html"), &[]));
    }

    #[test]
    fn rejects_denied_keywords() {
        assert!(!is_allowed(&u("https://example.com/download/thing"), &[]));
        assert!(!is_allowed(&u("https://example.com/install-app"), &[]));
    }

    #[test]
    fn extra_denied_keywords_are_applied() {
        let extra = vec!["admin".to_string()];
        assert!(!is_allowed(&u("https://example.com/admin/panel"), &extra));
        assert!(is_allowed(&u("https://example.com/admin/panel"), &[]));
    }

    #[test]
    fn normalize_strips_fragment_and_trailing_slash() {
        assert_eq!(
            normalize(&u("https://Example.com/a/b/#section")),
            "https://example.com/a/b"
        );
        assert_eq!(normalize(&u("https://example.com/")), "https://example.com/");
    }

    #[test]
    fn normalize_keeps_query_string() {
        assert_eq!(
            normalize(&u("https://example.com/a?x=1")),
            "https://example.com/a?x=1"
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let url = u("https://Example.com/a/b/?x=1#frag");
        let once = normalize(&url);
        let twice = normalize(&Url::parse(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn same_domain_ignores_www() {
        assert!(same_domain(
            &u("https://www.example.com/a"),
            &u("https://example.com/b")
        ));
        assert!(!same_domain(
            &u("https://example.com/a"),
            &u("https://other.com/b")
        ));
    }
}
