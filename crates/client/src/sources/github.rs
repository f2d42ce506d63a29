//! Repository fallback shared by every ecosystem.

use fdocs_core::SourceKind;

use super::{ResolvedSource, SourceAttempt};

const GITHUB_ROOT: &str = "https://github.com/";

/// Collapse the accepted repository URL forms to `https://github.com/<owner>/<repo>`.
///
/// Accepts `git+<url>`, a trailing `.git`, `github:<owner>/<repo>`,
/// `git@github.com:<owner>/<repo>`, and anything containing
/// `github.com/<path>`.
pub fn normalize_repository_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("git+").unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    let path = if let Some(rest) = trimmed.strip_prefix("github:") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("git@github.com:") {
        rest
    } else if let Some(start) = trimmed.find("github.com/") {
        &trimmed[start + "github.com/".len()..]
    } else {
        return None;
    };

    let path = path.trim_matches('/');
    if path.is_empty() {
        return None;
    }
    Some(format!("{GITHUB_ROOT}{path}"))
}

/// Fallback target for `package_name`.
///
/// A usable repository URL resolves to its default-branch tree, recorded as
/// a successful attempt. Without one the result is a repository search for
/// the package name, recorded as a failed attempt but still returned as the
/// best available URL.
pub fn resolve_repository_fallback(package_name: &str, version: &str, repository_url: Option<&str>) -> ResolvedSource {
    let (url, attempt) = match repository_url.and_then(normalize_repository_url) {
        Some(repo) => {
            let tree = format!("{repo}/tree/HEAD");
            (tree.clone(), SourceAttempt::ok(SourceKind::RepositoryFallback, tree))
        }
        None => {
            let search = format!("{GITHUB_ROOT}search?q={}&type=repositories", super::encode_component(package_name));
            tracing::debug!("no repository URL for {}, falling back to search", package_name);
            let attempt = SourceAttempt::failed(
                SourceKind::RepositoryFallback,
                search.clone(),
                "No repository URL available; using GitHub search fallback.",
            );
            (search, attempt)
        }
    };

    ResolvedSource { kind: SourceKind::RepositoryFallback, url, version: version.to_string(), attempts: vec![attempt] }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_accepted_forms() {
        for raw in [
            "git+https://github.com/a/b.git",
            "github:a/b",
            "git@github.com:a/b.git",
            "https://github.com/a/b",
            "  git+ssh://git@github.com/a/b.git ",
            "http://www.github.com/a/b/",
        ] {
            assert_eq!(normalize_repository_url(raw).as_deref(), Some("https://github.com/a/b"), "{raw}");
        }
    }

    #[test]
    fn test_normalize_rejects_other_hosts() {
        assert_eq!(normalize_repository_url("https://gitlab.com/a/b"), None);
        assert_eq!(normalize_repository_url(""), None);
        assert_eq!(normalize_repository_url("https://github.com/"), None);
    }

    #[test]
    fn test_fallback_with_repository() {
        let source = resolve_repository_fallback("serde", "1.0.0", Some("https://github.com/serde-rs/serde"));
        assert_eq!(source.kind, SourceKind::RepositoryFallback);
        assert_eq!(source.url, "https://github.com/serde-rs/serde/tree/HEAD");
        assert_eq!(source.version, "1.0.0");
        assert_eq!(source.attempts.len(), 1);
        assert!(source.attempts[0].ok);
        assert!(source.is_authoritative());
    }

    #[test]
    fn test_fallback_without_repository() {
        let source = resolve_repository_fallback("@scope/pkg", "2.0.0", None);
        assert_eq!(source.url, "https://github.com/search?q=%40scope%2Fpkg&type=repositories");
        assert!(!source.attempts[0].ok);
        assert!(source.attempts[0].reason.is_some());
        assert!(!source.is_authoritative());

        let source = resolve_repository_fallback("x", "1.0.0", Some("https://gitlab.com/a/b"));
        assert!(!source.attempts[0].ok);
    }
}
