//! Request URLs built from path segments.

use reqwest::Url;

use crate::error::{Error, Result};

/// `base` followed by `segments`, each percent-encoded as exactly one path
/// segment.
///
/// Names that come from tool arguments (issue keys, repository owners, pod
/// names) can therefore not add path levels or start a query string.
/// Empty, `.` and `..` segments are rejected.
pub fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    if let Some(bad) = segments
        .iter()
        .find(|s| s.is_empty() || **s == "." || **s == "..")
    {
        return Err(Error::InvalidData(format!(
            "'{}' is not a valid path segment",
            bad
        )));
    }

    let mut url =
        Url::parse(base).map_err(|e| Error::Config(format!("invalid base URL {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| Error::Config(format!("{} cannot be used as a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joins_under_base_path() {
        let url = endpoint("https://ghe.corp/api/v3/", &["repos", "acme", "web"]).unwrap();
        assert_eq!(url.as_str(), "https://ghe.corp/api/v3/repos/acme/web");

        let url = endpoint("http://127.0.0.1:8080", &["api", "queries", "7"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/api/queries/7");
    }

    #[test]
    fn test_segments_are_escaped() {
        let url = endpoint("https://jira.corp", &["rest", "api", "2", "issue", "PROJ-1/../x?y#z"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://jira.corp/rest/api/2/issue/PROJ-1%2F..%2Fx%3Fy%23z"
        );
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_dot_segments_rejected() {
        for bad in ["..", ".", ""] {
            let err = endpoint("https://api.github.com", &["repos", bad, "web"]).unwrap_err();
            assert!(matches!(err, Error::InvalidData(_)), "{:?}", err);
        }
    }

    #[test]
    fn test_invalid_base() {
        assert!(matches!(
            endpoint("not a url", &["x"]),
            Err(Error::Config(_))
        ));
    }
}
