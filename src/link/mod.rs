use std::fmt;
use url::Url;

use crate::errors::EnrollError;

/// Path prefix that precedes the activation token.
const MARKER: &str = "/android/";

/// Length of an activation token.
pub const TOKEN_LEN: usize = 20;

/// Single-use token identifying one pending enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationToken(String);

impl ActivationToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_alphanumeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Check that `url_in` looks like an enrollment link issued by `host`:
/// https, the exact host, and a path starting with an `android` segment
/// followed by an alphanumeric segment.
pub fn validate(url_in: &str, host: &str) -> bool {
    let u = match Url::parse(url_in) {
        Ok(x) => x,
        Err(_) => return false,
    };

    if u.scheme() != "https" || u.host_str() != Some(host) {
        return false;
    }

    let segments: Vec<&str> = match u.path_segments() {
        Some(s) => s.collect(),
        None => return false,
    };

    segments.len() >= 2 && segments[0] == "android" && is_alphanumeric(segments[1])
}

/// Pull the token out of an enrollment link. The token is the fixed-size
/// window right after the leading `/android/`; whatever follows it is
/// ignored.
pub fn extract_token(url_in: &str) -> Result<ActivationToken, EnrollError> {
    let u = Url::parse(url_in).map_err(|e| EnrollError::Extraction(e.to_string()))?;
    let path = u.path();

    let rest = match path.strip_prefix(MARKER) {
        Some(x) => x,
        None => {
            return Err(EnrollError::Extraction(format!(
                "link path does not start with '{}'",
                MARKER
            )))
        }
    };

    let token = rest.get(..TOKEN_LEN).ok_or_else(|| {
        EnrollError::Extraction(format!(
            "expected {} token characters after '{}', found {}",
            TOKEN_LEN,
            MARKER,
            rest.len()
        ))
    })?;

    if !is_alphanumeric(token) {
        return Err(EnrollError::Extraction(String::from(
            "activation token is not alphanumeric",
        )));
    }

    Ok(ActivationToken(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "m-268194b0.duosecurity.com";

    #[test]
    fn validate_accepts_enrollment_link() {
        assert!(validate(
            "https://m-268194b0.duosecurity.com/android/AbC123xyz987AbC123xy",
            HOST
        ));
    }

    #[test]
    fn validate_rejects_prefixed_path() {
        assert!(!validate(
            "https://m-268194b0.duosecurity.com/frame/android/AbC123xyz987AbC123xy?x=1",
            HOST
        ));
        assert!(!validate(
            "https://m-268194b0.duosecurity.com/notandroid/android/0123456789abcdefghij",
            HOST
        ));
    }

    #[test]
    fn validated_links_extract() {
        for link in &[
            "https://m-268194b0.duosecurity.com/android/0123456789abcdefghij",
            "https://m-268194b0.duosecurity.com/android/0123456789abcdefghijKLMN/extra",
            "https://m-268194b0.duosecurity.com/android/0123456789abcdefghij?q=android/x",
        ] {
            assert!(validate(link, HOST), "{} should validate", link);
            assert_eq!(extract_token(link).unwrap().as_str(), "0123456789abcdefghij");
        }
    }

    #[test]
    fn validate_rejects_wrong_scheme_or_host() {
        assert!(!validate(
            "http://evil.example.com/android/AbC123xyz987AbC123xy",
            HOST
        ));
        assert!(!validate(
            "http://m-268194b0.duosecurity.com/android/AbC123xyz987AbC123xy",
            HOST
        ));
        assert!(!validate(
            "https://m-268194b0.duosecurity.com.evil.example/android/AbC123xyz987AbC123xy",
            HOST
        ));
    }

    #[test]
    fn validate_rejects_empty_token() {
        assert!(!validate("https://m-268194b0.duosecurity.com/android/", HOST));
        assert!(!validate("https://m-268194b0.duosecurity.com/android", HOST));
    }

    #[test]
    fn validate_rejects_lookalike_paths() {
        assert!(!validate(
            "https://m-268194b0.duosecurity.com/notandroid/AbC123xyz987AbC123xy",
            HOST
        ));
        assert!(!validate(
            "https://m-268194b0.duosecurity.com/ios/AbC123xyz987AbC123xy",
            HOST
        ));
        assert!(!validate(
            "https://m-268194b0.duosecurity.com/android/abc-def",
            HOST
        ));
    }

    #[test]
    fn validate_rejects_garbage() {
        assert!(!validate("", HOST));
        assert!(!validate("android/AbC123xyz987AbC123xy", HOST));
        assert!(!validate("not a url at all", HOST));
    }

    #[test]
    fn extract_token_exact() {
        let t = extract_token("https://m-268194b0.duosecurity.com/android/0123456789abcdefghij").unwrap();
        assert_eq!(t.as_str(), "0123456789abcdefghij");
    }

    #[test]
    fn extract_token_ignores_trailing_content() {
        let t = extract_token(
            "https://m-268194b0.duosecurity.com/android/0123456789abcdefghijKLMN/extra?q=1",
        )
        .unwrap();
        assert_eq!(t.as_str(), "0123456789abcdefghij");

        let t = extract_token("https://m-268194b0.duosecurity.com/android/0123456789abcdefghij?q=1").unwrap();
        assert_eq!(t.as_str(), "0123456789abcdefghij");
    }

    #[test]
    fn extract_token_short_link() {
        let res = extract_token("https://m-268194b0.duosecurity.com/android/short");
        match res {
            Err(EnrollError::Extraction(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn extract_token_does_not_read_query() {
        // The path alone is too short, the query must not fill the window.
        let res = extract_token("https://m-268194b0.duosecurity.com/android/0123456789?abcdefghij");
        assert!(res.is_err());
    }

    #[test]
    fn extract_token_missing_marker() {
        assert!(extract_token("https://m-268194b0.duosecurity.com/ios/0123456789abcdefghij").is_err());
        assert!(extract_token(
            "https://m-268194b0.duosecurity.com/notandroid/0123456789abcdefghij"
        )
        .is_err());
        assert!(extract_token(
            "https://m-268194b0.duosecurity.com/frame/android/0123456789abcdefghij"
        )
        .is_err());
    }
}
