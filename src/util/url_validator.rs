use thiserror::Error;
use url::Url;

/// Errors that can occur while validating an API base URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Plain HTTP pointing anywhere but the local machine.
    #[error("Insecure base URL '{0}': HTTPS required (except localhost for testing)")]
    Insecure(String),
    /// A scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Validates the base URL an API token will be sent to.
///
/// The bearer token travels in a header on every request, so anything other
/// than HTTPS would leak it. Plain HTTP is accepted only for `localhost` and
/// `127.0.0.1`, which is what local mock servers bind to.
///
/// # Examples
///
/// ```
/// use postsync::util::validate_api_base_url;
///
/// assert!(validate_api_base_url("https://api.linkedin.com/rest/memberChangeLogs").is_ok());
/// assert!(validate_api_base_url("http://127.0.0.1:8080/changelog").is_ok());
/// assert!(validate_api_base_url("http://api.example.com/changelog").is_err());
/// ```
pub fn validate_api_base_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "https" => Ok(url),
        "http" => {
            let is_localhost = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));
            if is_localhost {
                tracing::warn!(base_url = %url, "Using non-HTTPS API base URL (localhost only)");
                Ok(url)
            } else {
                Err(UrlValidationError::Insecure(url_str.to_string()))
            }
        }
        other => Err(UrlValidationError::UnsupportedScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_accepted() {
        let url = validate_api_base_url("https://api.linkedin.com/rest/memberChangeLogs").unwrap();
        assert_eq!(url.host_str(), Some("api.linkedin.com"));
    }

    #[test]
    fn test_localhost_http_accepted() {
        assert!(validate_api_base_url("http://localhost:9000/x").is_ok());
        assert!(validate_api_base_url("http://127.0.0.1:9000/x").is_ok());
    }

    #[test]
    fn test_remote_http_rejected() {
        assert!(matches!(
            validate_api_base_url("http://evil.com/changelog"),
            Err(UrlValidationError::Insecure(_))
        ));
    }

    #[test]
    fn test_other_schemes_rejected() {
        assert!(matches!(
            validate_api_base_url("ftp://api.linkedin.com/"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            validate_api_base_url("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }
}
