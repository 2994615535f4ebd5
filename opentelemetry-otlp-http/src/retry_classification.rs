//! Response classification for OTLP/HTTP exports.
//!
//! Maps the status code of a collector response onto what the delivery loop
//! does next: stop with success, back off and retry, or give up.

/// Outcome of a single export attempt, as decided by its status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResponseClass {
    /// The collector accepted the batch.
    Success,
    /// The collector could not take the batch right now; try again later.
    Retryable,
    /// Resending the same batch will not help.
    NonRetryable,
}

/// HTTP-specific classification.
pub(crate) mod http {
    use super::ResponseClass;

    /// Classifies an HTTP response based on its status code.
    ///
    /// 200 and 202 are success. 408 Request Timeout, 429 Too Many Requests
    /// and every 5xx except 501 Not Implemented are retryable. Everything
    /// else, including the remaining 2xx codes, is final.
    pub(crate) fn classify_http_status(status_code: u16) -> ResponseClass {
        match status_code {
            200 | 202 => ResponseClass::Success,
            408 | 429 => ResponseClass::Retryable,
            501 => ResponseClass::NonRetryable,
            500..=599 => ResponseClass::Retryable,
            _ => ResponseClass::NonRetryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::http::classify_http_status;
    use super::ResponseClass;

    #[test]
    fn test_http_success() {
        assert_eq!(classify_http_status(200), ResponseClass::Success);
        assert_eq!(classify_http_status(202), ResponseClass::Success);
    }

    #[test]
    fn test_http_other_2xx_not_retryable() {
        assert_eq!(classify_http_status(201), ResponseClass::NonRetryable);
        assert_eq!(classify_http_status(204), ResponseClass::NonRetryable);
    }

    #[test]
    fn test_http_timeout_and_throttling_retryable() {
        assert_eq!(classify_http_status(408), ResponseClass::Retryable);
        assert_eq!(classify_http_status(429), ResponseClass::Retryable);
    }

    #[test]
    fn test_http_server_errors_retryable() {
        for code in (500..=599).filter(|c| *c != 501) {
            assert_eq!(
                classify_http_status(code),
                ResponseClass::Retryable,
                "status {code}"
            );
        }
    }

    #[test]
    fn test_http_not_implemented_not_retryable() {
        assert_eq!(classify_http_status(501), ResponseClass::NonRetryable);
    }

    #[test]
    fn test_http_client_errors_not_retryable() {
        assert_eq!(classify_http_status(400), ResponseClass::NonRetryable);
        assert_eq!(classify_http_status(401), ResponseClass::NonRetryable);
        assert_eq!(classify_http_status(403), ResponseClass::NonRetryable);
        assert_eq!(classify_http_status(404), ResponseClass::NonRetryable);
        assert_eq!(classify_http_status(413), ResponseClass::NonRetryable);
    }

    #[test]
    fn test_http_redirects_not_retryable() {
        assert_eq!(classify_http_status(301), ResponseClass::NonRetryable);
        assert_eq!(classify_http_status(302), ResponseClass::NonRetryable);
    }
}
