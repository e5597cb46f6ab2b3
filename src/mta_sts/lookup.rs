use std::time::Duration;

use reqwest::redirect;

use crate::USER_AGENT;

use super::{Error, Policy};

impl Policy {
    /// Fetches and parses `https://mta-sts.<domain>/.well-known/mta-sts.txt`.
    ///
    /// Policies are only valid when served with HTTP 200 and a `text/plain`
    /// media type; 3xx redirects MUST NOT be followed (RFC 8461 §3.3), so a
    /// redirect response fails the fetch. Returns the parsed policy together
    /// with the raw body.
    pub async fn fetch(domain: &str, timeout: Duration) -> Result<(Policy, String), Error> {
        let response = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()?
            .get(&format!(
                "https://mta-sts.{domain}/.well-known/mta-sts.txt"
            ))
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(Error::UnexpectedStatus(status));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        // Parameters such as charset are allowed, the base type is not
        // negotiable.
        if !content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .eq_ignore_ascii_case("text/plain")
        {
            return Err(Error::UnexpectedContentType(content_type));
        }

        let body = response.text().await?;
        Policy::parse(&body).map(|policy| (policy, body))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Http(value)
    }
}
