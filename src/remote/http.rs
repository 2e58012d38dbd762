use std::time::Duration;

use reqwest::blocking::Client;

use super::{decode_countries, CountrySource, FetchFailure, LoadOutcome};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Blocking client shared by the list fetch and flag downloads.
pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// GET `url` and return the body of a successful response.
pub fn get_bytes(client: &Client, url: &str) -> Result<Vec<u8>, FetchFailure> {
    let transport = |source| FetchFailure::Transport {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchFailure::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = response.bytes().map_err(transport)?;
    Ok(body.to_vec())
}

/// The public REST endpoint.
pub struct HttpSource {
    endpoint: String,
    client: Client,
}

impl HttpSource {
    pub fn new(endpoint: impl Into<String>, client: Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }
}

impl CountrySource for HttpSource {
    fn describe(&self) -> String {
        self.endpoint.clone()
    }

    fn load_all(&self) -> LoadOutcome {
        let body = get_bytes(&self.client, &self.endpoint)?;
        decode_countries(&self.endpoint, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_names_the_crate() {
        assert!(USER_AGENT.starts_with("countrydex/"));
    }

    #[test]
    fn test_unreachable_endpoint_is_transport_failure() {
        let client = build_client(Duration::from_millis(500)).unwrap();
        // Port 9 on loopback: discard service, normally closed
        let source = HttpSource::new("http://127.0.0.1:9/v3.1/all", client);
        let err = source.load_all().unwrap_err();
        assert!(matches!(err, FetchFailure::Transport { .. }), "got {err:?}");
        assert_eq!(source.describe(), "http://127.0.0.1:9/v3.1/all");
    }
}
