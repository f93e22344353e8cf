use crate::error::FetchError;
use crate::source::{FieldSource, FlatDocument, parse_flat_document};
use reqwest::blocking::Client;
use reqwest::redirect::Policy;

pub const DEFAULT_URL_PREFIX: &str = "https://raw.githubusercontent.com/elastic/ecs";
const URL_SUFFIX: &str = "generated/ecs/ecs_flat.yml";
const MAX_REDIRECTS: usize = 10;

/// Fetches `<prefix>/<version>/generated/ecs/ecs_flat.yml`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
}

impl HttpSource {
    pub fn new(prefix: &str, version: &str) -> Self {
        Self {
            url: flat_file_url(prefix, version),
        }
    }

    fn transport(&self, source: reqwest::Error) -> FetchError {
        if source.is_redirect() {
            FetchError::TooManyRedirects {
                url: self.url.clone(),
                limit: MAX_REDIRECTS,
            }
        } else {
            FetchError::Transport {
                url: self.url.clone(),
                source,
            }
        }
    }
}

impl FieldSource for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch(&self) -> Result<FlatDocument, FetchError> {
        let client = Client::builder()
            .redirect(Policy::limited(MAX_REDIRECTS))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| self.transport(e))?;

        let res = client.get(&self.url).send().map_err(|e| self.transport(e))?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: res.url().to_string(),
                status: status.as_u16(),
            });
        }

        let body = res.text().map_err(|e| self.transport(e))?;
        parse_flat_document(&body, &self.url)
    }
}

fn flat_file_url(prefix: &str, version: &str) -> String {
    format!("{}/{}/{}", prefix.trim_end_matches('/'), version, URL_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Mock, Server};
    use pretty_assertions::assert_eq;

    const FLAT_PATH: &str = "/v8.0.0/generated/ecs/ecs_flat.yml";

    /// `hops` redirects from the flat file path, ending in a 200 with `body`.
    fn redirect_chain(server: &mut Server, hops: usize, body: &str) -> Vec<Mock> {
        let base = server.url();
        let mut mocks = Vec::new();
        let mut from = FLAT_PATH.to_string();
        for hop in 1..=hops {
            let to = format!("/hop/{}", hop);
            mocks.push(
                server
                    .mock("GET", from.as_str())
                    .with_status(302)
                    .with_header("location", &format!("{}{}", base, to))
                    .create(),
            );
            from = to;
        }
        mocks.push(
            server
                .mock("GET", from.as_str())
                .with_status(200)
                .with_body(body)
                .create(),
        );
        mocks
    }

    #[test]
    fn builds_versioned_url() {
        assert_eq!(
            HttpSource::new(DEFAULT_URL_PREFIX, "v1.5.0").describe(),
            "https://raw.githubusercontent.com/elastic/ecs/v1.5.0/generated/ecs/ecs_flat.yml"
        );
        assert_eq!(
            HttpSource::new("http://mirror.local/ecs/", "main").describe(),
            "http://mirror.local/ecs/main/generated/ecs/ecs_flat.yml"
        );
    }

    #[test]
    fn fetches_and_parses_flat_file() {
        let mut server = Server::new();
        let _mocks = redirect_chain(&mut server, 0, "a.b:\n  type: keyword\n");

        let doc = HttpSource::new(&server.url(), "v8.0.0").fetch().unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc["a.b"].type_name, "keyword");
    }

    #[test]
    fn follows_redirects_up_to_the_limit() {
        let mut server = Server::new();
        let _mocks = redirect_chain(&mut server, MAX_REDIRECTS, "a.b:\n  type: keyword\n");

        let doc = HttpSource::new(&server.url(), "v8.0.0").fetch().unwrap();
        assert!(doc.contains_key("a.b"));
    }

    #[test]
    fn redirect_loop_past_the_limit_is_reported() {
        let mut server = Server::new();
        let _mocks = redirect_chain(&mut server, MAX_REDIRECTS + 1, "a.b:\n  type: keyword\n");
        let source = HttpSource::new(&server.url(), "v8.0.0");

        let err = source.fetch().unwrap_err();
        match err {
            FetchError::TooManyRedirects { url, limit } => {
                assert_eq!(url, source.describe());
                assert_eq!(limit, 10);
            }
            other => panic!("expected TooManyRedirects, got {:?}", other),
        }
    }

    #[test]
    fn missing_version_is_a_status_error() {
        let mut server = Server::new();
        let _mock = server.mock("GET", FLAT_PATH).with_status(404).create();
        let source = HttpSource::new(&server.url(), "v8.0.0");

        let err = source.fetch().unwrap_err();
        assert!(err.to_string().contains("HTTP 404"));
        match err {
            FetchError::Status { url, status } => {
                assert_eq!(status, 404);
                assert_eq!(url, source.describe());
            }
            other => panic!("expected Status, got {:?}", other),
        }
    }

    #[test]
    fn non_yaml_body_is_a_decode_error() {
        let mut server = Server::new();
        let _mocks = redirect_chain(&mut server, 0, "a.b: [unterminated\n");

        let err = HttpSource::new(&server.url(), "v8.0.0").fetch().unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }
}
