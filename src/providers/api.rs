use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::server_info::{APP_NAME, APP_VERSION};

use super::ProviderError;

pub(crate) fn create_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::ClientBuilder::new()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .user_agent(format!("{APP_NAME}/{APP_VERSION}"))
        .build()
        .map_err(ProviderError::Request)
}

pub(crate) fn parse_base_url(value: &str) -> Result<Url, ProviderError> {
    let url = Url::parse(value).map_err(|_| ProviderError::InvalidBaseUrl(value.into()))?;
    if url.cannot_be_a_base() {
        return Err(ProviderError::InvalidBaseUrl(value.into()));
    }

    Ok(url)
}

/// Append percent-encoded path segments to `base`.
///
/// A segment containing `/` is encoded as a single segment (`%2F`).
pub(crate) fn api_url<'a, I>(base: &Url, segments: I) -> Result<Url, ProviderError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ProviderError::InvalidBaseUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Split a repository file path into URL segments.
pub(crate) fn file_segments(path: &str) -> impl Iterator<Item = &str> {
    path.trim_start_matches('/').split('/')
}

pub(crate) async fn send(request: RequestBuilder) -> Result<Response, ProviderError> {
    request
        .send()
        .await
        .map_err(ProviderError::Request)?
        .error_for_status()
        .map_err(ProviderError::BadStatusCode)
}

pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    send(request)
        .await?
        .json()
        .await
        .map_err(ProviderError::MalformedResponse)
}

/// Fetch raw file content, mapping a 404 to [`ProviderError::FileNotFound`].
pub(crate) async fn fetch_file(
    request: RequestBuilder,
    path: &str,
    reference: &str,
) -> Result<Vec<u8>, ProviderError> {
    let response = request.send().await.map_err(ProviderError::Request)?;

    if response.status() == StatusCode::NOT_FOUND {
        return Err(ProviderError::FileNotFound {
            path: path.into(),
            reference: reference.into(),
        });
    }

    let bytes = response
        .error_for_status()
        .map_err(ProviderError::BadStatusCode)?
        .bytes()
        .await
        .map_err(ProviderError::MalformedResponse)?;

    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{api_url, file_segments, parse_base_url};

    #[test]
    fn test_api_url_encodes_nested_segments() {
        let base = parse_base_url("https://gitlab.example.com/").unwrap();
        let url = api_url(
            &base,
            ["api", "v4", "projects", "group/sub/repo", "repository", "files"],
        )
        .unwrap();

        assert_eq!(
            url.as_str(),
            "https://gitlab.example.com/api/v4/projects/group%2Fsub%2Frepo/repository/files"
        );
    }

    #[test]
    fn test_api_url_keeps_base_path() {
        let base = parse_base_url("https://example.com/gitea").unwrap();
        let url = api_url(&base, ["api", "v1"]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/gitea/api/v1");
    }

    #[test]
    fn test_file_segments() {
        let segments: Vec<_> = file_segments("/deploy/app.yaml").collect();
        assert_eq!(segments, vec!["deploy", "app.yaml"]);
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(parse_base_url("not a url").is_err());
        assert!(parse_base_url("mailto:someone@example.com").is_err());
    }
}
