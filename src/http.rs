use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use url::Url;

use crate::error::ClientError;
use crate::model::{SearchResult, SearchType};

/// REST side of the audio server. Only used for resolving tracks.
pub struct Http {
    client: reqwest::Client,
    pub base_url: String,
}

impl Http {
    pub fn new(
        authorization: &str,
        user_agent: Option<&str>,
        base_url: String,
    ) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(authorization).map_err(|_| ClientError::InvalidHeader("Authorization"))?,
        );
        if let Some(agent) = user_agent {
            headers.insert(
                USER_AGENT,
                HeaderValue::from_str(agent).map_err(|_| ClientError::InvalidHeader("User-Agent"))?,
            );
        }

        Ok(Self {
            client: reqwest::Client::builder().default_headers(headers).build()?,
            base_url,
        })
    }

    pub fn load_tracks_url(&self, search_type: SearchType, query: &str) -> Result<Url, ClientError> {
        let mut url = Url::parse(&format!("{}/loadtracks", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("identifier", &search_type.identifier(query));
        Ok(url)
    }

    pub async fn load_tracks(
        &self,
        search_type: SearchType,
        query: &str,
    ) -> Result<SearchResult, ClientError> {
        if query.is_empty() {
            return Err(ClientError::EmptyQuery);
        }
        let url = self.load_tracks_url(search_type, query)?;
        debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        Ok(response.json().await?)
    }
}
