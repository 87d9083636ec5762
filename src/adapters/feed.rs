use std::pin::Pin;

use reqwest::StatusCode;

use crate::feed::{self, FeedError, FeedQuery};
use crate::ports::feed::EventFeed;
use crate::types::event::SeismicEvent;

use super::REQUEST_TIMEOUT;

/// FDSN event web-service client.
#[derive(Debug, Clone)]
pub struct FdsnFeedClient {
    client: reqwest::Client,
    url: String,
}

impl FdsnFeedClient {
    pub fn new(url: impl Into<String>) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("safequake/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn fetch_events(&self, query: &FeedQuery) -> Result<Vec<SeismicEvent>, FeedError> {
        let response = self
            .client
            .get(&self.url)
            .query(&query.query_pairs())
            .send()
            .await?;

        // FDSN services answer 204 when nothing matches the query.
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(FeedError::HttpStatus(response.status().as_u16()));
        }

        let body = response.text().await?;
        feed::parse_events(&body)
    }
}

impl EventFeed for FdsnFeedClient {
    type Error = FeedError;
    type Fut<'a>
        = Pin<Box<dyn Future<Output = Result<Vec<SeismicEvent>, Self::Error>> + Send + 'a>>
    where
        Self: 'a;

    fn fetch<'a>(&'a self, query: &'a FeedQuery) -> Self::Fut<'a> {
        Box::pin(self.fetch_events(query))
    }
}
