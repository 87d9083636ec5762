use crate::feed::FeedQuery;
use crate::types::event::SeismicEvent;

pub trait EventFeed: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type Fut<'a>: Future<Output = Result<Vec<SeismicEvent>, Self::Error>> + Send + 'a
    where
        Self: 'a;

    fn fetch<'a>(&'a self, query: &'a FeedQuery) -> Self::Fut<'a>;
}
