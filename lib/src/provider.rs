use futures::future::BoxFuture;

use crate::{
    error::Error,
    types::{HistoryRequest, Series},
};

/// Source of daily price history.
///
/// An empty [`Series`] means the provider knows nothing for the requested
/// range; errors are reserved for failed requests.
pub trait Provider {
    fn fetch_history<'a>(
        &'a self,
        request: &'a HistoryRequest<'a>,
    ) -> BoxFuture<'a, Result<Series, Error>>;
}
