//! Query extractor that applies `HasDefaults` after parsing.

use axum::async_trait;
use axum::extract::rejection::QueryRejection;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use crate::domain::HasDefaults;

/// Like `Query<T>`, with `T::apply_defaults` run on the parsed value.
#[derive(Debug, Clone)]
pub struct DefaultedQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for DefaultedQuery<T>
where
    T: DeserializeOwned + HasDefaults + Send,
    S: Send + Sync,
{
    type Rejection = QueryRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(mut value) = Query::<T>::from_request_parts(parts, state).await?;
        value.apply_defaults();
        Ok(Self(value))
    }
}
