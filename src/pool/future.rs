//! Handle for requests dispatched by the `*_async` pool operations
use crate::core::Response;
use crate::error::{PoolError, PoolResult};
use futures::future::{self, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;

/// A request that is already on its way to an instance.
///
/// Routing happens when the operation is called; awaiting the future only
/// collects the response. Routing and usage errors are delivered as an
/// already-completed future.
pub struct ResponseFuture {
    inner: BoxFuture<'static, PoolResult<Response>>,
}

impl ResponseFuture {
    pub(crate) fn spawned(handle: JoinHandle<PoolResult<Response>>) -> Self {
        let inner = handle
            .map(|joined| match joined {
                Ok(result) => result,
                Err(e) => Err(PoolError::internal(format!("request task failed: {}", e))),
            })
            .boxed();
        Self { inner }
    }

    pub(crate) fn failed(error: PoolError) -> Self {
        Self {
            inner: future::ready(Err(error)).boxed(),
        }
    }

    /// Wait for the response and decode it into `T`.
    pub async fn get_typed<T: DeserializeOwned>(self) -> PoolResult<T> {
        let response = self.await?;
        Ok(response.decode()?)
    }
}

impl Future for ResponseFuture {
    type Output = PoolResult<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for ResponseFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseFuture").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_ready, task};

    #[test]
    fn test_failed_future_is_ready() {
        let mut fut = task::spawn(ResponseFuture::failed(PoolError::NoRwInstance));
        let result = assert_ready!(fut.poll());
        assert!(matches!(result, Err(PoolError::NoRwInstance)));
    }

    #[tokio::test]
    async fn test_spawned_future_resolves() {
        let handle = tokio::spawn(async { Ok(Response::new(vec![json!([1, "a"])])) });
        let rows: Vec<(u32, String)> = ResponseFuture::spawned(handle).get_typed().await.unwrap();
        assert_eq!(rows, vec![(1, "a".to_string())]);
    }

    #[tokio::test]
    async fn test_spawned_future_reports_panicked_task() {
        let handle = tokio::spawn(async {
            if true {
                panic!("boom");
            }
            Ok(Response::default())
        });
        let result = ResponseFuture::spawned(handle).await;
        assert!(matches!(result, Err(PoolError::Internal { .. })));
    }
}
