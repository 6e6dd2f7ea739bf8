//! Connector layer that counts established connections

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};

/// Running total of connections opened by one engine client.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConnectCounter(Arc<AtomicU64>);

impl ConnectCounter {
    pub(crate) fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn record(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CountConnectsLayer {
    counter: ConnectCounter,
}

impl CountConnectsLayer {
    pub(crate) fn new(counter: ConnectCounter) -> Self {
        Self { counter }
    }
}

impl<S> Layer<S> for CountConnectsLayer {
    type Service = CountConnects<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CountConnects {
            inner,
            counter: self.counter.clone(),
        }
    }
}

/// Wraps the engine's connector; bumps the counter once per successful connect.
#[derive(Debug, Clone)]
pub(crate) struct CountConnects<S> {
    inner: S,
    counter: ConnectCounter,
}

impl<S, R> Service<R> for CountConnects<S>
where
    S: Service<R>,
    S::Future: Send + 'static,
    S::Response: 'static,
    S::Error: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: R) -> Self::Future {
        let counter = self.counter.clone();
        let connecting = self.inner.call(req);
        Box::pin(async move {
            let conn = connecting.await?;
            counter.record();
            Ok(conn)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_counts_only_successful_connects() {
        let counter = ConnectCounter::default();
        let layer = CountConnectsLayer::new(counter.clone());

        let ok = layer.layer(tower::service_fn(|n: u32| async move { Ok::<_, Infallible>(n) }));
        assert_eq!(ok.clone().oneshot(1).await.unwrap(), 1);
        assert_eq!(ok.oneshot(2).await.unwrap(), 2);
        assert_eq!(counter.get(), 2);

        let failing = layer.layer(tower::service_fn(|_: u32| async { Err::<u32, _>("refused") }));
        assert!(failing.oneshot(3).await.is_err());
        assert_eq!(counter.get(), 2);
    }
}
