//! Once-per-process acquisition of a remote adapter.
//!
//! The first caller runs the connect future; its outcome, success or
//! failure, is cached for the lifetime of the handle. A cached failure is
//! reported again on every later use and never retried.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::catalog::{ErrorKind, Service};
use crate::speech::SpeechError;

type ConnectFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<Arc<T>, SpeechError>> + Send + Sync>;

pub struct LazyHandle<T: ?Sized> {
    service: Service,
    connect: ConnectFn<T>,
    slot: OnceCell<Result<Arc<T>, String>>,
    attempts: AtomicUsize,
}

impl<T: ?Sized + Send + Sync + 'static> LazyHandle<T> {
    pub fn new<F, Fut>(service: Service, connect: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, SpeechError>> + Send + 'static,
    {
        Self {
            service,
            connect: Box::new(move || connect().boxed()),
            slot: OnceCell::new(),
            attempts: AtomicUsize::new(0),
        }
    }

    /// A handle that is already acquired.
    pub fn ready(service: Service, handle: Arc<T>) -> Self {
        Self {
            service,
            connect: never_connect("handle was pre-acquired"),
            slot: OnceCell::new_with(Some(Ok(handle))),
            attempts: AtomicUsize::new(0),
        }
    }

    /// A handle whose acquisition has already failed.
    pub fn failed(service: Service, reason: impl Into<String>) -> Self {
        Self {
            service,
            connect: never_connect("handle already failed"),
            slot: OnceCell::new_with(Some(Err(reason.into()))),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn service(&self) -> Service {
        self.service
    }

    /// Number of connect attempts made so far (0 or 1).
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Return the cached handle, acquiring it on first use.
    pub async fn get(&self) -> Result<Arc<T>, ErrorKind> {
        let slot = self
            .slot
            .get_or_init(|| async {
                self.attempts.fetch_add(1, Ordering::Relaxed);
                match (self.connect)().await {
                    Ok(handle) => {
                        info!(service = %self.service, "connected to speech service");
                        Ok(handle)
                    }
                    Err(e) => {
                        error!(service = %self.service, error = %e, "could not connect to speech service");
                        Err(e.to_string())
                    }
                }
            })
            .await;

        match slot {
            Ok(handle) => Ok(handle.clone()),
            Err(reason) => {
                warn!(service = %self.service, %reason, "speech service unavailable (cached failure)");
                Err(ErrorKind::ConnectionFailed {
                    service: self.service,
                })
            }
        }
    }
}

fn never_connect<T: ?Sized + Send + Sync + 'static>(reason: &'static str) -> ConnectFn<T> {
    Box::new(move || async move { Err::<Arc<T>, _>(SpeechError::Decode(reason.to_string())) }.boxed())
}
