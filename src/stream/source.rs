use std::pin::Pin;

use futures::future::BoxFuture;
use futures::Stream;

use crate::errors::StreamError;
use crate::types::StreamContext;

/// One container's raw lines; finite in snapshot mode, unbounded in follow
/// mode. Dropping the stream must close the underlying transport.
pub type LogLines = Pin<Box<dyn Stream<Item = Result<String, StreamError>> + Send>>;

/// Where producers read lines from. The cluster client is the real
/// implementation; the dev source and the manager tests provide others.
pub trait LogSource: Send + Sync {
    fn open(&self, ctx: &StreamContext) -> BoxFuture<'static, Result<LogLines, StreamError>>;
}
