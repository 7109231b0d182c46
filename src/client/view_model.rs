//! Turn a stream of screen inputs into a stream of screen outputs.
//!
//! Each screen gets one owning task. The view model and its cached state live
//! inside that task, so state is only mutated there. Collaborator calls run on
//! the runtime with a deadline and report back to the owning task, which
//! updates the cache before emitting the matching output.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{Id, JoinHandle, JoinSet};
use tokio::time::{error::Elapsed, timeout};

use crate::client::usecase::ClientError;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_OUTPUT_BUFFER: usize = 32;

/// What went wrong in a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Timeout,
    Unauthorized,
    Validation,
    Server,
    NotImplemented,
    Decode,
}

/// Operation that could not complete, reported as an output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub operation: &'static str,
    pub kind: FailureKind,
}

impl Failure {
    pub fn new(operation: &'static str, kind: FailureKind) -> Self {
        Self { operation, kind }
    }
}

/// Tuning of a screen's owning task.
#[derive(Debug, Clone, Copy)]
pub struct ScreenConfig {
    /// Deadline of every collaborator call.
    pub request_timeout: Duration,
    pub output_buffer: usize,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            output_buffer: DEFAULT_OUTPUT_BUFFER,
        }
    }
}

type Job<C> = Pin<Box<dyn Future<Output = Result<C, ClientError>> + Send>>;

/// Screen logic driven by its owning task.
pub trait ViewModel: Send + 'static {
    type Input: Debug + Send + 'static;
    type Output: Debug + Send + 'static;
    /// Result of a collaborator call, handed back to [`ViewModel::apply`].
    type Completion: Send + 'static;

    /// Dispatch one input to its handler.
    ///
    /// Synchronous outputs go through [`Context::emit`], collaborator calls
    /// through [`Context::spawn`].
    fn handle(&mut self, input: Self::Input, ctx: &mut Context<Self>);

    /// Update cached state with a finished call and produce its output.
    fn apply(&mut self, completion: Self::Completion) -> Self::Output;

    /// Output reporting a failed operation.
    fn failed(failure: Failure) -> Self::Output;
}

/// Work requested by a handler.
pub struct Context<V: ViewModel + ?Sized> {
    outputs: Vec<V::Output>,
    jobs: Vec<(&'static str, Job<V::Completion>)>,
}

impl<V: ViewModel + ?Sized> Default for Context<V> {
    fn default() -> Self {
        Self {
            outputs: Vec::new(),
            jobs: Vec::new(),
        }
    }
}

impl<V: ViewModel + ?Sized> Context<V> {
    /// Emit an output right away.
    pub fn emit(&mut self, output: V::Output) {
        self.outputs.push(output);
    }

    /// Run a collaborator call off the owning task.
    pub fn spawn<F>(&mut self, operation: &'static str, call: F)
    where
        F: Future<Output = Result<V::Completion, ClientError>> + Send + 'static,
    {
        self.jobs.push((operation, Box::pin(call)));
    }

    /// Outputs emitted so far.
    pub fn outputs(&self) -> &[V::Output] {
        &self.outputs
    }

    /// Names of the calls requested so far.
    pub fn operations(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|(operation, _)| *operation).collect()
    }
}

/// Output side of a running screen.
///
/// Dropping it stops the owning task and every call still in flight.
pub struct Screen<O> {
    outputs: mpsc::Receiver<O>,
    task: JoinHandle<()>,
}

impl<O> Screen<O> {
    /// Next output, `None` once inputs are closed and in-flight calls drained.
    pub async fn next(&mut self) -> Option<O> {
        self.outputs.recv().await
    }
}

impl<O> Drop for Screen<O> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

type Finished<C> = Result<Result<C, ClientError>, Elapsed>;

/// Start the owning task of a screen.
///
/// Outputs of concurrent calls are emitted in completion order.
pub fn transform<V: ViewModel>(
    mut view_model: V,
    mut inputs: mpsc::Receiver<V::Input>,
    config: ScreenConfig,
) -> Screen<V::Output> {
    let (sender, outputs) = mpsc::channel(config.output_buffer.max(1));

    let task = tokio::spawn(async move {
        let mut jobs: JoinSet<Finished<V::Completion>> = JoinSet::new();
        let mut operations: HashMap<Id, &'static str> = HashMap::new();
        let mut open = true;

        loop {
            tokio::select! {
                input = inputs.recv(), if open => {
                    let Some(input) = input else {
                        open = false;
                        continue;
                    };
                    tracing::debug!(?input, "screen input");

                    let mut ctx = Context::default();
                    view_model.handle(input, &mut ctx);

                    for (operation, job) in ctx.jobs {
                        let handle = jobs.spawn(timeout(config.request_timeout, job));
                        operations.insert(handle.id(), operation);
                    }
                    for output in ctx.outputs {
                        if sender.send(output).await.is_err() {
                            return;
                        }
                    }
                },
                Some(joined) = jobs.join_next_with_id(), if !jobs.is_empty() => {
                    let (id, finished) = match joined {
                        Ok((id, finished)) => (id, Ok(finished)),
                        Err(err) => (err.id(), Err(err)),
                    };
                    let operation = operations.remove(&id).unwrap_or("unknown");

                    let output = match finished {
                        Ok(Ok(Ok(completion))) => view_model.apply(completion),
                        Ok(Ok(Err(err))) => {
                            tracing::warn!(operation, error = %err, "collaborator call failed");
                            V::failed(Failure::new(operation, err.kind()))
                        },
                        Ok(Err(_)) => {
                            tracing::warn!(operation, "collaborator call timed out");
                            V::failed(Failure::new(operation, FailureKind::Timeout))
                        },
                        Err(err) => {
                            tracing::error!(operation, error = %err, "collaborator call panicked");
                            V::failed(Failure::new(operation, FailureKind::Server))
                        },
                    };

                    if sender.send(output).await.is_err() {
                        return;
                    }
                },
                else => break,
            }
        }
    });

    Screen { outputs, task }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    /// Echoes inputs, delaying them by the given milliseconds.
    struct Echo {
        seen: usize,
        dropped: Arc<AtomicBool>,
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    impl ViewModel for Echo {
        type Input = u64;
        type Output = Result<u64, Failure>;
        type Completion = u64;

        fn handle(&mut self, input: u64, ctx: &mut Context<Self>) {
            match input {
                0 => ctx.emit(Ok(0)),
                u64::MAX => ctx.spawn("fail", async { Err(ClientError::Status(500)) }),
                delay => {
                    let guard = SetOnDrop(Arc::clone(&self.dropped));
                    ctx.spawn("echo", async move {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        drop(guard);
                        Ok(delay)
                    })
                },
            }
        }

        fn apply(&mut self, completion: u64) -> Self::Output {
            self.seen += 1;
            Ok(completion)
        }

        fn failed(failure: Failure) -> Self::Output {
            Err(failure)
        }
    }

    fn echo() -> (Echo, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        let echo = Echo {
            seen: 0,
            dropped: Arc::clone(&dropped),
        };
        (echo, dropped)
    }

    #[tokio::test]
    async fn test_outputs_follow_completion_order() {
        let (inputs, receiver) = mpsc::channel(8);
        let mut screen = transform(echo().0, receiver, ScreenConfig::default());

        inputs.send(80).await.unwrap();
        inputs.send(10).await.unwrap();
        inputs.send(0).await.unwrap();
        drop(inputs);

        assert_eq!(screen.next().await, Some(Ok(0)));
        assert_eq!(screen.next().await, Some(Ok(10)));
        assert_eq!(screen.next().await, Some(Ok(80)));
        // Inputs closed and nothing left in flight.
        assert_eq!(screen.next().await, None);
    }

    #[tokio::test]
    async fn test_errors_become_failures() {
        let (inputs, receiver) = mpsc::channel(8);
        let mut screen = transform(echo().0, receiver, ScreenConfig::default());

        inputs.send(u64::MAX).await.unwrap();
        assert_eq!(
            screen.next().await,
            Some(Err(Failure::new("fail", FailureKind::Server)))
        );
    }

    #[tokio::test]
    async fn test_deadline_becomes_timeout() {
        let (inputs, receiver) = mpsc::channel(8);
        let config = ScreenConfig {
            request_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let mut screen = transform(echo().0, receiver, config);

        inputs.send(5_000).await.unwrap();
        assert_eq!(
            screen.next().await,
            Some(Err(Failure::new("echo", FailureKind::Timeout)))
        );
    }

    #[tokio::test]
    async fn test_dropping_screen_cancels_calls() {
        let (echo, dropped) = echo();
        let (inputs, receiver) = mpsc::channel(8);
        let screen = transform(echo, receiver, ScreenConfig::default());

        inputs.send(60_000).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!dropped.load(Ordering::SeqCst));

        drop(screen);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(dropped.load(Ordering::SeqCst));
        assert!(inputs.is_closed());
    }
}
