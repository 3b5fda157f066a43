use std::any::type_name;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};

use super::{CommandError, CommandHandler};

/// Wraps a handler into one with added behaviour.
pub trait Middleware<C: Send + Sync>: Send + Sync {
    fn wrap(&self, next: Arc<dyn CommandHandler<C>>) -> Arc<dyn CommandHandler<C>>;
}

/// Apply `middleware` around `handler`, first element outermost.
pub fn chain<C: Send + Sync>(
    handler: Arc<dyn CommandHandler<C>>,
    middleware: &[Arc<dyn Middleware<C>>],
) -> Arc<dyn CommandHandler<C>> {
    middleware
        .iter()
        .rev()
        .fold(handler, |next, layer| layer.wrap(next))
}

/// Counter for handled commands, labelled by `command` and `outcome` (ok|error)
pub const COMMANDS_HANDLED: &str = "advert_indexer_commands_total";

/// Histogram for command handling time in seconds, labelled by `command`
pub const COMMAND_DURATION: &str = "advert_indexer_command_duration_seconds";

/// Runs each command in a span, logs its duration and outcome and records
/// them as metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

impl<C> Middleware<C> for TracingMiddleware
where
    C: Debug + Send + Sync + 'static,
{
    fn wrap(&self, next: Arc<dyn CommandHandler<C>>) -> Arc<dyn CommandHandler<C>> {
        Arc::new(Traced {
            next,
            _command: PhantomData,
        })
    }
}

struct Traced<C: Send + Sync> {
    next: Arc<dyn CommandHandler<C>>,
    _command: PhantomData<fn(C)>,
}

fn short_name<C>() -> &'static str {
    let full = type_name::<C>();
    full.rsplit("::").next().unwrap_or(full)
}

#[async_trait]
impl<C> CommandHandler<C> for Traced<C>
where
    C: Debug + Send + Sync + 'static,
{
    async fn handle(&self, command: &C) -> Result<(), CommandError> {
        let span = info_span!("command", name = short_name::<C>(), command = ?command);
        async {
            let started = Instant::now();
            let result = self.next.handle(command).await;
            let elapsed = started.elapsed();
            let elapsed_ms = elapsed.as_millis() as u64;
            let outcome = match &result {
                Ok(()) => {
                    info!(elapsed_ms, "Command handled");
                    "ok"
                }
                Err(e) => {
                    warn!(elapsed_ms, error = %e, "Command failed");
                    "error"
                }
            };
            metrics::counter!(COMMANDS_HANDLED, "command" => short_name::<C>(), "outcome" => outcome).increment(1);
            metrics::histogram!(COMMAND_DURATION, "command" => short_name::<C>()).record(elapsed.as_secs_f64());
            result
        }
        .instrument(span)
        .await
    }
}
