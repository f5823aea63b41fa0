//! Translation of engine events into protocol events.

use std::sync::Arc;

use dap_types::events::{
    Event, OutputCategory, OutputEventBody, StoppedEventBody, StoppedReason,
};
use dap_types::types::MAIN_THREAD_ID;
use engine::{EngineEvent, Span, StopEvent, StopReason};
use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::writer::OutputWriter;

/// Where the engine is suspended, shared between the multiplexer and the
/// request handlers.
pub(crate) type CurrentLocation = Arc<RwLock<Option<Span>>>;

pub(crate) struct EventMultiplexer {
    events: UnboundedReceiver<EngineEvent>,
    output: OutputWriter,
    current: CurrentLocation,
    cancel: CancellationToken,
}

impl EventMultiplexer {
    pub fn new(
        events: UnboundedReceiver<EngineEvent>,
        output: OutputWriter,
        current: CurrentLocation,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            events,
            output,
            current,
            cancel,
        }
    }

    /// Forward events until the engine reports an exit, its channel closes,
    /// or the session is cancelled.
    pub async fn run(mut self) {
        loop {
            // queued events go out before cancellation is noticed
            tokio::select! {
                biased;
                event = self.events.recv() => match event {
                    Some(EngineEvent::Stop(stop)) => self.on_stop(stop).await,
                    Some(EngineEvent::Exit { output, error }) => {
                        self.on_exit(output, error).await;
                        break;
                    }
                    None => {
                        tracing::debug!("engine event channel closed");
                        break;
                    }
                },
                _ = self.cancel.cancelled() => {
                    tracing::debug!("event multiplexer cancelled");
                    break;
                }
            }
        }
    }

    async fn on_stop(&self, stop: StopEvent) {
        tracing::debug!(reason = ?stop.reason, at = %stop.current, "engine stopped");
        *self.current.write().await = Some(stop.current);

        let reason = match stop.reason {
            StopReason::Breakpoint => StoppedReason::Breakpoint,
            StopReason::Step => StoppedReason::Step,
            StopReason::Exception => StoppedReason::Exception,
        };
        let text = match stop.reason {
            StopReason::Exception => stop.error,
            _ => None,
        };
        self.output.enqueue(dap_types::event(&Event::Stopped(StoppedEventBody {
            reason,
            thread_id: MAIN_THREAD_ID,
            all_threads_stopped: true,
            text,
        })));
    }

    async fn on_exit(&self, output: String, error: Option<String>) {
        tracing::debug!(?error, "engine exited");
        *self.current.write().await = None;

        if !output.is_empty() {
            self.output.enqueue(dap_types::event(&Event::Output(OutputEventBody {
                category: OutputCategory::Stdout,
                output: with_newline(output),
            })));
        }
        if let Some(error) = error {
            self.output.enqueue(dap_types::event(&Event::Output(OutputEventBody {
                category: OutputCategory::Stderr,
                output: with_newline(error),
            })));
        }
        self.output.enqueue(dap_types::event(&Event::Terminated));
    }
}

fn with_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
