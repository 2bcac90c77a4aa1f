//! Shared helpers for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use pypeline::{
    Context, MemoryLoader, PipelineError, PipelineResult, PipelineRunner, StepLogic, Value,
};
use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Once};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

/// Collected log events, shared with the layer that fills it.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages recorded at `level`, in order.
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn infos(&self) -> Vec<String> {
        self.messages_at(Level::INFO)
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages_at(Level::ERROR)
    }
}

thread_local! {
    /// The capture active on this thread, if any. Per-thread so that tests
    /// running in parallel (each on its own thread) never see each other's
    /// log lines.
    static ACTIVE_CAPTURE: RefCell<Option<LogCapture>> = const { RefCell::new(None) };
}

/// A single process-wide layer that forwards each event to whatever capture is
/// active on the emitting thread. A thread-local `set_default` subscriber would
/// be simpler, but tracing's max-level gate and callsite-interest cache are
/// process-global: parallel tests setting and dropping their own thread-local
/// defaults race on that global state and intermittently drop events. One
/// global subscriber keeps the gate permanently open and routes by thread.
struct RoutingCaptureLayer;

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for RoutingCaptureLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        struct MessageVisitor<'a>(&'a mut String);

        impl tracing::field::Visit for MessageVisitor<'_> {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    use std::fmt::Write;
                    let _ = write!(self.0, "{:?}", value);
                }
            }
        }

        ACTIVE_CAPTURE.with(|slot| {
            if let Some(capture) = slot.borrow().as_ref() {
                let mut message = String::new();
                event.record(&mut MessageVisitor(&mut message));
                capture
                    .events
                    .lock()
                    .unwrap()
                    .push((*event.metadata().level(), message));
            }
        });
    }
}

static INSTALL: Once = Once::new();

/// Install a capturing subscriber for the current thread.
///
/// Keep the guard alive for as long as log lines should be collected.
pub fn capture_logs() -> (LogCapture, CaptureGuard) {
    INSTALL.call_once(|| {
        let subscriber = tracing_subscriber::registry().with(RoutingCaptureLayer);
        // Ignore the error if a global default is already set.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });

    let capture = LogCapture::new();
    ACTIVE_CAPTURE.with(|slot| *slot.borrow_mut() = Some(capture.clone()));
    (capture, CaptureGuard)
}

/// Clears this thread's active capture when dropped.
pub struct CaptureGuard;

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        ACTIVE_CAPTURE.with(|slot| *slot.borrow_mut() = None);
    }
}

/// Step that sets a fixed key to a fixed value.
pub struct MarkStep {
    pub key: &'static str,
    pub value: &'static str,
}

#[async_trait]
impl StepLogic for MarkStep {
    async fn run_step(
        &self,
        context: &mut Context,
        _runner: &PipelineRunner,
    ) -> PipelineResult<()> {
        context.set(self.key, self.value);
        Ok(())
    }
}

/// One observation a [`ProbeStep`] took of its running context.
#[derive(Debug, Clone)]
pub struct Observation {
    pub value: Option<Value>,
    pub working_dir: PathBuf,
    pub pipeline: String,
}

/// Step that records what its context looked like when it ran.
pub struct ProbeStep {
    pub key: &'static str,
    pub observations: Arc<Mutex<Vec<Observation>>>,
}

impl ProbeStep {
    pub fn new(key: &'static str) -> (Self, Arc<Mutex<Vec<Observation>>>) {
        let observations = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                key,
                observations: observations.clone(),
            },
            observations,
        )
    }
}

#[async_trait]
impl StepLogic for ProbeStep {
    async fn run_step(
        &self,
        context: &mut Context,
        _runner: &PipelineRunner,
    ) -> PipelineResult<()> {
        self.observations.lock().unwrap().push(Observation {
            value: context.get(self.key).cloned(),
            working_dir: context.working_dir().to_path_buf(),
            pipeline: context.current_pipeline().to_string(),
        });
        Ok(())
    }
}

/// Step that appends a label to a shared trace.
pub struct TraceStep {
    pub label: &'static str,
    pub trace: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl StepLogic for TraceStep {
    async fn run_step(
        &self,
        _context: &mut Context,
        _runner: &PipelineRunner,
    ) -> PipelineResult<()> {
        self.trace.lock().unwrap().push(self.label);
        Ok(())
    }
}

/// Step that always fails with the given kind and message.
pub struct FailStep {
    pub kind: &'static str,
    pub message: &'static str,
}

#[async_trait]
impl StepLogic for FailStep {
    async fn run_step(
        &self,
        _context: &mut Context,
        _runner: &PipelineRunner,
    ) -> PipelineResult<()> {
        Err(PipelineError::step_failed(self.kind, self.message))
    }
}

/// Step that raises the stop signal.
pub struct StopStep;

#[async_trait]
impl StepLogic for StopStep {
    async fn run_step(
        &self,
        _context: &mut Context,
        _runner: &PipelineRunner,
    ) -> PipelineResult<()> {
        Err(PipelineError::Stop)
    }
}

/// Build a runner over the given pipelines, registering extra steps.
pub fn runner_with_pipelines(
    pipelines: &[(&str, &str)],
    extra_steps: Vec<(&'static str, Arc<dyn StepLogic>)>,
) -> PipelineRunner {
    let mut loader = MemoryLoader::new();
    for (name, yaml) in pipelines {
        loader
            .insert_yaml(name, yaml)
            .unwrap_or_else(|err| panic!("bad test pipeline '{}': {}", name, err));
    }
    let mut runner = PipelineRunner::new(Arc::new(loader));
    for (name, logic) in extra_steps {
        runner.steps_mut().register(name, logic);
    }
    runner
}
