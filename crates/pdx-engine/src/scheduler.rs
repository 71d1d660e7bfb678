//! Debounced, version-guarded analysis of open documents.
//!
//! A single task owns every open document. Edits arrive as commands, each one
//! bumping the document's version and restarting its debounce timer. When the
//! timer fires the document is parsed on a blocking worker; the result comes
//! back to the owning task, which commits it to the cache and index, publishes
//! syntax diagnostics and starts the semantic phase on another worker.
//!
//! Every result carries the version it was computed for. Anything that comes
//! back for an older version is dropped, so a superseded edit never publishes.

use std::collections::HashMap;
use std::sync::Arc;

use pdx_parse::{Ast, Diagnostic};
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use crate::engine::{Engine, ParsedDocument};
use crate::orchestrator::Phase;
use crate::sink::{DiagnosticBatch, DiagnosticsSink};

/// Where a document is in its analysis cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentPhase {
    Idle,
    /// Waiting for the debounce timer.
    Scheduled,
    Parsing,
    AnalyzingSyntax,
    AnalyzingSemantic,
    Published,
}

/// A read-only view of an open document.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub uri: String,
    pub version: u64,
    pub phase: DocumentPhase,
    pub text: Arc<str>,
    /// The most recent committed parse. May lag behind `text`.
    pub ast: Option<Arc<Ast>>,
    /// Last version whose semantic batch was published.
    pub published_version: Option<u64>,
}

enum Command {
    Opened {
        uri: String,
        text: String,
    },
    Changed {
        uri: String,
        text: String,
    },
    Closed {
        uri: String,
    },
    Snapshot {
        uri: String,
        reply: oneshot::Sender<Option<DocumentSnapshot>>,
    },
}

enum Event {
    DebounceElapsed {
        uri: String,
        version: u64,
    },
    Parsed {
        uri: String,
        version: u64,
        result: Result<ParsedDocument, JoinError>,
    },
    Analyzed {
        uri: String,
        version: u64,
        result: Result<Vec<Diagnostic>, JoinError>,
    },
}

struct DocumentState {
    version: u64,
    text: Arc<str>,
    phase: DocumentPhase,
    ast: Option<Arc<Ast>>,
    timer: Option<JoinHandle<()>>,
    published_version: Option<u64>,
}

impl DocumentState {
    fn transition(&mut self, uri: &str, next: DocumentPhase) {
        trace!(uri, version = self.version, from = ?self.phase, to = ?next, "phase");
        self.phase = next;
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Handle to the scheduler task. Cheap to clone; the task stops once every
/// handle is dropped.
#[derive(Clone, Debug)]
pub struct Scheduler {
    commands: mpsc::UnboundedSender<Command>,
}

impl Scheduler {
    /// Start the scheduler on the current tokio runtime.
    pub fn spawn(engine: Arc<Engine>, sink: Arc<dyn DiagnosticsSink>) -> (Self, JoinHandle<()>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        let workers = engine.config().worker_count();
        let actor = Actor {
            permits: Arc::new(Semaphore::new(workers)),
            engine,
            sink,
            documents: HashMap::new(),
            next_version: 0,
            events,
        };
        info!(workers, "scheduler started");
        let handle = tokio::spawn(actor.run(command_rx, event_rx));
        (Self { commands }, handle)
    }

    pub fn on_opened(&self, uri: impl Into<String>, text: impl Into<String>) {
        self.send(Command::Opened {
            uri: uri.into(),
            text: text.into(),
        });
    }

    pub fn on_changed(&self, uri: impl Into<String>, text: impl Into<String>) {
        self.send(Command::Changed {
            uri: uri.into(),
            text: text.into(),
        });
    }

    pub fn on_closed(&self, uri: impl Into<String>) {
        self.send(Command::Closed { uri: uri.into() });
    }

    /// The document's current state, or `None` if it is not open.
    pub async fn snapshot(&self, uri: impl Into<String>) -> Option<DocumentSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot {
            uri: uri.into(),
            reply,
        });
        rx.await.ok().flatten()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("scheduler has stopped; dropping document event");
        }
    }
}

struct Actor {
    engine: Arc<Engine>,
    sink: Arc<dyn DiagnosticsSink>,
    permits: Arc<Semaphore>,
    documents: HashMap<String, DocumentState>,
    /// Shared by all documents so a reopened uri never reuses a version.
    next_version: u64,
    events: mpsc::UnboundedSender<Event>,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
        }
        for document in self.documents.values_mut() {
            document.cancel_timer();
        }
        info!("scheduler stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Opened { uri, text } => {
                debug!(uri = %uri, bytes = text.len(), "document opened");
                self.edit(uri, text);
            }
            Command::Changed { uri, text } => {
                if !self.documents.contains_key(&uri) {
                    debug!(uri = %uri, "change for unopened document; treating as open");
                }
                self.edit(uri, text);
            }
            Command::Closed { uri } => self.close(&uri),
            Command::Snapshot { uri, reply } => {
                let snapshot = self.documents.get(&uri).map(|doc| DocumentSnapshot {
                    uri: uri.clone(),
                    version: doc.version,
                    phase: doc.phase,
                    text: Arc::clone(&doc.text),
                    ast: doc.ast.clone(),
                    published_version: doc.published_version,
                });
                let _ = reply.send(snapshot);
            }
        }
    }

    /// Record new text and restart the debounce timer. Any timer or job
    /// still running for the previous version is superseded.
    fn edit(&mut self, uri: String, text: String) {
        self.next_version += 1;
        let version = self.next_version;
        let delay = self.engine.debounce().delay_for(text.len());

        let document = self.documents.entry(uri.clone()).or_insert_with(|| DocumentState {
            version,
            text: Arc::from(""),
            phase: DocumentPhase::Idle,
            ast: None,
            timer: None,
            published_version: None,
        });
        if document.phase != DocumentPhase::Idle {
            debug!(uri = %uri, superseded = document.version, version, "superseding pending analysis");
        }
        document.cancel_timer();
        document.version = version;
        document.text = Arc::from(text);
        document.transition(&uri, DocumentPhase::Scheduled);

        let events = self.events.clone();
        document.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::DebounceElapsed { uri, version });
        }));
        trace!(version, delay_ms = delay.as_millis() as u64, "debounce scheduled");
    }

    fn close(&mut self, uri: &str) {
        let Some(mut document) = self.documents.remove(uri) else {
            debug!(uri, "close for unopened document");
            return;
        };
        document.cancel_timer();
        let retracted = self.engine.retract(uri);
        self.sink.clear(uri);
        debug!(uri, version = document.version, retracted, "document closed");
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::DebounceElapsed { uri, version } => {
                let Some(document) = current(&mut self.documents, &uri, version) else {
                    return;
                };
                if document.phase != DocumentPhase::Scheduled {
                    return;
                }
                document.timer = None;
                document.transition(&uri, DocumentPhase::Parsing);

                let engine = Arc::clone(&self.engine);
                let text = Arc::clone(&document.text);
                let job_uri = uri.clone();
                self.run_job(
                    move || engine.parse_document(&job_uri, &text),
                    move |result| Event::Parsed {
                        uri,
                        version,
                        result,
                    },
                );
            }
            Event::Parsed {
                uri,
                version,
                result,
            } => self.on_parsed(uri, version, result),
            Event::Analyzed {
                uri,
                version,
                result,
            } => self.on_analyzed(uri, version, result),
        }
    }

    fn on_parsed(&mut self, uri: String, version: u64, result: Result<ParsedDocument, JoinError>) {
        let Some(document) = current(&mut self.documents, &uri, version) else {
            return;
        };
        let parsed = match result {
            Ok(parsed) => parsed,
            Err(err) => {
                worker_failed(&uri, version, "parse", &err);
                document.transition(&uri, DocumentPhase::Idle);
                return;
            }
        };

        self.engine.commit(&uri, &parsed);
        document.ast = Some(Arc::clone(&parsed.ast));

        document.transition(&uri, DocumentPhase::AnalyzingSyntax);
        let syntax = self.engine.syntax_diagnostics(&parsed.ast);
        debug!(uri = %uri, version, diagnostics = syntax.len(), "publishing syntax diagnostics");
        self.sink
            .publish(&uri, version, DiagnosticBatch::new(Phase::Syntax, syntax));

        document.transition(&uri, DocumentPhase::AnalyzingSemantic);
        let engine = Arc::clone(&self.engine);
        let ast = parsed.ast;
        let job_uri = uri.clone();
        self.run_job(
            move || engine.semantic_diagnostics(&job_uri, &ast),
            move |result| Event::Analyzed {
                uri,
                version,
                result,
            },
        );
    }

    fn on_analyzed(&mut self, uri: String, version: u64, result: Result<Vec<Diagnostic>, JoinError>) {
        let Some(document) = current(&mut self.documents, &uri, version) else {
            return;
        };
        match result {
            Ok(semantic) => {
                debug!(uri = %uri, version, diagnostics = semantic.len(), "publishing semantic diagnostics");
                self.sink
                    .publish(&uri, version, DiagnosticBatch::new(Phase::Semantic, semantic));
                document.published_version = Some(version);
                document.transition(&uri, DocumentPhase::Published);
            }
            Err(err) => worker_failed(&uri, version, "semantic", &err),
        }
        document.transition(&uri, DocumentPhase::Idle);
    }

    /// Run `job` on a blocking worker once a permit is free, then report its
    /// outcome back to this task.
    fn run_job<T, J, D>(&self, job: J, done: D)
    where
        T: Send + 'static,
        J: FnOnce() -> T + Send + 'static,
        D: FnOnce(Result<T, JoinError>) -> Event + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let events = self.events.clone();
        tokio::spawn(async move {
            let Ok(permit) = permits.acquire_owned().await else {
                return;
            };
            let result = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                job()
            })
            .await;
            let _ = events.send(done(result));
        });
    }
}

/// The document's state if `version` is still its latest.
fn current<'a>(
    documents: &'a mut HashMap<String, DocumentState>,
    uri: &str,
    version: u64,
) -> Option<&'a mut DocumentState> {
    match documents.get_mut(uri) {
        Some(document) if document.version == version => Some(document),
        Some(document) => {
            debug!(uri, version, latest = document.version, "dropping stale result");
            None
        }
        None => {
            debug!(uri, version, "dropping result for closed document");
            None
        }
    }
}

fn worker_failed(uri: &str, version: u64, stage: &str, err: &JoinError) {
    if err.is_panic() {
        error!(uri, version, stage, "analysis worker panicked; skipping this version");
    } else {
        error!(uri, version, stage, %err, "analysis worker failed; skipping this version");
    }
}
