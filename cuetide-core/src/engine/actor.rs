//! Actor implementation for the stream engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::commands::StreamEngineCommand;
use super::handle::StreamEngineHandle;
use crate::config::CuetideConfig;
use crate::controller::{StreamController, StreamEvent, StreamRequest};
use crate::error::LoadError;
use crate::scheduler::TickScheduler;
use crate::traits::{FragmentLoader, KeyLoader, MediaBuffer};

const COMMAND_CHANNEL_CAPACITY: usize = 100;

/// Asynchronous collaborators the engine executes controller work against.
#[derive(Clone)]
pub struct Collaborators {
    pub loader: Arc<dyn FragmentLoader>,
    pub key_loader: Arc<dyn KeyLoader>,
    pub buffer: Arc<dyn MediaBuffer>,
}

/// Arm/disarm requests recorded by the controller for the actor to apply.
///
/// Every `arm` bumps `epoch`, so the actor restarts its interval even when
/// the controller disarms and re-arms between two polls.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IntervalScheduler {
    interval: Option<Duration>,
    epoch: u64,
}

impl IntervalScheduler {
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }
}

impl TickScheduler for IntervalScheduler {
    fn arm(&mut self, interval: Duration) {
        self.interval = Some(interval);
        self.epoch += 1;
    }

    fn disarm(&mut self) {
        self.interval = None;
    }
}

/// Spawns the stream engine actor and returns its handle and event stream.
///
/// The actor owns the controller and is the only task touching it: player
/// events, collaborator completions and scheduling ticks are all serialized
/// through its loop.
///
/// # Examples
/// ```rust,no_run
/// use cuetide_core::TrackId;
/// use cuetide_core::config::CuetideConfig;
/// use cuetide_core::engine::{Collaborators, spawn_stream_engine};
///
/// async fn watch(collaborators: Collaborators) {
///     let (handle, mut events) = spawn_stream_engine(CuetideConfig::default(), collaborators);
///     handle.switch_track(TrackId(0)).await.ok();
///     while let Some(event) = events.recv().await {
///         println!("{event:?}");
///     }
/// }
/// ```
pub fn spawn_stream_engine(
    config: CuetideConfig,
    collaborators: Collaborators,
) -> (StreamEngineHandle, mpsc::UnboundedReceiver<StreamEvent>) {
    let (sender, receiver) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (completion_sender, completion_receiver) = mpsc::unbounded_channel();
    let (event_sender, event_receiver) = mpsc::unbounded_channel();

    let engine = StreamEngine {
        controller: StreamController::new(&config, IntervalScheduler::default()),
        collaborators,
        load_timeout: config.stream.fragment_load_timeout,
        completions: completion_sender,
        events: event_sender,
        ticker: None,
        ticker_epoch: 0,
    };

    tokio::spawn(async move {
        run_actor_loop(engine, receiver, completion_receiver).await;
    });

    (StreamEngineHandle::new(sender), event_receiver)
}

struct StreamEngine {
    controller: StreamController<IntervalScheduler>,
    collaborators: Collaborators,
    load_timeout: Duration,
    completions: mpsc::UnboundedSender<StreamEngineCommand>,
    events: mpsc::UnboundedSender<StreamEvent>,
    ticker: Option<Interval>,
    ticker_epoch: u64,
}

/// Runs the main actor message processing loop.
///
/// Exits when every handle is dropped or a shutdown command is received.
async fn run_actor_loop(
    mut engine: StreamEngine,
    mut receiver: mpsc::Receiver<StreamEngineCommand>,
    mut completions: mpsc::UnboundedReceiver<StreamEngineCommand>,
) {
    tracing::debug!("Stream engine actor started");

    loop {
        tokio::select! {
            command = receiver.recv() => {
                let Some(command) = command else { break };
                if !engine.handle_command(command) {
                    break;
                }
            }
            Some(command) = completions.recv() => {
                engine.handle_command(command);
            }
            _ = next_tick(&mut engine.ticker) => {
                engine.controller.tick();
            }
        }

        engine.dispatch_requests();
        engine.sync_ticker();
    }

    tracing::debug!("Stream engine actor stopped");
}

/// Resolves on the next interval tick, or never while disarmed.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl StreamEngine {
    /// Applies a single command. Returns false to shut down.
    fn handle_command(&mut self, command: StreamEngineCommand) -> bool {
        let controller = &mut self.controller;
        match command {
            StreamEngineCommand::MediaAttached { clock, responder } => {
                controller.on_media_attached(clock);
                let _ = responder.send(());
            }
            StreamEngineCommand::MediaDetaching { responder } => {
                controller.on_media_detaching();
                let _ = responder.send(());
            }
            StreamEngineCommand::TracksUpdated { tracks, responder } => {
                controller.on_tracks_updated(tracks);
                let _ = responder.send(());
            }
            StreamEngineCommand::TrackSwitch { id, responder } => {
                controller.on_track_switch(id);
                let _ = responder.send(());
            }
            StreamEngineCommand::TrackDetailsLoaded {
                id,
                details,
                responder,
            } => {
                controller.on_track_details_loaded(id, details);
                let _ = responder.send(());
            }
            StreamEngineCommand::MediaSeeking { responder } => {
                controller.on_media_seeking();
                let _ = responder.send(());
            }
            StreamEngineCommand::GetSnapshot { responder } => {
                let _ = responder.send(controller.snapshot());
            }
            StreamEngineCommand::Shutdown { responder } => {
                tracing::debug!("Stream engine shutting down");
                let _ = responder.send(());
                return false;
            }
            StreamEngineCommand::FragmentLoaded { ticket, result } => {
                controller.on_fragment_loaded(ticket, result);
            }
            StreamEngineCommand::KeyLoaded { ticket, result } => {
                controller.on_key_loaded(ticket, result);
            }
            StreamEngineCommand::BufferAppended { ticket, result } => {
                controller.on_buffer_appended(ticket, result);
            }
            StreamEngineCommand::BufferFlushed {
                ticket,
                range,
                result,
            } => {
                controller.on_buffer_flushed(ticket, range, result);
            }
            StreamEngineCommand::RetryElapsed { ticket } => {
                controller.on_retry_elapsed(ticket);
            }
        }
        true
    }

    /// Executes queued controller requests on spawned tasks.
    fn dispatch_requests(&mut self) {
        for request in self.controller.drain_requests() {
            let completions = self.completions.clone();
            match request {
                StreamRequest::LoadFragment { ticket, fragment } => {
                    let loader = Arc::clone(&self.collaborators.loader);
                    let timeout = self.load_timeout;
                    tokio::spawn(async move {
                        let result = tokio::time::timeout(timeout, loader.load(&fragment))
                            .await
                            .unwrap_or_else(|_| {
                                Err(LoadError::Timeout {
                                    url: fragment.url.clone(),
                                    timeout,
                                })
                            });
                        let _ = completions.send(StreamEngineCommand::FragmentLoaded { ticket, result });
                    });
                }
                StreamRequest::LoadKey { ticket, fragment } => {
                    let key_loader = Arc::clone(&self.collaborators.key_loader);
                    tokio::spawn(async move {
                        let result = key_loader.load_key(&fragment).await;
                        let _ = completions.send(StreamEngineCommand::KeyLoaded { ticket, result });
                    });
                }
                StreamRequest::Append {
                    ticket,
                    buffer_type,
                    payload,
                } => {
                    let buffer = Arc::clone(&self.collaborators.buffer);
                    tokio::spawn(async move {
                        let result = buffer.append(buffer_type, payload).await;
                        let _ =
                            completions.send(StreamEngineCommand::BufferAppended { ticket, result });
                    });
                }
                StreamRequest::Flush {
                    ticket,
                    buffer_type,
                    range,
                } => {
                    let buffer = Arc::clone(&self.collaborators.buffer);
                    tokio::spawn(async move {
                        let result = buffer.flush(buffer_type, range).await;
                        let _ = completions.send(StreamEngineCommand::BufferFlushed {
                            ticket,
                            range,
                            result,
                        });
                    });
                }
                StreamRequest::ScheduleRetry { ticket, delay } => {
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = completions.send(StreamEngineCommand::RetryElapsed { ticket });
                    });
                }
                StreamRequest::Notify(event) => {
                    // Observers may have gone away; scheduling carries on.
                    let _ = self.events.send(event);
                }
            }
        }
    }

    /// Applies the controller's latest arm/disarm request to the interval.
    fn sync_ticker(&mut self) {
        let scheduler = *self.controller.scheduler();
        match scheduler.interval {
            None => {
                if self.ticker.take().is_some() {
                    tracing::trace!("Scheduling tick disarmed");
                }
            }
            Some(period) if self.ticker.is_none() || scheduler.epoch != self.ticker_epoch => {
                tracing::trace!(?period, "Scheduling tick armed");
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.ticker = Some(interval);
                self.ticker_epoch = scheduler.epoch;
            }
            Some(_) => {}
        }
    }
}
