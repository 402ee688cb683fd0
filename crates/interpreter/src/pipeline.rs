//! Automatic announcement of newly received items.
//!
//! The pipeline owns the [`SeenCounter`]. Nothing else touches it: a manual
//! reload is a [`PollControl`] message handled between two polls.

use crate::chat::{send_split, ChatSink};
use crate::messages::{templates, MessageFormatter};
use crate::queries::{resolve_event, QuerySettings, ResolvedEvent};
use apbridge_core::dedup;
use apbridge_core::resolver::resolve_game_package;
use apbridge_core::{
    AcquisitionEvent, ProgressSnapshot, SeenCounter, Snapshot, SnapshotFault, SnapshotStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Whether a poll is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Dispatching,
}

/// Requests delivered to the poll task.
#[derive(Debug)]
pub enum PollControl {
    /// Re-read the snapshot and treat everything in it as announced. The
    /// reply carries the new counter value.
    Reload { reply: Option<oneshot::Sender<usize>> },
}

/// What a single poll did.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The snapshot could not be read; the counter is untouched.
    Skipped(SnapshotFault),
    /// The snapshot has no `items` section; the counter is untouched.
    NoItems,
    /// Nothing new.
    Unchanged,
    /// The array shrank; the counter now matches it.
    Reset { observed: usize },
    /// New events were announced.
    Dispatched { sent: usize, failed: usize },
}

/// One formatted notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub event: ResolvedEvent,
    pub progress: ProgressSnapshot,
    pub text: String,
}

/// Resolve and format one notification per event, in order.
///
/// Names are resolved against a single lookup and every notification carries
/// the same end-of-poll progress figures.
pub fn build_announcements(
    snapshot: &Snapshot,
    events: &[AcquisitionEvent],
    settings: &QuerySettings,
    formatter: &dyn MessageFormatter,
) -> Vec<Announcement> {
    if events.is_empty() {
        return Vec::new();
    }
    let lookup = resolve_game_package(snapshot, &settings.fallback_game);
    let progress = ProgressSnapshot::compute(snapshot, settings.override_total);

    events
        .iter()
        .map(|event| {
            let event = resolve_event(event, &lookup, settings, snapshot);
            let text = format_announcement(&event, &progress, formatter);
            Announcement {
                event,
                progress,
                text,
            }
        })
        .collect()
}

/// Text of a single notification. Notable items get the highlight wrapper.
pub fn format_announcement(
    event: &ResolvedEvent,
    progress: &ProgressSnapshot,
    formatter: &dyn MessageFormatter,
) -> String {
    let args = [
        ("player", event.player.clone()),
        ("item", event.item.clone()),
        ("location", event.location.clone()),
        ("checks_done", progress.checks_done.to_string()),
        ("total", progress.total_locations.to_string()),
        ("percent", progress.percent_label()),
        ("remaining", progress.remaining.to_string()),
    ];
    let template = if progress.is_total_known() {
        &templates::ANNOUNCE
    } else {
        &templates::ANNOUNCE_UNKNOWN_TOTAL
    };
    let text = formatter.render_template(template, &args);

    if event.notable {
        formatter.render_template(&templates::ANNOUNCE_NOTABLE, &[("text", text)])
    } else {
        text
    }
}

/// Poll loop state.
pub struct AnnouncementPipeline {
    store: SnapshotStore,
    settings: QuerySettings,
    formatter: Arc<dyn MessageFormatter>,
    sink: Arc<dyn ChatSink>,
    seen: SeenCounter,
    state: PipelineState,
}

impl AnnouncementPipeline {
    pub fn new(
        store: SnapshotStore,
        settings: QuerySettings,
        formatter: Arc<dyn MessageFormatter>,
        sink: Arc<dyn ChatSink>,
    ) -> Self {
        Self {
            store,
            settings,
            formatter,
            sink,
            seen: SeenCounter::default(),
            state: PipelineState::Idle,
        }
    }

    /// Current counter value.
    pub fn seen(&self) -> usize {
        self.seen.value()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Start from the events already in the snapshot so a restart does not
    /// replay history.
    pub async fn prime(&mut self) -> usize {
        let snapshot = self.store.load_async().await;
        self.seen.reset(snapshot.events().len());
        info!("announcement pipeline primed at {} events", self.seen.value());
        self.seen.value()
    }

    /// Manual reload: everything currently in the snapshot counts as announced.
    pub async fn reload(&mut self) -> usize {
        let snapshot = self.store.load_async().await;
        self.seen.reset(snapshot.events().len());
        info!("state reloaded manually, counter reset to {}", self.seen.value());
        self.seen.value()
    }

    /// Run one poll: load, diff, announce, advance.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let snapshot = match self.store.try_load_async().await {
            Ok(snapshot) => snapshot,
            Err(fault) => {
                self.store.report(&fault);
                return PollOutcome::Skipped(fault);
            }
        };
        if !snapshot.has_items_section() {
            debug!("snapshot has no items section yet, skipping poll");
            return PollOutcome::NoItems;
        }

        let delta = dedup::delta(snapshot.events(), self.seen.value());
        if delta.is_empty() {
            let outcome = if delta.reset {
                warn!(
                    "item list shrank from {} to {} entries, resetting counter",
                    self.seen.value(),
                    delta.observed_len
                );
                PollOutcome::Reset {
                    observed: delta.observed_len,
                }
            } else {
                PollOutcome::Unchanged
            };
            self.seen.commit(&delta);
            return outcome;
        }

        self.state = PipelineState::Dispatching;
        let announcements = build_announcements(
            &snapshot,
            delta.events,
            &self.settings,
            self.formatter.as_ref(),
        );

        let mut sent = 0usize;
        let mut failed = 0usize;
        for announcement in &announcements {
            match send_split(self.sink.as_ref(), &announcement.text).await {
                Ok(()) => sent += 1,
                Err(err) => {
                    failed += 1;
                    warn!(
                        "failed to announce {} (index {}): {}",
                        announcement.event.item, announcement.event.sequence_index, err
                    );
                }
            }
        }

        self.seen.commit(&delta);
        self.state = PipelineState::Idle;
        info!(
            "announced {} new items (failed={}, seen={})",
            sent,
            failed,
            self.seen.value()
        );
        PollOutcome::Dispatched { sent, failed }
    }

    /// Poll on a fixed interval until the task is aborted.
    pub async fn run(mut self, interval: Duration, mut control: mpsc::Receiver<PollControl>) {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut control_open = true;

        info!(
            "announcement pipeline started (interval={}s, seen={})",
            interval.as_secs(),
            self.seen.value()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                message = control.recv(), if control_open => match message {
                    Some(PollControl::Reload { reply }) => {
                        let seen = self.reload().await;
                        if let Some(reply) = reply {
                            let _ = reply.send(seen);
                        }
                    }
                    None => control_open = false,
                },
            }
        }
    }
}
