//! Drains the offline queue against the remote API.
//!
//! Entries are processed kind by kind in a fixed priority order, FIFO
//! within a kind. An entry is deleted only after the server acknowledged
//! it; rejection and transport failure both retain the entry and move on,
//! so one bad entry never aborts a batch. Repeated drains are the only
//! retry mechanism; there is no backoff within a drain.

use color_eyre::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::net::{ApiOutcome, CommentRequest, LoginRequest, RemoteApi};
use crate::notify::Notifier;
use crate::pages::{BroadcastMessage, PageRegistry};
use crate::queue::{MutationKind, OfflineQueue, QueueEntry};

/// What a drain trigger asks to be drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
  Kind(MutationKind),
  All,
}

impl SyncTrigger {
  /// Map a platform sync tag (e.g. `sync-login`) to a trigger.
  pub fn from_tag(tag: &str) -> Option<Self> {
    MutationKind::from_sync_tag(tag).map(SyncTrigger::Kind)
  }

  fn includes(&self, kind: MutationKind) -> bool {
    match self {
      SyncTrigger::All => true,
      SyncTrigger::Kind(k) => *k == kind,
    }
  }
}

/// Tally of one drain.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
  /// Acknowledged by the server and removed from the queue.
  pub delivered: usize,
  /// Still pending: rejected or unreachable this time around.
  pub retained: usize,
  /// Retired after repeated rejection or an unusable payload.
  pub dead: usize,
  /// True when another drain held the guard and this one did nothing.
  pub skipped: bool,
}

pub struct SyncCoordinator<A: RemoteApi + ?Sized, N: Notifier + ?Sized> {
  queue: Arc<OfflineQueue>,
  api: Arc<A>,
  pages: Arc<PageRegistry>,
  notifier: Arc<N>,
  max_rejections: u32,
  /// Single-flight guard: two overlapping drains could both read an entry
  /// before either deletes it and send it twice.
  drain_guard: Mutex<()>,
}

impl<A: RemoteApi + ?Sized, N: Notifier + ?Sized> SyncCoordinator<A, N> {
  pub fn new(
    queue: Arc<OfflineQueue>,
    api: Arc<A>,
    pages: Arc<PageRegistry>,
    notifier: Arc<N>,
    max_rejections: u32,
  ) -> Self {
    Self {
      queue,
      api,
      pages,
      notifier,
      max_rejections,
      drain_guard: Mutex::new(()),
    }
  }

  /// Process all pending entries covered by the trigger.
  ///
  /// Partitions run in `MutationKind::DRAIN_ORDER` so session restoration
  /// happens before content mutations that may depend on it; within a
  /// partition entries run strictly in insertion order.
  pub async fn drain(&self, trigger: SyncTrigger) -> Result<DrainReport> {
    let _guard = match self.drain_guard.try_lock() {
      Ok(guard) => guard,
      Err(_) => {
        info!("Drain already in progress, skipping trigger {:?}", trigger);
        return Ok(DrainReport {
          skipped: true,
          ..DrainReport::default()
        });
      }
    };

    let mut report = DrainReport::default();
    for kind in MutationKind::DRAIN_ORDER {
      if !trigger.includes(kind) {
        continue;
      }
      for entry in self.queue.list_by_kind(kind)? {
        self.process_entry(&entry, &mut report).await?;
      }
    }

    info!(
      "Drain finished: {} delivered, {} retained, {} dead",
      report.delivered, report.retained, report.dead
    );
    Ok(report)
  }

  /// Replay one entry. Network-level failures are absorbed into the
  /// report; storage failures escalate, since losing track of the queue
  /// voids the durability guarantee.
  async fn process_entry(&self, entry: &QueueEntry, report: &mut DrainReport) -> Result<()> {
    match entry.kind {
      MutationKind::Login => self.replay_login(entry, report).await,
      MutationKind::Comment => self.replay_comment(entry, report).await,
    }
  }

  async fn replay_login(&self, entry: &QueueEntry, report: &mut DrainReport) -> Result<()> {
    let req: LoginRequest = match serde_json::from_value(entry.payload.clone()) {
      Ok(req) => req,
      Err(e) => return self.retire_unusable(entry, report, &e.to_string()),
    };

    match self.api.login(&req).await {
      Ok(ApiOutcome::Accepted(session)) => {
        // Delete only after the acknowledgment is in hand
        self.queue.remove(entry.id)?;

        // Push trigger is fire-and-forget
        if let Err(e) = self.api.send_push(&session.usuario).await {
          warn!("Push trigger after login replay failed: {}", e);
        }

        self
          .notifier
          .notify("Session restored", &format!("Signed in as {}", session.usuario));
        self.pages.publish(&BroadcastMessage::SessionRestored {
          token: session.token,
          usuario: session.usuario,
          correo: session.correo,
          role: session.role,
        })?;
        report.delivered += 1;
        Ok(())
      }
      Ok(ApiOutcome::Rejected { status }) => self.handle_rejection(entry, report, status),
      Err(e) => {
        warn!("Login replay for entry {} got no response: {}", entry.id, e);
        report.retained += 1;
        Ok(())
      }
    }
  }

  async fn replay_comment(&self, entry: &QueueEntry, report: &mut DrainReport) -> Result<()> {
    let req: CommentRequest = match serde_json::from_value(entry.payload.clone()) {
      Ok(req) => req,
      Err(e) => return self.retire_unusable(entry, report, &e.to_string()),
    };

    match self.api.submit_comment(&req).await {
      Ok(ApiOutcome::Accepted(ack)) => {
        self.queue.remove(entry.id)?;

        self
          .notifier
          .notify("Comment delivered", &format!("Comment by {} was sent", req.usuario));
        self.pages.publish(&BroadcastMessage::MutationSent {
          inserted_id: ack.inserted_id,
          usuario: req.usuario,
        })?;
        report.delivered += 1;
        Ok(())
      }
      Ok(ApiOutcome::Rejected { status }) => self.handle_rejection(entry, report, status),
      Err(e) => {
        warn!("Comment replay for entry {} got no response: {}", entry.id, e);
        report.retained += 1;
        Ok(())
      }
    }
  }

  /// Non-2xx from the server: retain the entry, but only up to the
  /// configured rejection budget; beyond it the entry is dead-lettered.
  /// Transport failures deliberately do not count against the budget.
  fn handle_rejection(
    &self,
    entry: &QueueEntry,
    report: &mut DrainReport,
    status: u16,
  ) -> Result<()> {
    let rejections = self.queue.record_rejection(entry.id)?;
    if rejections >= self.max_rejections {
      warn!(
        "Entry {} rejected with {} ({} time(s)), dead-lettering",
        entry.id, status, rejections
      );
      self.queue.mark_dead(entry.id)?;
      report.dead += 1;
    } else {
      warn!(
        "Entry {} rejected with {} ({} of {}), keeping for a later drain",
        entry.id, status, rejections, self.max_rejections
      );
      report.retained += 1;
    }
    Ok(())
  }

  /// A payload that cannot be parsed back into a request can never be
  /// replayed; retire it immediately.
  fn retire_unusable(
    &self,
    entry: &QueueEntry,
    report: &mut DrainReport,
    reason: &str,
  ) -> Result<()> {
    error!("Entry {} has an unusable payload: {}", entry.id, reason);
    self.queue.mark_dead(entry.id)?;
    report.dead += 1;
    Ok(())
  }
}
