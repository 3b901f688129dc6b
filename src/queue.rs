//! Durable, ordered storage of pending mutations.
//!
//! Entries are immutable once created and live until the sync coordinator
//! receives a confirmed acknowledgment from the remote API. Rejection
//! counting and dead-letter marking are store bookkeeping, not entry
//! mutation; the payload never changes after enqueue.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::params;
use std::sync::Arc;

use crate::store::{parse_datetime, Store};

/// Mutation family a queue entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
  Login,
  Comment,
}

impl MutationKind {
  /// Fixed drain priority: session-affecting kinds before content kinds,
  /// so a comment needing a restored session is never replayed first.
  pub const DRAIN_ORDER: [MutationKind; 2] = [MutationKind::Login, MutationKind::Comment];

  pub fn as_str(&self) -> &'static str {
    match self {
      MutationKind::Login => "login",
      MutationKind::Comment => "comment",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "login" => Ok(MutationKind::Login),
      "comment" => Ok(MutationKind::Comment),
      other => Err(eyre!("Unknown mutation kind: {}", other)),
    }
  }

  /// Platform sync-registration tag for this kind.
  pub fn sync_tag(&self) -> &'static str {
    match self {
      MutationKind::Login => "sync-login",
      MutationKind::Comment => "sync-comment",
    }
  }

  pub fn from_sync_tag(tag: &str) -> Option<Self> {
    match tag {
      "sync-login" => Some(MutationKind::Login),
      "sync-comment" => Some(MutationKind::Comment),
      _ => None,
    }
  }
}

/// A durably persisted, not-yet-acknowledged mutation.
#[derive(Debug, Clone)]
pub struct QueueEntry {
  /// Store-assigned, monotonically increasing; doubles as insertion order.
  pub id: i64,
  pub kind: MutationKind,
  pub payload: serde_json::Value,
  pub created_at: DateTime<Utc>,
}

/// Typed wrapper over the persistent store for pending mutations.
pub struct OfflineQueue {
  store: Arc<Store>,
}

impl OfflineQueue {
  pub fn new(store: Arc<Store>) -> Self {
    Self { store }
  }

  /// Persist a new entry. The insert commits before this returns; once the
  /// caller has the id, the mutation is durably queued. Storage failure is
  /// an error, not a log line, since the durability guarantee is lost.
  pub fn enqueue(&self, kind: MutationKind, payload: &serde_json::Value) -> Result<i64> {
    let data =
      serde_json::to_vec(payload).map_err(|e| eyre!("Failed to serialize payload: {}", e))?;

    let conn = self.store.lock()?;
    conn
      .execute(
        "INSERT INTO pending_mutations (kind, payload) VALUES (?, ?)",
        params![kind.as_str(), data],
      )
      .map_err(|e| eyre!("Failed to enqueue mutation: {}", e))?;

    Ok(conn.last_insert_rowid())
  }

  /// All live entries in ascending id order (= insertion order).
  pub fn list_all(&self) -> Result<Vec<QueueEntry>> {
    self.list_where("dead_at IS NULL", params![])
  }

  /// Live entries of one kind, same ordering.
  pub fn list_by_kind(&self, kind: MutationKind) -> Result<Vec<QueueEntry>> {
    self.list_where("dead_at IS NULL AND kind = ?", params![kind.as_str()])
  }

  /// Entries retired after repeated rejection; kept for inspection.
  pub fn list_dead(&self) -> Result<Vec<QueueEntry>> {
    self.list_where("dead_at IS NOT NULL", params![])
  }

  fn list_where(&self, clause: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<QueueEntry>> {
    let conn = self.store.lock()?;
    let sql = format!(
      "SELECT id, kind, payload, created_at FROM pending_mutations WHERE {} ORDER BY id",
      clause
    );
    let mut stmt = conn
      .prepare(&sql)
      .map_err(|e| eyre!("Failed to prepare queue query: {}", e))?;

    let rows: Vec<(i64, String, Vec<u8>, String)> = stmt
      .query_map(args, |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
      })
      .map_err(|e| eyre!("Failed to query queue: {}", e))?
      .collect::<std::result::Result<_, _>>()
      .map_err(|e| eyre!("Failed to read queue row: {}", e))?;

    let mut entries = Vec::with_capacity(rows.len());
    for (id, kind, payload, created_at) in rows {
      entries.push(QueueEntry {
        id,
        kind: MutationKind::parse(&kind)?,
        payload: serde_json::from_slice(&payload)
          .map_err(|e| eyre!("Failed to parse payload of entry {}: {}", id, e))?,
        created_at: parse_datetime(&created_at)?,
      });
    }

    Ok(entries)
  }

  /// Idempotent delete; removing an unknown id is a no-op.
  pub fn remove(&self, id: i64) -> Result<()> {
    let conn = self.store.lock()?;
    conn
      .execute("DELETE FROM pending_mutations WHERE id = ?", params![id])
      .map_err(|e| eyre!("Failed to remove entry {}: {}", id, e))?;

    Ok(())
  }

  /// Count one remote rejection against an entry; returns the new total.
  pub fn record_rejection(&self, id: i64) -> Result<u32> {
    let conn = self.store.lock()?;
    conn
      .execute(
        "UPDATE pending_mutations SET rejections = rejections + 1 WHERE id = ?",
        params![id],
      )
      .map_err(|e| eyre!("Failed to record rejection for entry {}: {}", id, e))?;

    let count = conn
      .query_row(
        "SELECT rejections FROM pending_mutations WHERE id = ?",
        params![id],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to read rejection count for entry {}: {}", id, e))?;

    Ok(count)
  }

  /// Retire an entry from future drains without deleting it.
  pub fn mark_dead(&self, id: i64) -> Result<()> {
    let conn = self.store.lock()?;
    conn
      .execute(
        "UPDATE pending_mutations SET dead_at = datetime('now') WHERE id = ?",
        params![id],
      )
      .map_err(|e| eyre!("Failed to mark entry {} dead: {}", id, e))?;

    Ok(())
  }
}
