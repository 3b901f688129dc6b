//! Best-effort fan-out of reconciliation messages to open foreground pages.
//!
//! A page connects and receives messages only while it is controlled;
//! activation claims all currently connected pages. Nothing is queued for
//! pages that connect later, and delivery carries no acknowledgment.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Typed reconciliation message, wire shape `{type, ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BroadcastMessage {
  /// A queued login was replayed successfully; carries the fresh session.
  SessionRestored {
    token: String,
    usuario: String,
    correo: String,
    role: String,
  },
  /// A queued content mutation was acknowledged by the server.
  MutationSent {
    #[serde(rename = "insertedId")]
    inserted_id: String,
    usuario: String,
  },
  /// A server-side collection changed; the UI should refetch it.
  CollectionChanged,
}

struct PageHandle {
  tx: mpsc::UnboundedSender<BroadcastMessage>,
  controlled: bool,
}

/// Registry of currently open pages.
#[derive(Default)]
pub struct PageRegistry {
  pages: Mutex<Vec<PageHandle>>,
}

impl PageRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a page and return its message receiver. Pages loaded before
  /// activation start uncontrolled and are picked up by `claim`.
  pub fn connect(&self, controlled: bool) -> Result<mpsc::UnboundedReceiver<BroadcastMessage>> {
    let (tx, rx) = mpsc::unbounded_channel();
    self
      .lock()?
      .push(PageHandle { tx, controlled });
    Ok(rx)
  }

  /// Take control of every connected page immediately, no reload required.
  pub fn claim(&self) -> Result<()> {
    for page in self.lock()?.iter_mut() {
      page.controlled = true;
    }
    Ok(())
  }

  /// Post the message to each controlled page; closed pages are pruned.
  pub fn publish(&self, message: &BroadcastMessage) -> Result<()> {
    let mut pages = self.lock()?;
    pages.retain(|page| {
      if !page.controlled {
        return !page.tx.is_closed();
      }
      page.tx.send(message.clone()).is_ok()
    });
    debug!("Broadcast delivered to {} page(s)", pages.len());
    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<PageHandle>>> {
    self.pages.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}
