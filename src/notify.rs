//! Local notification seam.
//!
//! The platform renders the actual notification; this trait is the point
//! where the runtime hands one off, so tests can assert on what would have
//! been shown.

use tracing::info;

pub trait Notifier: Send + Sync {
  fn notify(&self, title: &str, body: &str);
}

/// Production notifier: emits the notification into the log stream.
#[derive(Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
  fn notify(&self, title: &str, body: &str) {
    info!("Notification: {}: {}", title, body);
  }
}

#[cfg(test)]
pub mod testing {
  use super::Notifier;
  use std::sync::Mutex;

  /// Records every notification for assertions.
  #[derive(Default)]
  pub struct RecordingNotifier {
    pub shown: Mutex<Vec<(String, String)>>,
  }

  impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
      self
        .shown
        .lock()
        .unwrap()
        .push((title.to_string(), body.to_string()));
    }
  }
}
