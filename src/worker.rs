//! The event-driven worker that owns every component.
//!
//! Platform events arrive on a channel and each handler runs to completion
//! before the next event is taken, mirroring a host that keeps the event
//! alive until its work resolves. No in-memory state is assumed to survive
//! between events; everything durable lives in the store.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::cache::{CacheManager, CacheNames, SqliteCacheStore};
use crate::config::Config;
use crate::interceptor::RequestInterceptor;
use crate::net::{
  ApiOutcome, CommentRequest, CommentResponse, Fetch, HttpFetcher, HttpRemoteApi, LoginRequest,
  LoginResponse, RemoteApi, Request, ResponseSnapshot,
};
use crate::notify::{LogNotifier, Notifier};
use crate::pages::{BroadcastMessage, PageRegistry};
use crate::queue::{MutationKind, OfflineQueue};
use crate::store::Store;
use crate::sync::{DrainReport, SyncCoordinator, SyncTrigger};

/// Inbound push payload, rendered as a local notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushPayload {
  pub titulo: Option<String>,
  pub mensaje: Option<String>,
  #[serde(rename = "type")]
  pub kind: Option<String>,
}

/// A user-initiated mutation attempt.
#[derive(Debug, Clone)]
pub enum Mutation {
  Login(LoginRequest),
  Comment(CommentRequest),
}

impl Mutation {
  fn kind(&self) -> MutationKind {
    match self {
      Mutation::Login(_) => MutationKind::Login,
      Mutation::Comment(_) => MutationKind::Comment,
    }
  }

  fn payload(&self) -> Result<serde_json::Value> {
    let value = match self {
      Mutation::Login(req) => serde_json::to_value(req),
      Mutation::Comment(req) => serde_json::to_value(req),
    };
    value.map_err(|e| eyre!("Failed to serialize mutation payload: {}", e))
  }
}

/// Outcome of `try_mutation`.
#[derive(Debug)]
pub enum MutationAttempt {
  /// The server answered the login attempt (2xx or rejection).
  Login(ApiOutcome<LoginResponse>),
  /// The server answered the comment attempt (2xx or rejection).
  Comment(ApiOutcome<CommentResponse>),
  /// No connectivity: the mutation is durably queued for replay. The
  /// caller should register `sync_tag` with the platform (or fall back to
  /// manual retry) and may surface `response` to the user.
  Queued {
    id: i64,
    sync_tag: &'static str,
    response: ResponseSnapshot,
  },
}

/// Platform events handled by the worker.
pub enum WorkerEvent {
  Install,
  Activate,
  Fetch {
    request: Request,
    respond_to: oneshot::Sender<Result<Option<ResponseSnapshot>>>,
  },
  Sync(SyncTrigger),
  Push(PushPayload),
}

pub struct Worker<F: Fetch + ?Sized, A: RemoteApi + ?Sized, N: Notifier + ?Sized> {
  config: Config,
  cache: CacheManager<SqliteCacheStore>,
  interceptor: RequestInterceptor<SqliteCacheStore, F>,
  queue: Arc<OfflineQueue>,
  coordinator: SyncCoordinator<A, N>,
  pages: Arc<PageRegistry>,
  notifier: Arc<N>,
  api: Arc<A>,
  fetch: Arc<F>,
}

impl Worker<HttpFetcher, HttpRemoteApi, LogNotifier> {
  /// Production wiring: SQLite store at the configured path, reqwest for
  /// both the fetcher and the API client, notifications into the log.
  pub fn open(config: Config) -> Result<Self> {
    let store = match &config.store_path {
      Some(path) => Store::open(path)?,
      None => Store::open_default()?,
    };

    let api = HttpRemoteApi::new(config.api.base_url.clone());
    Ok(Self::new(
      config,
      Arc::new(store),
      Arc::new(HttpFetcher::new()),
      Arc::new(api),
      Arc::new(LogNotifier),
    ))
  }
}

impl<F: Fetch + ?Sized, A: RemoteApi + ?Sized, N: Notifier + ?Sized> Worker<F, A, N> {
  pub fn new(
    config: Config,
    store: Arc<Store>,
    fetch: Arc<F>,
    api: Arc<A>,
    notifier: Arc<N>,
  ) -> Self {
    let cache_store = Arc::new(SqliteCacheStore::new(Arc::clone(&store)));
    let names = CacheNames {
      shell: config.shell_namespace(),
      dynamic: config.dynamic_namespace(),
    };
    let cache = CacheManager::new(cache_store, names);

    let interceptor = RequestInterceptor::new(
      cache.clone(),
      Arc::clone(&fetch),
      config.origin.clone(),
      config.api.route_prefix.clone(),
      config.api.offline_message.clone(),
    );

    let queue = Arc::new(OfflineQueue::new(store));
    let pages = Arc::new(PageRegistry::new());
    let coordinator = SyncCoordinator::new(
      Arc::clone(&queue),
      Arc::clone(&api),
      Arc::clone(&pages),
      Arc::clone(&notifier),
      config.sync.max_rejections,
    );

    Self {
      config,
      cache,
      interceptor,
      queue,
      coordinator,
      pages,
      notifier,
      api,
      fetch,
    }
  }

  /// The page registry, for foreground pages to connect to.
  pub fn pages(&self) -> Arc<PageRegistry> {
    Arc::clone(&self.pages)
  }

  /// Drive events sequentially until the channel closes. A failing event
  /// is logged; the worker keeps serving (the host may restart it anyway).
  pub async fn run(&self, mut events: mpsc::UnboundedReceiver<WorkerEvent>) {
    while let Some(event) = events.recv().await {
      if let Err(e) = self.handle_event(event).await {
        error!("Event handling failed: {:#}", e);
      }
    }
  }

  pub async fn handle_event(&self, event: WorkerEvent) -> Result<()> {
    match event {
      WorkerEvent::Install => self.install().await,
      WorkerEvent::Activate => self.activate().await,
      WorkerEvent::Fetch {
        request,
        respond_to,
      } => {
        let result = self.interceptor.handle(&request).await;
        // A dropped receiver just means the page went away
        let _ = respond_to.send(result);
        Ok(())
      }
      WorkerEvent::Sync(trigger) => self.sync(trigger).await.map(|_| ()),
      WorkerEvent::Push(payload) => self.handle_push(payload),
    }
  }

  /// Precache the shell manifest into the current shell namespace.
  pub async fn install(&self) -> Result<()> {
    info!("Installing shell {}", self.config.shell_namespace());
    self
      .cache
      .install(
        self.fetch.as_ref(),
        &self.config.origin,
        &self.config.shell.assets,
      )
      .await
  }

  /// Cut over to the current cache versions and claim all open pages.
  pub async fn activate(&self) -> Result<()> {
    info!("Activating {}", self.config.shell_namespace());
    self.cache.activate()?;
    self.pages.claim()
  }

  /// Route one outbound request; `None` means pass-through (non-GET).
  pub async fn handle_fetch(&self, request: &Request) -> Result<Option<ResponseSnapshot>> {
    self.interceptor.handle(request).await
  }

  /// Drain pending mutations covered by the trigger.
  pub async fn sync(&self, trigger: SyncTrigger) -> Result<DrainReport> {
    self.coordinator.drain(trigger).await
  }

  /// Attempt a mutation now; queue it durably when the network is down.
  ///
  /// The queued outcome carries the synthesized 503, so the caller-visible
  /// result is a valid response either way. Caches are never touched.
  pub async fn try_mutation(&self, mutation: Mutation) -> Result<MutationAttempt> {
    let attempt = match &mutation {
      Mutation::Login(req) => self.api.login(req).await.map(MutationAttempt::Login),
      Mutation::Comment(req) => self
        .api
        .submit_comment(req)
        .await
        .map(MutationAttempt::Comment),
    };

    match attempt {
      Ok(answered) => Ok(answered),
      Err(e) => {
        let kind = mutation.kind();
        warn!("{} attempt got no response, queueing: {}", kind.as_str(), e);
        // Durability boundary: the id only exists once the insert committed
        let id = self.queue.enqueue(kind, &mutation.payload()?)?;
        Ok(MutationAttempt::Queued {
          id,
          sync_tag: kind.sync_tag(),
          response: ResponseSnapshot::service_unavailable(&self.config.api.offline_message),
        })
      }
    }
  }

  /// Render an inbound push as a local notification; a `new-user` push
  /// additionally tells open pages to refresh their user list.
  pub fn handle_push(&self, payload: PushPayload) -> Result<()> {
    let title = payload.titulo.as_deref().unwrap_or("Notification");
    let body = payload
      .mensaje
      .as_deref()
      .unwrap_or("You have a new notification");
    self.notifier.notify(title, body);

    if payload.kind.as_deref() == Some("new-user") {
      self.pages.publish(&BroadcastMessage::CollectionChanged)?;
    }

    Ok(())
  }
}
