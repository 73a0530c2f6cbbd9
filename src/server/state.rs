//! Shared application state for the API server

use crate::analytics::MetricsTable;
use crate::renderers::{RenderOutput, RendererKind};
use crate::session::{DashboardConfig, DashboardSession, SessionError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::error::ApiError;

/// Buffered updates per session stream before slow subscribers start lagging
const STREAM_CAPACITY: usize = 64;

/// One rendered output tagged with the selection version that produced it.
///
/// Serializes as `{"version": .., "kind": .., "data": ..}`.
#[derive(Debug, Clone, Serialize)]
pub struct OutputEnvelope {
    pub version: u64,
    #[serde(flatten)]
    pub output: RenderOutput,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Derived table, loaded once and shared read-only by every session
    pub table: MetricsTable,
    /// Settings applied to new sessions
    pub dashboard: DashboardConfig,
    /// Maximum number of concurrent sessions
    pub max_sessions: usize,
    /// Active dashboard sessions
    pub sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
}

impl AppState {
    /// Creates a new application state
    pub fn new(table: MetricsTable, dashboard: DashboardConfig, max_sessions: usize) -> Self {
        AppState {
            table,
            dashboard,
            max_sessions,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribes to the output stream of a session.
    pub async fn subscribe(&self, id: Uuid) -> Result<broadcast::Receiver<OutputEnvelope>, ApiError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&id)
            .map(|entry| entry.updates.subscribe())
            .ok_or(ApiError::SessionNotFound(id))
    }
}

/// A dashboard session plus the channel its outputs are published on.
pub struct SessionEntry {
    pub id: Uuid,
    pub session: DashboardSession,
    pub updates: broadcast::Sender<OutputEnvelope>,
    pub created_at: DateTime<Utc>,
}

impl SessionEntry {
    /// Creates a session whose every output is forwarded to the entry's
    /// broadcast channel. Outputs are only rendered while a stream is
    /// subscribed.
    pub fn new(table: MetricsTable, config: &DashboardConfig) -> Result<Self, SessionError> {
        let mut session = DashboardSession::new(table, config)?;
        let (updates, _) = broadcast::channel(STREAM_CAPACITY);

        let listeners = updates.clone();
        session.set_demand(Box::new(move || listeners.receiver_count() > 0));

        for kind in RendererKind::ALL {
            let sender = updates.clone();
            session.register_sink(
                kind,
                Box::new(move |version, output| {
                    let envelope = OutputEnvelope {
                        version,
                        output: output.clone(),
                    };
                    if sender.send(envelope).is_err() {
                        tracing::debug!(%kind, version, "Stream subscribers left before publish");
                    }
                }),
            );
        }

        Ok(SessionEntry {
            id: Uuid::new_v4(),
            session,
            updates,
            created_at: Utc::now(),
        })
    }

    pub fn stream_url(&self) -> String {
        format!("/sessions/{}/stream", self.id)
    }
}
