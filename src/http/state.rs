use crate::config::Config;
use crate::recognition::RecognitionCollaborators;
use crate::session::ConnectionInfo;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared state of the WebSocket and HTTP services
#[derive(Clone)]
pub struct AppState {
    /// Live streaming connections (session_id → info)
    pub sessions: Arc<RwLock<HashMap<String, ConnectionInfo>>>,

    /// Inference handles, shared read-only by every session
    pub collaborators: RecognitionCollaborators,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(collaborators: RecognitionCollaborators, config: Config) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            collaborators,
            config: Arc::new(config),
        }
    }

    pub async fn register(&self, info: ConnectionInfo) -> usize {
        let mut sessions = self.sessions.write().await;
        sessions.insert(info.session_id.clone(), info);
        sessions.len()
    }

    pub async fn deregister(&self, session_id: &str) -> usize {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        sessions.len()
    }

    pub async fn connected_users(&self) -> usize {
        self.sessions.read().await.len()
    }
}
