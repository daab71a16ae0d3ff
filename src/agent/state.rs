// src/agent/state.rs
// Shared handles every tool needs, assembled once in `main` and threaded
// through the tool registry via `Arc`. This is the dependency-injection
// seam called for by the Open Question decision on module-level globals
// (see DESIGN.md): no lazily-initialized singletons here, just fields.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::embeddings::EmbeddingProvider;
use crate::formatting::EntityResolver;
use crate::persistence::preferences::{PreferenceSet, PreferenceStorage};
use crate::persistence::session::{SessionState, SessionStorage};
use crate::rate_gate::RateGate;
use crate::store::Store;
use crate::upstream::UpstreamApi;

pub struct AgentState {
    pub store: Arc<Store>,
    pub resolver: Arc<EntityResolver>,
    pub upstream: Arc<dyn UpstreamApi>,
    pub rate_gate: Arc<RateGate>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub user_id: String,
    pub prefs: Mutex<PreferenceSet>,
    pub pref_storage: PreferenceStorage,
    pub session: Mutex<SessionState>,
    pub session_storage: SessionStorage,
}

impl AgentState {
    pub async fn save_prefs(&self) -> std::io::Result<()> {
        let prefs = self.prefs.lock().await;
        self.pref_storage.save(&prefs)
    }

    pub async fn save_session(&self) -> std::io::Result<()> {
        let mut session = self.session.lock().await;
        self.session_storage.save(&mut session)
    }
}
