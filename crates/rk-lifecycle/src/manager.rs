// manager.rs — StateManager: server state bound to its storage backend.
//
// Loaded once per process (or per CLI invocation) and saved after every
// mutation. Unreadable state is never fatal: the operator is warned and the
// server starts from defaults.

use crate::error::LifecycleError;
use crate::state::{ServerMode, ServerState};
use crate::storage::{open_storage, StateStorage};

pub struct StateManager {
    storage: Box<dyn StateStorage>,
    state: ServerState,
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("storage", &self.storage.describe())
            .field("state", &self.state)
            .finish()
    }
}

impl StateManager {
    /// Load state from `storage`, falling back to defaults when it is
    /// absent or corrupt.
    pub fn open(storage: Box<dyn StateStorage>) -> Result<Self, LifecycleError> {
        let state = match storage.read()? {
            None => {
                tracing::info!(storage = %storage.describe(), "no server state yet, starting from defaults");
                ServerState::default()
            }
            Some(bytes) => match serde_json::from_slice::<ServerState>(&bytes) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(
                        storage = %storage.describe(),
                        error = %e,
                        "server state is corrupt, replacing it with defaults"
                    );
                    ServerState::default()
                }
            },
        };
        Ok(Self { storage, state })
    }

    /// Open the backend named by `url`.
    pub fn from_url(url: &str) -> Result<Self, LifecycleError> {
        Self::open(open_storage(url)?)
    }

    /// Apply the configured history bound.
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.state.max_history = max_history.max(1);
        self
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    pub fn mode(&self) -> &ServerMode {
        &self.state.mode
    }

    pub fn save(&self) -> Result<(), LifecycleError> {
        let json = serde_json::to_vec_pretty(&self.state)?;
        self.storage.write(&json)?;
        tracing::debug!(storage = %self.storage.describe(), "saved server state");
        Ok(())
    }

    /// Mutate the state and persist it.
    pub fn update<T>(
        &mut self,
        f: impl FnOnce(&mut ServerState) -> Result<T, LifecycleError>,
    ) -> Result<T, LifecycleError> {
        let value = f(&mut self.state)?;
        self.save()?;
        Ok(value)
    }

    /// Change either mode flag, leaving the other untouched.
    pub fn set_mode(
        &mut self,
        dry_run: Option<bool>,
        disabled: Option<bool>,
    ) -> Result<ServerMode, LifecycleError> {
        self.update(|state| {
            if let Some(dry_run) = dry_run {
                state.mode.dry_run = dry_run;
            }
            if let Some(disabled) = disabled {
                state.mode.disabled = disabled;
            }
            tracing::info!(
                dry_run = state.mode.dry_run,
                disabled = state.mode.disabled,
                "server mode updated"
            );
            Ok(state.mode.clone())
        })
    }
}
