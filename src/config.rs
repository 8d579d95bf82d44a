use std::time::Duration;

/// Configuration for an [`ActorSystem`](crate::system::ActorSystem).
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// System name, used for worker thread names and log fields.
    pub name: String,

    /// How long [`shutdown`](crate::system::ActorSystem::shutdown) waits for
    /// running actors to finish.
    pub shutdown_timeout: Duration,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "perch".to_string(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}
