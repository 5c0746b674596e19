//! Builder for chains.

use std::sync::Arc;

use super::{Chain, Controller, Device};
use crate::channel::{PtySpawner, SessionConfig, Spawner};
use crate::error::{Error, Result};
use crate::platform::PatternRegistry;
use crate::transport::{HopInfo, PromptDetectionConfig};

/// Builder for constructing a [`Chain`].
///
/// Hops are added in the order they are traversed; the last one is the
/// target.
///
/// # Example
///
/// ```rust,no_run
/// use hopline::chain::ChainBuilder;
/// use hopline::transport::HopInfo;
///
/// # async fn example() -> Result<(), hopline::Error> {
/// let mut chain = ChainBuilder::new()
///     .hop(HopInfo::new("jump.example.net").protocol("ssh").username("admin").password("secret"))
///     .hop(HopInfo::new("10.0.0.1").username("cisco").password("cisco"))
///     .build()?;
///
/// chain.connect().await?;
/// # Ok(())
/// # }
/// ```
pub struct ChainBuilder {
    hops: Vec<HopInfo>,
    spawner: Option<Arc<dyn Spawner>>,
    registry: Option<Arc<PatternRegistry>>,
    session_config: SessionConfig,
    prompt_config: PromptDetectionConfig,
}

impl ChainBuilder {
    /// Create a builder with no hops.
    pub fn new() -> Self {
        Self {
            hops: Vec::new(),
            spawner: None,
            registry: None,
            session_config: SessionConfig::default(),
            prompt_config: PromptDetectionConfig::default(),
        }
    }

    /// Append a hop.
    pub fn hop(mut self, hop: HopInfo) -> Self {
        self.hops.push(hop);
        self
    }

    /// Append several hops.
    pub fn hops(mut self, hops: impl IntoIterator<Item = HopInfo>) -> Self {
        self.hops.extend(hops);
        self
    }

    /// Set how client processes are started (default: a local PTY).
    pub fn spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Set the pattern registry (default: the built-in patterns).
    pub fn registry(mut self, registry: Arc<PatternRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the session settings.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Set the prompt detection tuning.
    pub fn prompt_detection(mut self, config: PromptDetectionConfig) -> Self {
        self.prompt_config = config;
        self
    }

    /// Build the chain.
    pub fn build(self) -> Result<Chain> {
        if self.hops.is_empty() {
            return Err(Error::general("chain", "No hops given"));
        }
        let registry = self.registry.unwrap_or_else(PatternRegistry::builtin);
        let spawner = self.spawner.unwrap_or_else(|| Arc::new(PtySpawner));

        let last = self.hops.len() - 1;
        let devices = self
            .hops
            .into_iter()
            .enumerate()
            .map(|(index, hop)| Device::new(hop, index == last, registry.clone(), self.prompt_config.clone()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Chain {
            ctrl: Controller::new(spawner, self.session_config),
            devices,
        })
    }
}

impl Default for ChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ScriptedSpawner;
    use crate::error::ErrorKind;

    #[test]
    fn test_last_hop_is_target() {
        let chain = ChainBuilder::new()
            .spawner(Arc::new(ScriptedSpawner::new([])))
            .hops([HopInfo::new("jump-a"), HopInfo::new("jump-b"), HopInfo::new("router")])
            .build()
            .unwrap();
        let targets: Vec<bool> = chain.devices().iter().map(|d| d.state.is_target).collect();
        assert_eq!(targets, vec![false, false, true]);
        assert_eq!(chain.target().hostname(), "router");
    }

    #[test]
    fn test_no_hops() {
        let err = ChainBuilder::new().build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::General);
    }
}
