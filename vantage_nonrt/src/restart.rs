//! The concrete [`RestartTarget`] for the RT process: shells out to
//! `systemctl restart` for the configured service unit. Checkpoint
//! recovery is logged but not yet wired into the RT process's own
//! config reload path — the RT binary always starts from a clean
//! state today.

use vantage_common::error::CoreError;
use vantage_ha::{RestartTarget, StateCheckpoint};

pub struct SystemdRestartTarget {
    unit_name: String,
}

impl SystemdRestartTarget {
    pub fn new(unit_name: impl Into<String>) -> Self {
        Self { unit_name: unit_name.into() }
    }
}

impl RestartTarget for SystemdRestartTarget {
    fn restart(&self, checkpoint: Option<&StateCheckpoint>) -> Result<(), CoreError> {
        if let Some(cp) = checkpoint {
            tracing::info!(checkpoint = %cp.checkpoint_id, "restarting with recovered checkpoint available");
        }
        let status = std::process::Command::new("systemctl")
            .args(["restart", &self.unit_name])
            .status()
            .map_err(|e| CoreError::TransientIO(format!("systemctl restart failed: {e}")))?;
        if !status.success() {
            return Err(CoreError::TransientIO(format!(
                "systemctl restart exited with {status}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_without_checkpoint_does_not_panic_on_missing_systemctl() {
        let target = SystemdRestartTarget::new("vantage-rt.service");
        let _ = target.restart(None);
    }
}
