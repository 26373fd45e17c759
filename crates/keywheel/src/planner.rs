//! Rotation decision policy
//!
//! Pure policy, no I/O: given discovered identities, decide which
//! (identity, key) pairs are due for rotation. Each key's decision is
//! independent, so an identity can hold one stale and one fresh key and only
//! the stale one is rotated.

use crate::core::{AccessKey, Identity};

/// One unit of rotation work: an identity and the stale key it retires
#[derive(Debug, Clone)]
pub struct RotationTask {
    /// Identity whose key is stale
    pub identity: Identity,
    /// The key to retire once a replacement exists
    pub stale_key: AccessKey,
}

/// Decides which keys are due for rotation
#[derive(Debug, Clone, Copy)]
pub struct RotationPlanner {
    default_rotate_after_days: i64,
}

impl RotationPlanner {
    /// Create a planner with the configured default rotation age
    #[must_use]
    pub fn new(default_rotate_after_days: i64) -> Self {
        Self {
            default_rotate_after_days,
        }
    }

    /// Effective rotation threshold for one identity
    ///
    /// The per-identity override wins when present and parseable as an
    /// integer; anything else falls back to the configured default.
    fn threshold_for(&self, identity: &Identity) -> i64 {
        identity
            .attributes
            .rotate_after_days
            .as_deref()
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(self.default_rotate_after_days)
    }

    /// Select the (identity, key) pairs due for rotation
    pub fn plan(&self, identities: Vec<Identity>) -> Vec<RotationTask> {
        let mut tasks = Vec::new();

        for identity in identities {
            match identity.keys.len() {
                0 => {
                    tracing::info!(
                        identity = %identity.name,
                        "Skipping key creation, no existing key found"
                    );
                }
                2.. => {
                    tracing::warn!(
                        identity = %identity.name,
                        "Skipping key creation, 2 keys already exist; delete one to free a slot"
                    );
                }
                _ => {
                    let threshold = self.threshold_for(&identity);
                    for key in identity.keys.clone() {
                        if key.age_days <= threshold {
                            tracing::info!(
                                identity = %identity.name,
                                key_id = %key.id,
                                age_days = key.age_days,
                                threshold,
                                "Skipping key, not yet stale"
                            );
                        } else {
                            tasks.push(RotationTask {
                                identity: identity.clone(),
                                stale_key: key,
                            });
                        }
                    }
                }
            }
        }

        tasks
    }
}
