//! Identity and access-key model
//!
//! Identities are not persisted by keywheel; they are rediscovered from the
//! provider on every run. Enrollment and per-identity policy live entirely in
//! provider-side tags under the `keywheel:` namespace:
//!
//! - `keywheel:email` — opt-in; identities without it are never touched
//! - `keywheel:rotate_after_days` — per-identity rotation-age override
//! - `keywheel:delete_after_days` — per-identity deletion-grace override
//! - `keywheel:instruction_<N>` — numbered instruction fragments, joined in
//!   ascending numeric order into a single instruction text

use std::collections::BTreeMap;

const TAG_NAMESPACE: &str = "keywheel:";
const INSTRUCTION_PREFIX: &str = "keywheel:instruction_";

/// Attributes an identity opted into via tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityAttributes {
    /// Owner address; enrollment gate
    pub email: Option<String>,

    /// Raw rotation-age override; used only when parseable as an integer
    pub rotate_after_days: Option<String>,

    /// Raw deletion-grace override; used only when parseable as an integer
    pub delete_after_days: Option<String>,

    /// Instruction fragments joined in ascending numeric order
    pub instruction: String,
}

impl IdentityAttributes {
    /// Build attributes from provider tags
    ///
    /// Unnamespaced tags are ignored. Instruction fragments with an
    /// unparseable numeric suffix are skipped.
    pub fn from_tags<I>(tags: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut attrs = Self::default();
        let mut fragments: BTreeMap<u32, String> = BTreeMap::new();

        for (key, value) in tags {
            let lowered = key.to_lowercase();
            if let Some(suffix) = lowered.strip_prefix(INSTRUCTION_PREFIX) {
                if let Ok(order) = suffix.parse::<u32>() {
                    fragments.insert(order, value);
                }
            } else if let Some(name) = lowered.strip_prefix(TAG_NAMESPACE) {
                match name {
                    "email" => attrs.email = Some(value),
                    "rotate_after_days" => attrs.rotate_after_days = Some(value),
                    "delete_after_days" => attrs.delete_after_days = Some(value),
                    _ => {}
                }
            }
        }

        attrs.instruction = fragments.into_values().collect::<Vec<_>>().join(" ");
        attrs
    }

    /// Whether the identity opted into rotation
    #[must_use]
    pub fn is_enrolled(&self) -> bool {
        self.email.is_some()
    }
}

/// An identity together with its discovered attributes and live keys
#[derive(Debug, Clone)]
pub struct Identity {
    /// Provider-side principal name
    pub name: String,
    /// Tag-derived attributes
    pub attributes: IdentityAttributes,
    /// Live access keys, at most 2 per the provider contract
    pub keys: Vec<AccessKey>,
}

/// A live access key as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKey {
    /// Provider-assigned key id
    pub id: String,
    /// Whole days since the key was created
    pub age_days: i64,
}

/// A freshly issued key pair, the only point where the secret half is visible
#[derive(Debug, Clone)]
pub struct NewAccessKey {
    /// Provider-assigned key id
    pub id: String,
    /// Secret half; encrypted or mailed out immediately, never stored
    pub secret: String,
}
