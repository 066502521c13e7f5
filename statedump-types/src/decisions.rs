use crate::keys::ObjectKey;
use crate::plan::ImportPlan;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// How a conflicting object is handled at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Replace the stored object (or merge into it, for mergeable kinds).
    Overwrite,
    /// Keep the stored object untouched.
    Skip,
    /// Refuse the whole commit.
    Fail,
}

/// Secret value supplied by the operator for an object that needs one.
///
/// Never printed by `Debug` and redacted when serialized on its own. The
/// configuration store persists it through [`exposed`].
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub const REDACTED: &'static str = "<redacted>";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", Self::REDACTED)
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(Self::REDACTED)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Secret)
    }
}

/// Serde adapter that writes the secret value itself. Only the configuration
/// store uses this.
pub mod exposed {
    use super::Secret;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(secret: &Option<Secret>, serializer: S) -> Result<S::Ok, S::Error> {
        match secret {
            Some(s) => serializer.serialize_some(s.expose()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Secret>, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.map(Secret::new))
    }
}

/// Operator decisions for one commit, built after reading the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decisions {
    #[serde(default = "default_schema")]
    pub schema: String,

    #[serde(default)]
    pub resolutions: BTreeMap<ObjectKey, Resolution>,

    #[serde(default)]
    pub secrets: BTreeMap<ObjectKey, Secret>,
}

fn default_schema() -> String {
    crate::schema::STATEDUMP_DECISIONS_V1.to_string()
}

impl Default for Decisions {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            resolutions: BTreeMap::new(),
            secrets: BTreeMap::new(),
        }
    }
}

impl Decisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(mut self, key: ObjectKey, resolution: Resolution) -> Self {
        self.resolutions.insert(key, resolution);
        self
    }

    pub fn with_secret(mut self, key: ObjectKey, secret: Secret) -> Self {
        self.secrets.insert(key, secret);
        self
    }

    /// Overwrite every conflict and hand every secret-requiring object the
    /// same placeholder. This is the unattended import mode; the placeholder
    /// must be changed by the operator afterwards.
    pub fn overwrite_all(plan: &ImportPlan, placeholder: &str) -> Self {
        let mut decisions = Self::new();
        for conflict in &plan.conflicts {
            decisions
                .resolutions
                .insert(conflict.key.clone(), Resolution::Overwrite);
        }
        for req in &plan.passwords_needed {
            decisions
                .secrets
                .insert(req.key.clone(), Secret::new(placeholder));
        }
        decisions
    }

    /// Conflicts in `plan` that have no resolution yet, in plan order.
    pub fn missing_resolutions(&self, plan: &ImportPlan) -> Vec<ObjectKey> {
        plan.conflicts
            .iter()
            .filter(|c| !self.resolutions.contains_key(&c.key))
            .map(|c| c.key.clone())
            .collect()
    }

    /// Password requirements in `plan` that have no secret yet, in plan order.
    pub fn missing_secrets(&self, plan: &ImportPlan) -> Vec<ObjectKey> {
        plan.passwords_needed
            .iter()
            .filter(|p| !self.secrets.contains_key(&p.key))
            .map(|p| p.key.clone())
            .collect()
    }
}
