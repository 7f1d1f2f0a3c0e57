//! Immutable view of the configured dependencies and their policies.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::schema::{GuardConfig, CACHE_CLASS, DATABASE_CLASS, EXTERNAL_AI_CLASS};
use crate::config::validation::{validate_config, ValidationError};
use crate::resilience::policy::CallPolicy;

/// One configured dependency.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencySpec {
    pub identity: String,
    pub class: String,
    pub policy: Arc<CallPolicy>,
    pub probe_url: Option<String>,
}

/// Policies by class and dependencies by identity.
#[derive(Debug, Clone)]
pub struct DependencyCatalog {
    policies: HashMap<String, Arc<CallPolicy>>,
    dependencies: BTreeMap<String, DependencySpec>,
    fallback: Arc<CallPolicy>,
}

impl DependencyCatalog {
    /// Build from a configuration, validating it first.
    pub fn from_config(config: &GuardConfig) -> Result<Self, Vec<ValidationError>> {
        validate_config(config)?;

        let mut policies = HashMap::new();
        for (class, policy) in &config.policies {
            let policy = policy.to_policy().map_err(|source| {
                vec![ValidationError::Policy {
                    class: class.clone(),
                    source,
                }]
            })?;
            policies.insert(class.clone(), Arc::new(policy));
        }

        let fallback = policies
            .get(DATABASE_CLASS)
            .cloned()
            .unwrap_or_else(|| Arc::new(CallPolicy::database()));

        let mut dependencies = BTreeMap::new();
        for dep in &config.dependencies {
            // Validation guarantees the class exists.
            let policy = policies.get(&dep.class).cloned().unwrap_or_else(|| fallback.clone());
            dependencies.insert(
                dep.identity.clone(),
                DependencySpec {
                    identity: dep.identity.clone(),
                    class: dep.class.clone(),
                    policy,
                    probe_url: dep.probe_url.clone(),
                },
            );
        }

        Ok(Self {
            policies,
            dependencies,
            fallback,
        })
    }

    pub fn dependency(&self, identity: &str) -> Option<&DependencySpec> {
        self.dependencies.get(identity)
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &DependencySpec> {
        self.dependencies.values()
    }

    pub fn class_policy(&self, class: &str) -> Option<Arc<CallPolicy>> {
        self.policies.get(class).cloned()
    }

    /// Policy for `identity`; unknown identities get the `database` class.
    pub fn policy_for(&self, identity: &str) -> Arc<CallPolicy> {
        match self.dependencies.get(identity) {
            Some(spec) => spec.policy.clone(),
            None => self.fallback.clone(),
        }
    }

    /// Dependencies that the monitor should probe.
    pub fn probe_targets(&self) -> Vec<DependencySpec> {
        self.dependencies
            .values()
            .filter(|d| d.probe_url.is_some())
            .cloned()
            .collect()
    }
}

impl Default for DependencyCatalog {
    fn default() -> Self {
        let mut policies = HashMap::new();
        for (class, policy) in [
            (DATABASE_CLASS, CallPolicy::database()),
            (CACHE_CLASS, CallPolicy::cache()),
            (EXTERNAL_AI_CLASS, CallPolicy::external_ai()),
        ] {
            policies.insert(class.to_string(), Arc::new(policy));
        }
        Self {
            policies,
            dependencies: BTreeMap::new(),
            fallback: Arc::new(CallPolicy::database()),
        }
    }
}
