//! Allowlist hook evaluated before the WebSocket upgrade.

use std::sync::Arc;

use crate::config::AllowlistSection;

/// Decides whether a call id may open a session. Must be cheap; runs on the
/// upgrade path.
pub trait CallPolicy: Send + Sync {
    fn allow(&self, call_id: &str) -> bool;
}

/// Default hook: admit everything.
#[derive(Default)]
pub struct AllowAll;

impl CallPolicy for AllowAll {
    fn allow(&self, _call_id: &str) -> bool {
        true
    }
}

/// Prefix-based allowlist. An enabled hook with an empty list is a strict
/// deny, matching the rest of the config surface's fail-closed posture.
pub struct PrefixAllowlist {
    prefixes: Vec<String>,
}

impl PrefixAllowlist {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }
}

impl CallPolicy for PrefixAllowlist {
    fn allow(&self, call_id: &str) -> bool {
        self.prefixes.iter().any(|p| call_id.starts_with(p.as_str()))
    }
}

pub fn policy_from_config(cfg: &AllowlistSection) -> Arc<dyn CallPolicy> {
    if cfg.enabled {
        Arc::new(PrefixAllowlist::new(cfg.call_id_prefixes.clone()))
    } else {
        Arc::new(AllowAll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_hook_admits_all() {
        let p = policy_from_config(&AllowlistSection::default());
        assert!(p.allow("call_anything"));
    }

    #[test]
    fn enabled_empty_list_is_strict_deny() {
        let p = policy_from_config(&AllowlistSection {
            enabled: true,
            call_id_prefixes: vec![],
        });
        assert!(!p.allow("call_x"));
    }

    #[test]
    fn prefix_match() {
        let p = PrefixAllowlist::new(vec!["call_prod_".into()]);
        assert!(p.allow("call_prod_123"));
        assert!(!p.allow("call_dev_123"));
    }
}
