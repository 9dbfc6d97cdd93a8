use std::sync::{Arc, RwLock};

use meshroute_logger::tracing::{debug, error};
use meshroute_utils::yaml_util::yaml_multi_document_parser;

use crate::config_center::RuleTextListener;

/// Callback surface a router exposes to the rule-distribution pipeline.
pub trait MeshRuleListener: Send + Sync {
    fn on_rule_change(&self, app: &str, documents: &[serde_yaml::Value]);
    fn clear_rule(&self, app: &str);
}

/// Owns one application's rule stream: parses pushed rule text and fans the
/// parsed documents out to every registered router.
///
/// The fan-out set is snapshotted before delivery, so registration changes
/// during a delivery never panic or starve. The latest parsed state is kept
/// so late registrants catch up immediately instead of routing on a stale
/// "no rule" view.
pub struct MeshAppRuleListener {
    app: String,
    routers: RwLock<Vec<Arc<dyn MeshRuleListener>>>,
    current: RwLock<Option<Arc<Vec<serde_yaml::Value>>>>,
}

impl MeshAppRuleListener {
    pub fn new(app: &str) -> Self {
        Self {
            app: app.to_string(),
            routers: RwLock::new(Vec::new()),
            current: RwLock::new(None),
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn register(&self, router: Arc<dyn MeshRuleListener>) {
        self.routers.write().unwrap().push(router.clone());
        let current = self.current.read().unwrap().clone();
        if let Some(documents) = current {
            router.on_rule_change(&self.app, &documents);
        }
    }

    /// Idempotent; removes every registration of the given router.
    pub fn unregister(&self, router: &Arc<dyn MeshRuleListener>) {
        self.routers
            .write()
            .unwrap()
            .retain(|registered| !Arc::ptr_eq(registered, router));
    }

    /// Handles one pushed rule text. On a parse error the previous state
    /// stays in place and no router sees a partial update; blank text clears
    /// the application's rules.
    pub fn receive_rule(&self, raw: &str) {
        if raw.trim().is_empty() {
            *self.current.write().unwrap() = None;
            for router in self.snapshot() {
                router.clear_rule(&self.app);
            }
            return;
        }
        match yaml_multi_document_parser(raw) {
            Ok(documents) => {
                debug!(
                    "received {} rule document(s) for app {}",
                    documents.len(),
                    self.app
                );
                let documents = Arc::new(documents);
                *self.current.write().unwrap() = Some(documents.clone());
                for router in self.snapshot() {
                    router.on_rule_change(&self.app, &documents);
                }
            }
            Err(e) => {
                error!("failed to parse mesh rule for app {}: {}", self.app, e);
            }
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn MeshRuleListener>> {
        self.routers.read().unwrap().clone()
    }
}

impl RuleTextListener for MeshAppRuleListener {
    fn receive(&self, raw: &str) {
        self.receive_rule(raw);
    }
}
