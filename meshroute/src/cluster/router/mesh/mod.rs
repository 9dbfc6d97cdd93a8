//! Mesh rule routing: per-application traffic rules (subsets + virtual
//! services) narrowing the invoker set of each outbound call.

pub mod cache;
pub mod listener;
pub mod manager;
pub mod router;

use meshroute_config::{
    DestinationRuleConfig, VirtualServiceConfig, DESTINATION_RULE_KIND, VIRTUAL_SERVICE_KIND,
};
use meshroute_logger::tracing::{error, warn};

/// Data-id convention for per-application mesh rules in the rule source.
pub const MESH_RULE_DATA_ID_SUFFIX: &str = ".MESHAPPRULE";
pub const MESH_RULE_GROUP: &str = "mesh";

pub fn app_rule_data_id(app: &str) -> String {
    format!("{}{}", app, MESH_RULE_DATA_ID_SUFFIX)
}

/// All rules currently known for one remote application. Replaced wholesale
/// on every rule change, never patched in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleGroup {
    pub destination_rules: Vec<DestinationRuleConfig>,
    pub virtual_services: Vec<VirtualServiceConfig>,
}

impl RuleGroup {
    pub fn is_empty(&self) -> bool {
        self.destination_rules.is_empty() && self.virtual_services.is_empty()
    }

    /// Typed conversion of parsed rule documents. Individually malformed or
    /// unknown-kind documents are skipped with an error log; the rest apply.
    pub fn from_documents(app: &str, documents: &[serde_yaml::Value]) -> RuleGroup {
        let mut group = RuleGroup::default();
        for document in documents {
            match meshroute_config::kind_of(document) {
                Some(DESTINATION_RULE_KIND) => {
                    match serde_yaml::from_value::<DestinationRuleConfig>(document.clone()) {
                        Ok(rule) => group.destination_rules.push(rule),
                        Err(e) => error!(
                            "skipping malformed DestinationRule for app {}: {}",
                            app, e
                        ),
                    }
                }
                Some(VIRTUAL_SERVICE_KIND) => {
                    match serde_yaml::from_value::<VirtualServiceConfig>(document.clone()) {
                        Ok(rule) => group.virtual_services.push(rule),
                        Err(e) => error!(
                            "skipping malformed VirtualService for app {}: {}",
                            app, e
                        ),
                    }
                }
                other => warn!(
                    "skipping rule document with unsupported kind {:?} for app {}",
                    other, app
                ),
            }
        }
        group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshroute_utils::yaml_util::yaml_multi_document_parser;

    #[test]
    fn test_from_documents_classifies_by_kind() {
        let documents = yaml_multi_document_parser(
            "kind: DestinationRule\nspec:\n  host: payments\n---\nkind: VirtualService\n",
        )
        .unwrap();
        let group = RuleGroup::from_documents("payments", &documents);
        assert_eq!(group.destination_rules.len(), 1);
        assert_eq!(group.virtual_services.len(), 1);
        assert_eq!(group.destination_rules[0].spec.host, "payments");
    }

    #[test]
    fn test_from_documents_skips_unknown_kind() {
        let documents =
            yaml_multi_document_parser("kind: Gateway\n---\nkind: DestinationRule\n").unwrap();
        let group = RuleGroup::from_documents("payments", &documents);
        assert_eq!(group.destination_rules.len(), 1);
        assert!(group.virtual_services.is_empty());
    }

    #[test]
    fn test_from_documents_skips_structurally_invalid_document() {
        // `spec.subsets` must be a sequence; scalar makes the typed parse fail
        let documents = yaml_multi_document_parser(
            "kind: DestinationRule\nspec:\n  subsets: 3\n---\nkind: VirtualService\n",
        )
        .unwrap();
        let group = RuleGroup::from_documents("payments", &documents);
        assert!(group.destination_rules.is_empty());
        assert_eq!(group.virtual_services.len(), 1);
    }
}
