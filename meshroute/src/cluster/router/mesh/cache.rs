use std::collections::HashMap;

use meshroute_base::Url;

use super::RuleGroup;
use crate::cluster::router::utils::to_param_map;

/// Point-in-time snapshot binding one invoker generation to one rule
/// generation: which invokers belong to which (application, subset). Built
/// whole by [`MeshRuleCache::build`] and never mutated afterwards; the router
/// publishes each new cache with an atomic pointer swap.
#[derive(Debug, Default)]
pub struct MeshRuleCache {
    service_key: String,
    // stored order, not hash order, so routing diagnostics are reproducible
    app_list: Vec<String>,
    rule_groups: HashMap<String, RuleGroup>,
    subset_invokers: HashMap<String, HashMap<String, Vec<Url>>>,
    unmatched: Vec<Url>,
}

impl MeshRuleCache {
    /// Pure build from one (invoker-set, rule-group-map) pair. Allocates a
    /// fresh result every call; O(invokers × subsets).
    pub fn build(
        service_key: &str,
        invokers: &[Url],
        rule_groups: &HashMap<String, RuleGroup>,
    ) -> MeshRuleCache {
        if rule_groups.is_empty() {
            return MeshRuleCache {
                service_key: service_key.to_string(),
                unmatched: invokers.to_vec(),
                ..Default::default()
            };
        }

        let mut app_list: Vec<String> = rule_groups.keys().cloned().collect();
        app_list.sort();

        let mut subset_invokers: HashMap<String, HashMap<String, Vec<Url>>> = HashMap::new();
        let mut unmatched = Vec::new();
        for invoker in invokers {
            let (app, group) = match invoker
                .application()
                .and_then(|app| rule_groups.get(&app).map(|group| (app, group)))
            {
                Some(found) => found,
                None => {
                    unmatched.push(invoker.clone());
                    continue;
                }
            };
            let params = to_param_map(invoker);
            for destination_rule in &group.destination_rules {
                for subset in &destination_rule.spec.subsets {
                    if subset.matches(&params) {
                        subset_invokers
                            .entry(app.clone())
                            .or_default()
                            .entry(subset.name.clone())
                            .or_default()
                            .push(invoker.clone());
                    }
                }
            }
        }

        MeshRuleCache {
            service_key: service_key.to_string(),
            app_list,
            rule_groups: rule_groups.clone(),
            subset_invokers,
            unmatched,
        }
    }

    /// True when no rules are loaded at all — routing is a pass-through.
    pub fn is_empty(&self) -> bool {
        self.rule_groups.is_empty()
    }

    pub fn service_key(&self) -> &str {
        &self.service_key
    }

    pub fn app_list(&self) -> &[String] {
        &self.app_list
    }

    pub fn rule_group(&self, app: &str) -> Option<&RuleGroup> {
        self.rule_groups.get(app)
    }

    pub fn subset_invokers(&self, app: &str, subset: &str) -> Option<&Vec<Url>> {
        self.subset_invokers.get(app)?.get(subset)
    }

    pub fn unmatched(&self) -> &[Url] {
        &self.unmatched
    }
}

#[cfg(test)]
mod tests {
    use meshroute_config::{DestinationRuleConfig, SubsetConfig};

    use super::*;

    fn invoker(port: u16, app: &str, version: Option<&str>) -> Url {
        let mut raw = format!(
            "tri://10.0.0.1:{}/org.example.PayService?application={}",
            port, app
        );
        if let Some(version) = version {
            raw.push_str(&format!("&version={}", version));
        }
        Url::from_url(&raw).unwrap()
    }

    fn payments_group(subsets: Vec<SubsetConfig>) -> HashMap<String, RuleGroup> {
        let mut destination_rule = DestinationRuleConfig::default();
        destination_rule.spec.host = "payments".to_string();
        destination_rule.spec.subsets = subsets;
        let group = RuleGroup {
            destination_rules: vec![destination_rule],
            virtual_services: vec![],
        };
        HashMap::from([("payments".to_string(), group)])
    }

    fn subset(name: &str, labels: &[(&str, &str)]) -> SubsetConfig {
        SubsetConfig {
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_empty_rule_map_puts_everything_in_unmatched() {
        let invokers = vec![invoker(1, "payments", None), invoker(2, "orders", None)];
        let cache = MeshRuleCache::build("svc", &invokers, &HashMap::new());
        assert!(cache.is_empty());
        assert_eq!(cache.unmatched().len(), 2);
        assert!(cache.app_list().is_empty());
    }

    #[test]
    fn test_label_matching_partitions_invokers() {
        let invokers = vec![
            invoker(1, "payments", Some("1")),
            invoker(2, "payments", Some("1")),
            invoker(3, "payments", Some("2")),
            invoker(4, "orders", Some("1")),
        ];
        let groups = payments_group(vec![
            subset("v1", &[("version", "1")]),
            subset("v2", &[("version", "2")]),
        ]);

        let cache = MeshRuleCache::build("svc", &invokers, &groups);
        assert_eq!(cache.app_list(), &["payments".to_string()]);
        assert_eq!(cache.subset_invokers("payments", "v1").unwrap().len(), 2);
        assert_eq!(cache.subset_invokers("payments", "v2").unwrap().len(), 1);
        // the orders invoker has no rule group
        assert_eq!(cache.unmatched(), &[invoker(4, "orders", Some("1"))]);
    }

    #[test]
    fn test_invoker_missing_required_label_is_excluded() {
        let invokers = vec![invoker(1, "payments", None)];
        let groups = payments_group(vec![subset("v1", &[("version", "1")])]);

        let cache = MeshRuleCache::build("svc", &invokers, &groups);
        assert!(cache.subset_invokers("payments", "v1").is_none());
        // it belongs to a ruled application, so it is not unmatched either
        assert!(cache.unmatched().is_empty());
    }

    #[test]
    fn test_empty_label_matcher_is_universal() {
        let invokers = vec![
            invoker(1, "payments", Some("1")),
            invoker(2, "payments", Some("2")),
        ];
        let groups = payments_group(vec![subset("all", &[])]);

        let cache = MeshRuleCache::build("svc", &invokers, &groups);
        assert_eq!(cache.subset_invokers("payments", "all").unwrap().len(), 2);
    }

    #[test]
    fn test_build_allocates_fresh_results() {
        let invokers = vec![invoker(1, "payments", Some("1"))];
        let groups = payments_group(vec![subset("v1", &[("version", "1")])]);

        let first = MeshRuleCache::build("svc", &invokers, &groups);
        let second = MeshRuleCache::build("svc", &[], &groups);
        assert_eq!(first.subset_invokers("payments", "v1").unwrap().len(), 1);
        assert!(second.subset_invokers("payments", "v1").is_none());
    }
}
