use std::{
    collections::{HashMap, HashSet},
    fmt::{Debug, Formatter},
    sync::{Arc, Mutex, Weak},
};

use arc_swap::ArcSwap;
use meshroute_base::Url;
use meshroute_config::{RouteDestination, RouteDetailConfig};
use meshroute_logger::tracing::{debug, warn};
use rand::Rng;

use super::{cache::MeshRuleCache, listener::MeshRuleListener, manager::MeshRuleManager, RuleGroup};
use crate::{
    cluster::router::Router,
    invocation::{Invocation, RpcInvocation},
};

/// Tunables distinguishing router flavors; stands in for a subclass
/// hierarchy. `force` makes an unsatisfiable rule drop traffic instead of
/// falling back to the unfiltered candidates.
#[derive(Debug, Clone, Copy)]
pub struct MeshRouterStrategy {
    pub priority: i32,
    pub force: bool,
}

pub const STANDARD_MESH_ROUTER: MeshRouterStrategy = MeshRouterStrategy {
    priority: 1000,
    force: false,
};

/// Per-service mesh routing engine. Holds the current invoker set and the
/// current rule cache; narrows candidate invokers per invocation by the
/// match → weighted-select → subset-resolve → fallback algorithm.
///
/// The hot path reads one atomically published cache snapshot and computes
/// the rest locally; it never blocks behind a rebuild. Rebuilds (invoker or
/// rule churn) serialize on a per-router mutex and publish build-whole
/// caches, so a reader can never observe a cache mixing two generations.
pub struct MeshRuleRouter {
    url: Url,
    service_key: String,
    strategy: MeshRouterStrategy,
    manager: Arc<MeshRuleManager>,
    // request predicates may match on the caller's own labels
    source_labels: HashMap<String, String>,
    state: Mutex<RouterState>,
    cache: ArcSwap<MeshRuleCache>,
    // handed to listeners as the fan-out registration for this router
    weak_self: Weak<MeshRuleRouter>,
}

#[derive(Default)]
struct RouterState {
    invokers: Vec<Url>,
    remote_apps: HashSet<String>,
    rule_groups: HashMap<String, RuleGroup>,
}

impl MeshRuleRouter {
    pub fn new(url: Url, strategy: MeshRouterStrategy, manager: Arc<MeshRuleManager>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            service_key: url.service_key(),
            source_labels: url.params.clone(),
            url,
            strategy,
            manager,
            state: Mutex::new(RouterState::default()),
            cache: ArcSwap::from_pointee(MeshRuleCache::default()),
            weak_self: weak_self.clone(),
        })
    }

    /// The default flavor used by the dispatch layer.
    pub fn standard(url: Url, manager: Arc<MeshRuleManager>) -> Arc<Self> {
        Self::new(url, STANDARD_MESH_ROUTER, manager)
    }

    pub fn strategy(&self) -> MeshRouterStrategy {
        self.strategy
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Wholesale replacement of the known invoker set. Diffs the referenced
    /// application names and (un)subscribes with the rule manager for
    /// appearing/disappearing applications; rebuilds and publishes the cache.
    pub fn notify(&self, invokers: Vec<Url>) {
        let (added, removed) = {
            let mut state = self.state.lock().unwrap();
            let new_apps: HashSet<String> =
                invokers.iter().filter_map(|invoker| invoker.application()).collect();
            let added: Vec<String> = new_apps.difference(&state.remote_apps).cloned().collect();
            let removed: Vec<String> = state.remote_apps.difference(&new_apps).cloned().collect();
            for app in &removed {
                state.rule_groups.remove(app);
            }
            state.invokers = invokers;
            state.remote_apps = new_apps;
            self.rebuild_locked(&mut state);
            (added, removed)
        };

        // registration runs after the state lock is released: register
        // delivers an immediate catch-up callback that re-enters it
        let Some(listener) = self.as_listener() else {
            return;
        };
        for app in added {
            self.manager.register(&app, listener.clone());
        }
        for app in removed {
            self.manager.unregister(&app, &listener);
        }
    }

    /// Detaches this router from every application listener it is registered
    /// with; required before dropping a router so fan-out sets do not leak.
    pub fn stop(&self) {
        let apps: Vec<String> = {
            let mut state = self.state.lock().unwrap();
            state.remote_apps.drain().collect()
        };
        let Some(listener) = self.as_listener() else {
            return;
        };
        for app in apps {
            self.manager.unregister(&app, &listener);
        }
    }

    fn as_listener(&self) -> Option<Arc<dyn MeshRuleListener>> {
        self.weak_self
            .upgrade()
            .map(|router| router as Arc<dyn MeshRuleListener>)
    }

    fn rebuild_locked(&self, state: &mut RouterState) {
        let cache = MeshRuleCache::build(&self.service_key, &state.invokers, &state.rule_groups);
        self.cache.store(Arc::new(cache));
    }

    /// First virtual-service route applying to the target service, then its
    /// first route detail whose predicates accept the invocation.
    fn resolve_destinations<'a>(
        &self,
        cache: &'a MeshRuleCache,
        app: &str,
        invocation: &RpcInvocation,
    ) -> Option<&'a [RouteDestination]> {
        let group = cache.rule_group(app)?;
        let service_name = invocation.get_target_service_unique_name();
        let route = group
            .virtual_services
            .iter()
            .flat_map(|virtual_service| virtual_service.spec.routes.iter())
            .find(|route| route.applies_to(&service_name))?;

        let method = invocation.get_method_name();
        let detail: &RouteDetailConfig = route.details.iter().find(|detail| {
            detail.matches.is_empty()
                || detail.matches.iter().any(|rule| {
                    rule.is_match(&method, invocation.attachments(), &self.source_labels)
                })
        })?;
        if detail.route.is_empty() {
            None
        } else {
            Some(&detail.route)
        }
    }

    /// Weighted random pick over the destination list, then subset
    /// resolution down the fallback chain; a failed weighted pick falls
    /// through to a linear scan in declared order.
    fn select_invokers(
        &self,
        cache: &MeshRuleCache,
        app: &str,
        destinations: &[RouteDestination],
        candidates: &[Url],
    ) -> Option<Vec<Url>> {
        let total: i64 = destinations
            .iter()
            .map(|destination| destination.effective_weight())
            .sum();
        let mut target = rand::thread_rng().gen_range(0..total);
        for destination in destinations {
            target -= destination.effective_weight();
            if target <= 0 {
                if let Some(found) = self.resolve_subset(cache, app, destination, candidates) {
                    return Some(found);
                }
                break;
            }
        }
        for destination in destinations {
            if let Some(found) = self.resolve_subset(cache, app, destination, candidates) {
                return Some(found);
            }
        }
        debug!(
            "no destination of app {} resolved to live invokers for {}",
            app, self.service_key
        );
        None
    }

    /// Walks a destination's fallback chain until a subset intersects the
    /// candidates.
    fn resolve_subset(
        &self,
        cache: &MeshRuleCache,
        app: &str,
        destination: &RouteDestination,
        candidates: &[Url],
    ) -> Option<Vec<Url>> {
        let mut current = Some(destination);
        while let Some(destination) = current {
            if let Some(subset_invokers) = cache.subset_invokers(app, &destination.subset) {
                let live: Vec<Url> = subset_invokers
                    .iter()
                    .filter(|invoker| candidates.contains(invoker))
                    .cloned()
                    .collect();
                if !live.is_empty() {
                    return Some(live);
                }
            }
            current = destination.fallback.as_deref();
        }
        None
    }
}

impl Router for MeshRuleRouter {
    fn route(&self, invokers: Vec<Url>, _url: Url, invocation: Arc<RpcInvocation>) -> Vec<Url> {
        // one snapshot per call; never re-read while computing
        let cache = self.cache.load_full();
        if cache.is_empty() {
            return invokers;
        }

        let mut selected: Vec<Url> = Vec::new();
        for app in cache.app_list() {
            let Some(destinations) = self.resolve_destinations(&cache, app, &invocation) else {
                continue;
            };
            if let Some(found) = self.select_invokers(&cache, app, destinations, &invokers) {
                for invoker in found {
                    if !selected.contains(&invoker) {
                        selected.push(invoker);
                    }
                }
            }
        }

        if selected.is_empty() {
            if self.strategy.force {
                warn!(
                    "mesh rules for {} matched no live invoker and force is set, dropping traffic",
                    self.service_key
                );
                return Vec::new();
            }
            // an over-restrictive rule must not take the whole service down
            return invokers;
        }
        invokers
            .into_iter()
            .filter(|invoker| selected.contains(invoker))
            .collect()
    }
}

impl MeshRuleListener for MeshRuleRouter {
    /// Replaces this one application's rule group and republishes the cache.
    /// A push whose documents all fail typed conversion keeps the previous
    /// state for the application instead of wiping it.
    fn on_rule_change(&self, app: &str, documents: &[serde_yaml::Value]) {
        let group = RuleGroup::from_documents(app, documents);
        if group.is_empty() && !documents.is_empty() {
            warn!(
                "no usable rule document for app {}, keeping its previous rules",
                app
            );
            return;
        }
        let mut state = self.state.lock().unwrap();
        if group.is_empty() {
            state.rule_groups.remove(app);
        } else {
            state.rule_groups.insert(app.to_string(), group);
        }
        self.rebuild_locked(&mut state);
    }

    fn clear_rule(&self, app: &str) {
        let mut state = self.state.lock().unwrap();
        state.rule_groups.remove(app);
        self.rebuild_locked(&mut state);
    }
}

impl Debug for MeshRuleRouter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshRuleRouter")
            .field("service_key", &self.service_key)
            .field("strategy", &self.strategy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        cluster::router::mesh::MESH_RULE_GROUP,
        config_center::MemoryRuleSource,
        executor::ExecutorRepository,
    };

    fn invoker(port: u16, app: &str, version: &str) -> Url {
        Url::from_url(&format!(
            "tri://10.0.0.{}:{}/org.example.PayService?application={}&version={}",
            port % 250,
            port,
            app,
            version
        ))
        .unwrap()
    }

    fn consumer_url() -> Url {
        Url::from_url("consumer://10.0.0.99:0/org.example.PayService?side=consumer").unwrap()
    }

    fn invocation() -> Arc<RpcInvocation> {
        Arc::new(
            RpcInvocation::default()
                .with_service_unique_name("org.example.PayService".to_string())
                .with_method_name("pay".to_string()),
        )
    }

    fn setup() -> (ExecutorRepository, Arc<MemoryRuleSource>, Arc<MeshRuleManager>) {
        let repository = ExecutorRepository::new();
        let source = Arc::new(MemoryRuleSource::new());
        let manager = Arc::new(MeshRuleManager::new(
            source.clone(),
            vec![],
            repository.shared_executor(),
        ));
        (repository, source, manager)
    }

    const PAYMENTS_RULE: &str = r#"
kind: DestinationRule
spec:
  host: payments
  subsets:
    - name: v1
      labels:
        version: "1"
    - name: v2
      labels:
        version: "2"
---
kind: VirtualService
spec:
  routes:
    - routeDetail:
        - route:
            - subset: v1
              weight: 80
            - subset: v2
              weight: 20
"#;

    #[test]
    fn test_route_without_rules_is_pass_through() {
        let (repository, _source, manager) = setup();
        let router = MeshRuleRouter::standard(consumer_url(), manager);
        let invokers = vec![invoker(1, "payments", "1"), invoker(2, "payments", "2")];
        router.notify(invokers.clone());

        let routed = router.route(invokers.clone(), consumer_url(), invocation());
        assert_eq!(routed, invokers);
        repository.destroy_all();
    }

    #[test]
    fn test_notify_subscribes_and_rule_applies() {
        let (repository, source, manager) = setup();
        source.publish("payments.MESHAPPRULE", MESH_RULE_GROUP, PAYMENTS_RULE);

        let router = MeshRuleRouter::standard(consumer_url(), manager.clone());
        let invokers = vec![
            invoker(1, "payments", "1"),
            invoker(2, "payments", "1"),
            invoker(3, "payments", "2"),
        ];
        router.notify(invokers.clone());
        assert!(manager.is_subscribed("payments"));

        let routed = router.route(invokers.clone(), consumer_url(), invocation());
        // always exactly one subset, never the mixed full list
        assert!(routed.len() == 2 || routed.len() == 1);
        repository.destroy_all();
    }

    #[test]
    fn test_rule_push_after_notify_is_picked_up() {
        let (repository, source, manager) = setup();
        let router = MeshRuleRouter::standard(consumer_url(), manager);
        let invokers = vec![invoker(1, "payments", "1"), invoker(3, "payments", "2")];
        router.notify(invokers.clone());

        let routed = router.route(invokers.clone(), consumer_url(), invocation());
        assert_eq!(routed, invokers);

        // push goes through the shared pool; wait for it to land
        source.publish("payments.MESHAPPRULE", MESH_RULE_GROUP, PAYMENTS_RULE);
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            let routed = router.route(invokers.clone(), consumer_url(), invocation());
            if routed.len() == 1 {
                break;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "rule push never reached the router"
            );
            std::thread::sleep(Duration::from_millis(10));
        }
        repository.destroy_all();
    }

    #[test]
    fn test_clear_rule_restores_pass_through() {
        let (repository, source, manager) = setup();
        source.publish("payments.MESHAPPRULE", MESH_RULE_GROUP, PAYMENTS_RULE);

        let router = MeshRuleRouter::standard(consumer_url(), manager);
        let invokers = vec![invoker(1, "payments", "1"), invoker(3, "payments", "2")];
        router.notify(invokers.clone());
        assert_ne!(
            router.route(invokers.clone(), consumer_url(), invocation()),
            invokers
        );

        router.clear_rule("payments");
        assert_eq!(
            router.route(invokers.clone(), consumer_url(), invocation()),
            invokers
        );
        repository.destroy_all();
    }

    #[test]
    fn test_all_documents_malformed_keeps_previous_rules() {
        let (repository, source, manager) = setup();
        source.publish("payments.MESHAPPRULE", MESH_RULE_GROUP, PAYMENTS_RULE);

        let router = MeshRuleRouter::standard(consumer_url(), manager);
        let invokers = vec![invoker(1, "payments", "1"), invoker(3, "payments", "2")];
        router.notify(invokers.clone());

        // well-formed YAML whose `spec` block fails typed conversion
        let documents = meshroute_utils::yaml_util::yaml_multi_document_parser(
            "kind: DestinationRule\nspec:\n  subsets: 3\n",
        )
        .unwrap();
        router.on_rule_change("payments", &documents);
        assert_eq!(
            router
                .route(invokers.clone(), consumer_url(), invocation())
                .len(),
            1
        );
        repository.destroy_all();
    }

    #[test]
    fn test_stop_unregisters_from_listeners() {
        let (repository, source, manager) = setup();
        let router = MeshRuleRouter::standard(consumer_url(), manager);
        let invokers = vec![invoker(1, "payments", "1"), invoker(3, "payments", "2")];
        router.notify(invokers.clone());
        router.stop();

        // a push after stop must not reach this router
        source.publish("payments.MESHAPPRULE", MESH_RULE_GROUP, PAYMENTS_RULE);
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(
            router.route(invokers.clone(), consumer_url(), invocation()),
            invokers
        );
        repository.destroy_all();
    }
}
