use std::{sync::Arc, time::Duration};

use dashmap::{mapref::entry::Entry, DashMap};
use meshroute_logger::tracing::{info, warn};

use super::{
    app_rule_data_id,
    listener::{MeshAppRuleListener, MeshRuleListener},
    MESH_RULE_GROUP,
};
use crate::{
    config_center::{BoxRuleTextListener, EnvRuleSource, RuleSource, RuleTextListener},
    executor::PoolExecutor,
};

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Process-wide directory of per-application rule listeners. One logical
/// subscription exists per application however many routers reference it.
pub struct MeshRuleManager {
    rule_source: Arc<dyn RuleSource>,
    env_sources: Vec<Arc<dyn EnvRuleSource>>,
    subscriptions: DashMap<String, AppRuleSubscription>,
    executor: Arc<PoolExecutor>,
    fetch_timeout: Duration,
}

struct AppRuleSubscription {
    listener: Arc<MeshAppRuleListener>,
    // what the rule source holds, so remove_listener can pointer-match it
    dispatcher: BoxRuleTextListener,
}

/// Re-dispatches pushed rule text onto the shared worker pool so rule
/// parsing and fan-out never run on the config source's callback thread.
struct ExecutorDispatch {
    listener: Arc<MeshAppRuleListener>,
    executor: Arc<PoolExecutor>,
}

impl RuleTextListener for ExecutorDispatch {
    fn receive(&self, raw: &str) {
        let listener = self.listener.clone();
        let raw = raw.to_string();
        self.executor.spawn(async move {
            listener.receive_rule(&raw);
        });
    }
}

impl MeshRuleManager {
    pub fn new(
        rule_source: Arc<dyn RuleSource>,
        env_sources: Vec<Arc<dyn EnvRuleSource>>,
        executor: Arc<PoolExecutor>,
    ) -> Self {
        Self {
            rule_source,
            env_sources,
            subscriptions: DashMap::new(),
            executor,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Idempotent subscribe: exactly one listener per application, even when
    /// called concurrently. The losing racer returns without side effects.
    /// The initial fetch is bounded by the fetch timeout; on failure the
    /// subscription proceeds with an empty rule state.
    pub fn subscribe_app_rule(&self, app: &str) {
        let (listener, dispatcher) = match self.subscriptions.entry(app.to_string()) {
            Entry::Occupied(_) => return,
            Entry::Vacant(vacant) => {
                let listener = Arc::new(MeshAppRuleListener::new(app));
                let dispatcher: BoxRuleTextListener = Arc::new(ExecutorDispatch {
                    listener: listener.clone(),
                    executor: self.executor.clone(),
                });
                vacant.insert(AppRuleSubscription {
                    listener: listener.clone(),
                    dispatcher: dispatcher.clone(),
                });
                (listener, dispatcher)
            }
        };

        let data_id = app_rule_data_id(app);
        match self
            .rule_source
            .get_rule(&data_id, MESH_RULE_GROUP, self.fetch_timeout)
        {
            Ok(Some(rule)) => listener.receive_rule(&rule),
            Ok(None) => info!("no mesh rule published yet for app {}", app),
            Err(e) => warn!("initial mesh rule fetch failed for app {}: {}", app, e),
        }
        self.rule_source
            .add_listener(&data_id, MESH_RULE_GROUP, dispatcher.clone());

        for env_source in &self.env_sources {
            if env_source.is_enabled() {
                env_source.on_subscribe(app, dispatcher.clone());
            }
        }
    }

    /// No-op when the application was never subscribed.
    pub fn unsubscribe_app_rule(&self, app: &str) {
        let Some((_, subscription)) = self.subscriptions.remove(app) else {
            return;
        };
        let data_id = app_rule_data_id(app);
        self.rule_source
            .remove_listener(&data_id, MESH_RULE_GROUP, &subscription.dispatcher);
        for env_source in &self.env_sources {
            if env_source.is_enabled() {
                env_source.on_unsubscribe(app);
            }
        }
    }

    /// Adds a router to an application's rule fan-out, subscribing to the
    /// application first when needed, so callers need not order `notify`
    /// against an explicit subscribe.
    pub fn register(&self, app: &str, router: Arc<dyn MeshRuleListener>) {
        if !self.subscriptions.contains_key(app) {
            self.subscribe_app_rule(app);
        }
        match self.subscriptions.get(app) {
            Some(subscription) => subscription.listener.register(router),
            None => warn!("no rule listener available for app {}, register ignored", app),
        }
    }

    pub fn unregister(&self, app: &str, router: &Arc<dyn MeshRuleListener>) {
        if let Some(subscription) = self.subscriptions.get(app) {
            subscription.listener.unregister(router);
        }
    }

    /// Removes the router from every application fan-out it appears in;
    /// teardown paths that no longer know their application set use this.
    pub fn unregister_all(&self, router: &Arc<dyn MeshRuleListener>) {
        for entry in self.subscriptions.iter() {
            entry.value().listener.unregister(router);
        }
    }

    pub fn is_subscribed(&self, app: &str) -> bool {
        self.subscriptions.contains_key(app)
    }
}
