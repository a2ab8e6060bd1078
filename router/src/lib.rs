//! The Router: a rule- and score-based LLM model selector with
//! an audit log.

mod audit;
mod classify;
mod scoring;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thane_core::{Complexity, ModelDescriptor, RoutingDecision, RoutingRequest};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

pub use audit::{AuditLog, DEFAULT_MAX_AUDIT};
pub use classify::{classify_complexity, classify_intent};
pub use scoring::{rule_names, score, RouterTunables};

/// Construction-time configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub roster: Vec<ModelDescriptor>,
    pub default_model: String,
    pub max_audit: usize,
    pub local_first: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            roster: Vec::new(),
            default_model: "default".to_string(),
            max_audit: DEFAULT_MAX_AUDIT,
            local_first: false,
        }
    }
}

struct RouterState {
    audit: AuditLog,
    /// Per-model rolling-average latency in ms, updated as a rolling
    /// `(old+new)/2` on each recorded outcome.
    avg_latency_ms: HashMap<String, u64>,
}

/// The Router. Cheaply cloneable: internal state is behind an
/// `Arc<RwLock<_>>` so every mutating operation (route, record, audit-trim,
/// stats update) takes an exclusive lock while reads take a shared lock
///.
#[derive(Clone)]
pub struct Router {
    config: Arc<RouterConfig>,
    state: Arc<RwLock<RouterState>>,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        let audit = AuditLog::new(config.max_audit);
        Self {
            config: Arc::new(config),
            state: Arc::new(RwLock::new(RouterState {
                audit,
                avg_latency_ms: HashMap::new(),
            })),
        }
    }

    /// Highest configured quality, or 10 when the roster is empty.
    pub fn max_quality(&self) -> u8 {
        ModelDescriptor::max_quality(&self.config.roster)
    }

    /// Runs the full pipeline and appends the
    /// resulting `RoutingDecision` to the audit ring.
    pub async fn route(&self, request: RoutingRequest) -> RoutingDecision {
        let complexity = classify_complexity(&request.query);
        let intent = classify_intent(&request.query);

        let eligible: Vec<&ModelDescriptor> = self
            .config
            .roster
            .iter()
            .filter(|m| !(request.needs_tools && !m.supports_tools))
            .filter(|m| {
                !(m.context_window > 0
                    && request.context_size > 0
                    && m.context_window < request.context_size)
            })
            .collect();

        let request_id = Uuid::now_v7();
        let timestamp = Utc::now();

        if eligible.is_empty() {
            debug!(%request_id, "no eligible models; falling back to default");
            let decision = RoutingDecision {
                request_id,
                timestamp,
                query: request.query.clone(),
                context_size: request.context_size,
                needs_tools: request.needs_tools,
                tool_count: request.tool_count,
                priority: request.priority,
                hints: request.hints.clone(),
                complexity,
                intent,
                rules_evaluated: Vec::new(),
                rules_matched: Vec::new(),
                scores: HashMap::new(),
                chosen_model: self.config.default_model.clone(),
                reasoning: "no eligible models".to_string(),
                latency_ms: None,
                tokens_used: None,
                success: None,
            };
            self.append(decision.clone()).await;
            return decision;
        }

        let tunables = RouterTunables {
            local_first: self.config.local_first,
        };

        let mut scores = HashMap::new();
        let mut matched_by_model: HashMap<String, Vec<String>> = HashMap::new();
        for model in &eligible {
            let result = score(model, &request, complexity, tunables);
            scores.insert(model.name.clone(), result.score);
            matched_by_model.insert(model.name.clone(), result.matched_rules);
        }

        // Select max score; ties break by lower cost_tier, then higher quality.
        let winner = eligible
            .iter()
            .max_by(|a, b| {
                let sa = scores[&a.name];
                let sb = scores[&b.name];
                sa.cmp(&sb)
                    .then_with(|| b.cost_tier.cmp(&a.cost_tier))
                    .then_with(|| a.quality.cmp(&b.quality))
            })
            .expect("eligible is non-empty");

        let reasoning = format!(
            "chose {} (score {}) for {:?} complexity query",
            winner.name, scores[&winner.name], complexity
        );

        let decision = RoutingDecision {
            request_id,
            timestamp,
            query: request.query.clone(),
            context_size: request.context_size,
            needs_tools: request.needs_tools,
            tool_count: request.tool_count,
            priority: request.priority,
            hints: request.hints.clone(),
            complexity,
            intent,
            rules_evaluated: rule_names(),
            rules_matched: matched_by_model.remove(&winner.name).unwrap_or_default(),
            scores,
            chosen_model: winner.name.clone(),
            reasoning,
            latency_ms: None,
            tokens_used: None,
            success: None,
        };

        info!(%request_id, model = %decision.chosen_model, "routed");
        self.append(decision.clone()).await;
        decision
    }

    async fn append(&self, decision: RoutingDecision) {
        let mut state = self.state.write().await;
        state.audit.push(decision);
    }

    /// `RecordOutcome(request_id, latency_ms, tokens_used, success)`. An unknown id is a silent no-op.
    pub async fn record_outcome(
        &self,
        request_id: Uuid,
        latency_ms: u64,
        tokens_used: u32,
        success: bool,
    ) {
        let mut state = self.state.write().await;
        let Some(decision) = state.audit.find_mut(request_id) else {
            return;
        };
        let model = decision.chosen_model.clone();
        decision.latency_ms = Some(latency_ms);
        decision.tokens_used = Some(tokens_used);
        decision.success = Some(success);

        let avg = state
            .avg_latency_ms
            .entry(model)
            .and_modify(|old| *old = (*old + latency_ms) / 2)
            .or_insert(latency_ms);
        debug!(%request_id, latency_ms = *avg, "recorded outcome");
    }

    /// Current audit log length, exposed for tests/diagnostics.
    pub async fn audit_len(&self) -> usize {
        self.state.read().await.audit.len()
    }

    /// Rolling average latency for a model, if any outcome has been recorded.
    pub async fn average_latency_ms(&self, model: &str) -> Option<u64> {
        self.state.read().await.avg_latency_ms.get(model).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thane_core::RoutingRequest;

    fn model(name: &str, tier: u8, quality: u8, speed: u8, tools: bool) -> ModelDescriptor {
        ModelDescriptor {
            name: name.to_string(),
            provider: "test".to_string(),
            supports_tools: tools,
            context_window: 8000,
            speed,
            quality,
            cost_tier: tier,
            min_complexity: Complexity::Simple,
        }
    }

    #[tokio::test]
    async fn needs_tools_filters_out_non_tool_models() {
        let router = Router::new(RouterConfig {
            roster: vec![model("no-tools", 0, 5, 5, false)],
            ..Default::default()
        });

        let mut request = RoutingRequest::new("search archives");
        request.needs_tools = true;
        let decision = router.route(request).await;
        assert_eq!(decision.chosen_model, "default");
        assert_eq!(decision.reasoning, "no eligible models");
    }

    #[tokio::test]
    async fn local_only_hint_picks_local_model() {
        // End-to-end scenario 1: local vs cloud with `local_only`.
        let router = Router::new(RouterConfig {
            roster: vec![
                model("local", 0, 5, 8, true),
                model("cloud", 3, 10, 6, true),
            ],
            ..Default::default()
        });

        let mut request = RoutingRequest::new("search archives for something");
        request.needs_tools = true;
        request
            .hints
            .insert(thane_core::hints::LOCAL_ONLY.to_string(), "true".to_string());

        let decision = router.route(request).await;
        assert_eq!(decision.chosen_model, "local");
        assert!(decision.scores["cloud"] < 0);
    }

    #[tokio::test]
    async fn record_outcome_unknown_id_is_noop() {
        let router = Router::new(RouterConfig::default());
        router.record_outcome(Uuid::now_v7(), 100, 10, true).await;
        assert_eq!(router.audit_len().await, 0);
    }

    #[tokio::test]
    async fn record_outcome_rolls_average_latency() {
        let router = Router::new(RouterConfig {
            roster: vec![model("only", 0, 5, 5, true)],
            ..Default::default()
        });
        let decision = router.route(RoutingRequest::new("hi")).await;
        router.record_outcome(decision.request_id, 100, 10, true).await;
        router.record_outcome(decision.request_id, 300, 10, true).await;
        assert_eq!(router.average_latency_ms("only").await, Some(200));
    }

    #[tokio::test]
    async fn max_quality_defaults_to_ten_for_empty_roster() {
        let router = Router::new(RouterConfig::default());
        assert_eq!(router.max_quality(), 10);
    }

    #[tokio::test]
    async fn audit_log_evicts_oldest_past_max_audit() {
        let router = Router::new(RouterConfig {
            roster: vec![model("only", 0, 5, 5, true)],
            max_audit: 2,
            ..Default::default()
        });
        for _ in 0..5 {
            router.route(RoutingRequest::new("hi")).await;
        }
        assert_eq!(router.audit_len().await, 2);
    }

    #[tokio::test]
    async fn context_window_filters_out_too_small_models() {
        let mut small = model("small-ctx", 0, 5, 5, true);
        small.context_window = 100;
        let router = Router::new(RouterConfig {
            roster: vec![small],
            ..Default::default()
        });

        let mut request = RoutingRequest::new("hello");
        request.context_size = 10_000;
        let decision = router.route(request).await;
        assert_eq!(decision.chosen_model, "default");
    }
}
