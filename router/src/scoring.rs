//! Additive scoring rules, applied to every eligible candidate.

use thane_core::{hints, Complexity, ModelDescriptor, Priority, RoutingRequest};

/// Router-wide tunables not carried by any single request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouterTunables {
    pub local_first: bool,
}

/// Result of scoring one candidate: its integer score plus the names of the
/// rules that actually fired, for `RoutingDecision::rules_matched`.
pub struct ScoreResult {
    pub score: i32,
    pub matched_rules: Vec<String>,
}

/// All rule names evaluated against every eligible candidate, in evaluation
/// order. Used verbatim for `RoutingDecision::rules_evaluated`.
pub fn rule_names() -> Vec<String> {
    vec![
        "min_complexity",
        "speed_bonus",
        "quality_bonus",
        "cost_penalty",
        "free_model_bonus",
        "context_penalty",
        "context_bonus",
        "tools_penalty",
        "local_first_bonus",
        "interactive_speed_bonus",
        "hint_channel",
        "hint_quality_floor",
        "hint_mission",
        "hint_model_preference",
        "hint_local_only",
        "hint_prefer_speed",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Scores one candidate against one request.
pub fn score(
    model: &ModelDescriptor,
    request: &RoutingRequest,
    complexity: Complexity,
    tunables: RouterTunables,
) -> ScoreResult {
    let mut score = 0i32;
    let mut matched = Vec::new();

    if complexity >= model.min_complexity {
        score += 20;
        matched.push("min_complexity".to_string());
    }

    if complexity == Complexity::Simple && model.speed >= 7 {
        score += 15;
        matched.push("speed_bonus".to_string());
    }

    if complexity == Complexity::Complex && model.quality >= 7 {
        score += i32::from(model.quality) * 2;
        matched.push("quality_bonus".to_string());
    }

    if model.cost_tier > 0 {
        let penalty = match complexity {
            Complexity::Simple => 15 * i32::from(model.cost_tier),
            Complexity::Moderate => 8 * i32::from(model.cost_tier),
            Complexity::Complex => 3 * i32::from(model.cost_tier),
        };
        score -= penalty;
        matched.push("cost_penalty".to_string());
    }

    if model.cost_tier == 0 && complexity < Complexity::Complex {
        score += 15;
        matched.push("free_model_bonus".to_string());
    }

    if model.context_window > 0 {
        let ratio = request.context_size as f64 / model.context_window as f64;
        if ratio > 0.3 && model.quality < 7 {
            score -= 30;
            matched.push("context_penalty".to_string());
        }
        if ratio > 0.5 && model.quality >= 7 {
            score += 10;
            matched.push("context_bonus".to_string());
        }
    }

    if request.tool_count > 4 && model.quality < 7 {
        score -= 20;
        matched.push("tools_penalty".to_string());
    }

    if tunables.local_first && model.cost_tier == 0 {
        score += 10;
        matched.push("local_first_bonus".to_string());
    }

    if request.priority == Priority::Interactive && model.speed >= 7 {
        score += 10;
        matched.push("interactive_speed_bonus".to_string());
    }

    if let Some(channel) = request.hint(hints::CHANNEL) {
        if channel == "homeassistant" || channel == "voice" {
            if model.cost_tier == 0 {
                score += 20;
                matched.push("hint_channel".to_string());
            }
            if model.speed >= 7 {
                score += 10;
                matched.push("hint_channel".to_string());
            }
        }
    }

    if let Some(floor) = request.hint(hints::QUALITY_FLOOR).and_then(|v| v.parse::<u8>().ok()) {
        if model.quality < floor {
            score -= 100;
            matched.push("hint_quality_floor".to_string());
        }
    }

    if let Some(mission) = request.hint(hints::MISSION) {
        if (mission == "background" || mission == "anticipation") && model.cost_tier == 0 {
            score += 20;
            matched.push("hint_mission".to_string());
        }
    }

    if let Some(preferred) = request.hint(hints::MODEL_PREFERENCE) {
        if preferred == model.name {
            score += 25;
            matched.push("hint_model_preference".to_string());
        }
    }

    if request.hint(hints::LOCAL_ONLY) == Some("true") && model.cost_tier > 0 {
        score -= 200;
        matched.push("hint_local_only".to_string());
    }

    if request.hint(hints::PREFER_SPEED) == Some("true") && model.speed >= 7 {
        score += 15;
        matched.push("hint_prefer_speed".to_string());
    }

    ScoreResult {
        score,
        matched_rules: matched,
    }
}
