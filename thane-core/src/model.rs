//! Model descriptor and complexity classification.

use serde::{Deserialize, Serialize};

/// Minimum request complexity a model is willing to accept.
///
/// Ordered: `Simple < Moderate < Complex`. The Router's "complexity
/// eligibility" rule (`+20` when `complexity >= min_complexity`)
/// relies on this ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// Immutable model descriptor, loaded once from configuration.
///
/// **Interaction**: the Router's roster is a `Vec<ModelDescriptor>`;
/// nothing mutates a descriptor after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub provider: String,
    pub supports_tools: bool,
    pub context_window: u32,
    /// 1..=10
    pub speed: u8,
    /// 1..=10
    pub quality: u8,
    /// 0..=3
    pub cost_tier: u8,
    pub min_complexity: Complexity,
}

impl ModelDescriptor {
    /// Highest configured quality, or 10 when `models` is empty.
    pub fn max_quality(models: &[ModelDescriptor]) -> u8 {
        models.iter().map(|m| m.quality).max().unwrap_or(10)
    }
}
