use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Chart sizing for the rendering layer.
///
/// The viewport height is supplied explicitly at call time; the pipeline
/// keeps no ambient session state. Height fractions match the dashboard's
/// column layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChartLayout {
    container_height: u32,
}

impl ChartLayout {
    pub const DEFAULT_CONTAINER_HEIGHT: u32 = 800;

    pub fn new(viewport_height: Option<u32>) -> Self {
        Self {
            container_height: viewport_height.unwrap_or(Self::DEFAULT_CONTAINER_HEIGHT),
        }
    }

    pub fn container_height(&self) -> u32 {
        self.container_height
    }

    pub fn transactions_chart_height(&self) -> u32 {
        self.scaled(0.38)
    }

    pub fn balance_chart_height(&self) -> u32 {
        self.scaled(0.45)
    }

    pub fn debt_chart_height(&self) -> u32 {
        self.scaled(0.45)
    }

    pub fn investment_chart_height(&self) -> u32 {
        self.scaled(0.40)
    }

    pub fn budget_chart_height(&self) -> u32 {
        self.scaled(0.48)
    }

    fn scaled(&self, fraction: f64) -> u32 {
        (self.container_height as f64 * fraction).round() as u32
    }
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self::new(None)
    }
}
