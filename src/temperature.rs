//! Per-stage temperature derivation.
//!
//! Maps a preset or explicit base temperature to stage temperatures: the
//! idea-generation stage runs hotter, critic stages run cooler, and every
//! result is clamped to [0, 1].

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Named creativity presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperaturePreset {
    Conservative,
    Balanced,
    Creative,
    Wild,
}

impl TemperaturePreset {
    pub fn base_temperature(&self) -> f64 {
        match self {
            Self::Conservative => 0.3,
            Self::Balanced => 0.5,
            Self::Creative => 0.7,
            Self::Wild => 0.9,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Creative => "creative",
            Self::Wild => "wild",
        }
    }
}

impl FromStr for TemperaturePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conservative" => Ok(Self::Conservative),
            "balanced" => Ok(Self::Balanced),
            "creative" => Ok(Self::Creative),
            "wild" => Ok(Self::Wild),
            other => Err(format!("unknown temperature preset: {other}")),
        }
    }
}

/// The pipeline stages that consume a temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    IdeaGeneration,
    Evaluation,
    Advocacy,
    Skepticism,
    Improvement,
    ReEvaluation,
}

/// Derives per-stage temperatures from one base value.
#[derive(Debug, Clone, Copy)]
pub struct TemperatureManager {
    base: f64,
}

impl TemperatureManager {
    pub fn from_base(base: f64) -> Self {
        Self {
            base: base.clamp(0.0, 1.0),
        }
    }

    pub fn from_preset(preset: TemperaturePreset) -> Self {
        Self::from_base(preset.base_temperature())
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    /// Stage temperature: generation is scaled ×1.3 (capped at 0.95),
    /// critic stages ×0.5 (floored at 0.1), everything clamped to [0, 1].
    pub fn for_stage(&self, stage: WorkflowStage) -> f64 {
        let value = match stage {
            WorkflowStage::IdeaGeneration => (self.base * 1.3).min(0.95),
            WorkflowStage::Evaluation | WorkflowStage::ReEvaluation => (self.base * 0.5).max(0.1),
            WorkflowStage::Advocacy | WorkflowStage::Skepticism | WorkflowStage::Improvement => {
                self.base
            }
        };
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(TemperaturePreset::Conservative.base_temperature(), 0.3);
        assert_eq!(TemperaturePreset::Balanced.base_temperature(), 0.5);
        assert_eq!(TemperaturePreset::Creative.base_temperature(), 0.7);
        assert_eq!(TemperaturePreset::Wild.base_temperature(), 0.9);
    }

    #[test]
    fn test_generation_runs_hotter_with_cap() {
        let manager = TemperatureManager::from_preset(TemperaturePreset::Balanced);
        assert!((manager.for_stage(WorkflowStage::IdeaGeneration) - 0.65).abs() < 1e-9);

        let hot = TemperatureManager::from_preset(TemperaturePreset::Wild);
        assert_eq!(hot.for_stage(WorkflowStage::IdeaGeneration), 0.95);
    }

    #[test]
    fn test_critic_runs_cooler_with_floor() {
        let manager = TemperatureManager::from_preset(TemperaturePreset::Creative);
        assert!((manager.for_stage(WorkflowStage::Evaluation) - 0.35).abs() < 1e-9);

        let cold = TemperatureManager::from_base(0.1);
        assert_eq!(cold.for_stage(WorkflowStage::Evaluation), 0.1);
        assert_eq!(cold.for_stage(WorkflowStage::ReEvaluation), 0.1);
    }

    #[test]
    fn test_base_clamped() {
        assert_eq!(TemperatureManager::from_base(1.7).base(), 1.0);
        assert_eq!(TemperatureManager::from_base(-0.2).base(), 0.0);
    }

    #[test]
    fn test_preset_parsing() {
        assert_eq!(
            TemperaturePreset::from_str("WILD").unwrap(),
            TemperaturePreset::Wild
        );
        assert!(TemperaturePreset::from_str("volcanic").is_err());
    }
}
