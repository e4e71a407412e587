use serde::{Deserialize, Serialize};

pub const DEFAULT_TEACACHE_THRESHOLD: f64 = 0.25;

/// Speed/quality trade-off passed to the generator as `--perf_mode`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum PerfTier {
    #[default]
    Quality,
    Balanced,
    Speed,
}

/// Optimizations a tier switches on inside the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierFeatures {
    pub tf32: bool,
    pub cudnn_benchmark: bool,
    pub torch_compile: bool,
    pub teacache: bool,
    pub magcache: bool,
}

impl PerfTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerfTier::Quality => "quality",
            PerfTier::Balanced => "balanced",
            PerfTier::Speed => "speed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PerfTier::Quality => "Quality",
            PerfTier::Balanced => "Balanced",
            PerfTier::Speed => "Speed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PerfTier::Quality => "Best quality, ~40% faster (TF32, no offloading)",
            PerfTier::Balanced => "Same quality, ~2x faster (+ torch.compile, first-run warmup)",
            PerfTier::Speed => "Slight quality trade-off, ~3x faster (+ TeaCache step skipping)",
        }
    }

    pub fn features(&self) -> TierFeatures {
        match self {
            PerfTier::Quality => TierFeatures {
                tf32: true,
                cudnn_benchmark: true,
                torch_compile: false,
                teacache: false,
                magcache: false,
            },
            PerfTier::Balanced => TierFeatures {
                tf32: true,
                cudnn_benchmark: true,
                torch_compile: true,
                teacache: false,
                magcache: true,
            },
            PerfTier::Speed => TierFeatures {
                tf32: true,
                cudnn_benchmark: true,
                torch_compile: true,
                teacache: true,
                magcache: true,
            },
        }
    }
}

impl std::fmt::Display for PerfTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_speed_uses_teacache() {
        assert!(!PerfTier::Quality.features().teacache);
        assert!(!PerfTier::Balanced.features().teacache);
        assert!(PerfTier::Speed.features().teacache);
    }

    #[test]
    fn tiers_build_on_each_other() {
        let quality = PerfTier::Quality.features();
        let balanced = PerfTier::Balanced.features();
        assert!(!quality.torch_compile && balanced.torch_compile);
        assert!(quality.tf32 && balanced.tf32);
        assert_eq!(PerfTier::default(), PerfTier::Quality);
    }
}
