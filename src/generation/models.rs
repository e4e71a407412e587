use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// Wan2.2 generation tasks understood by `generate.py --task`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum TaskKind {
    #[serde(rename = "t2v-A14B")]
    #[value(name = "t2v-A14B")]
    T2vA14B,
    #[serde(rename = "i2v-A14B")]
    #[value(name = "i2v-A14B")]
    I2vA14B,
    #[serde(rename = "ti2v-5B")]
    #[value(name = "ti2v-5B")]
    Ti2v5B,
    #[serde(rename = "s2v-14B")]
    #[value(name = "s2v-14B")]
    S2v14B,
    #[serde(rename = "animate-14B")]
    #[value(name = "animate-14B")]
    Animate14B,
}

/// Static per-model defaults and input requirements.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub name: &'static str,
    pub checkpoint_dir: &'static str,
    pub sizes: &'static [&'static str],
    pub default_size: &'static str,
    pub default_steps: u32,
    pub default_shift: f64,
    pub default_guide_scale: f64,
    /// `None` when the frame count follows the audio length.
    pub frame_num: Option<u32>,
    pub sample_fps: u32,
    /// Attention heads; a multi-GPU run's GPU count must divide this.
    pub num_heads: u32,
    pub requires_image: bool,
    pub requires_audio: bool,
    pub requires_preprocessing: bool,
}

const LANDSCAPE_AND_PORTRAIT: &[&str] = &["1280*720", "720*1280", "832*480", "480*832"];
const HD_ONLY: &[&str] = &["1280*720", "720*1280"];
const SPEECH_SIZES: &[&str] = &[
    "1024*704", "704*1024", "1280*720", "720*1280", "832*480", "480*832",
];

static T2V: ModelSpec = ModelSpec {
    name: "Text to Video",
    checkpoint_dir: "Wan2.2-T2V-A14B",
    sizes: LANDSCAPE_AND_PORTRAIT,
    default_size: "1280*720",
    default_steps: 40,
    default_shift: 12.0,
    default_guide_scale: 3.5,
    frame_num: Some(81),
    sample_fps: 16,
    num_heads: 40,
    requires_image: false,
    requires_audio: false,
    requires_preprocessing: false,
};

static I2V: ModelSpec = ModelSpec {
    name: "Image to Video",
    checkpoint_dir: "Wan2.2-I2V-A14B",
    sizes: LANDSCAPE_AND_PORTRAIT,
    default_size: "1280*720",
    default_steps: 40,
    default_shift: 5.0,
    default_guide_scale: 3.5,
    frame_num: Some(81),
    sample_fps: 16,
    num_heads: 40,
    requires_image: true,
    requires_audio: false,
    requires_preprocessing: false,
};

static TI2V: ModelSpec = ModelSpec {
    name: "Text/Image to Video (Fast)",
    checkpoint_dir: "Wan2.2-TI2V-5B",
    sizes: HD_ONLY,
    default_size: "1280*720",
    default_steps: 30,
    default_shift: 8.0,
    default_guide_scale: 3.0,
    frame_num: Some(49),
    sample_fps: 24,
    num_heads: 24,
    requires_image: false,
    requires_audio: false,
    requires_preprocessing: false,
};

static S2V: ModelSpec = ModelSpec {
    name: "Speech to Video",
    checkpoint_dir: "Wan2.2-S2V-14B",
    sizes: SPEECH_SIZES,
    default_size: "1024*704",
    default_steps: 40,
    default_shift: 3.0,
    default_guide_scale: 4.5,
    frame_num: None,
    sample_fps: 16,
    num_heads: 40,
    requires_image: true,
    requires_audio: true,
    requires_preprocessing: false,
};

static ANIMATE: ModelSpec = ModelSpec {
    name: "Animate",
    checkpoint_dir: "Wan2.2-Animate-14B",
    sizes: HD_ONLY,
    default_size: "1280*720",
    default_steps: 20,
    default_shift: 5.0,
    default_guide_scale: 1.0,
    frame_num: Some(77),
    sample_fps: 30,
    num_heads: 40,
    requires_image: true,
    requires_audio: false,
    requires_preprocessing: true,
};

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::T2vA14B,
        TaskKind::I2vA14B,
        TaskKind::Ti2v5B,
        TaskKind::S2v14B,
        TaskKind::Animate14B,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::T2vA14B => "t2v-A14B",
            TaskKind::I2vA14B => "i2v-A14B",
            TaskKind::Ti2v5B => "ti2v-5B",
            TaskKind::S2v14B => "s2v-14B",
            TaskKind::Animate14B => "animate-14B",
        }
    }

    pub fn spec(&self) -> &'static ModelSpec {
        match self {
            TaskKind::T2vA14B => &T2V,
            TaskKind::I2vA14B => &I2V,
            TaskKind::Ti2v5B => &TI2V,
            TaskKind::S2v14B => &S2V,
            TaskKind::Animate14B => &ANIMATE,
        }
    }

    /// GPU counts a distributed run of this model can use.
    pub fn supports_gpu_count(&self, gpus: u32) -> bool {
        gpus == 1 || (gpus > 1 && self.spec().num_heads % gpus == 0)
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|task| task.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| OrchestratorError::UnknownTask(s.to_string()))
    }
}

/// Frame count for a clip of `duration_secs` at `fps`, rounded.
pub fn frame_num_for_duration(duration_secs: f64, fps: u32) -> u32 {
    (duration_secs * fps as f64).round().max(1.0) as u32
}
