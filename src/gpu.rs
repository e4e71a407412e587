use serde::Serialize;
use tokio::process::Command;

use crate::error::{OrchestratorError, Result};

const NVIDIA_SMI: &str = "nvidia-smi";

/// One row of `nvidia-smi --query-gpu`, memory in MiB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GpuInfo {
    pub index: u32,
    pub name: String,
    pub memory_total_mib: u64,
    pub memory_used_mib: u64,
    pub memory_free_mib: u64,
}

impl GpuInfo {
    pub fn utilization_percent(&self) -> f64 {
        if self.memory_total_mib == 0 {
            return 0.0;
        }
        self.memory_used_mib as f64 * 100.0 / self.memory_total_mib as f64
    }
}

/// Number of GPUs in the pool. Falls back to 1 when `nvidia-smi` is missing
/// or reports nothing, so the orchestrator still runs on a dev box.
pub async fn discover_gpu_count() -> u32 {
    match query_gpu_info().await {
        Ok(gpus) if !gpus.is_empty() => gpus.len() as u32,
        Ok(_) => {
            tracing::warn!("nvidia-smi reported no GPUs, assuming 1");
            1
        }
        Err(e) => {
            tracing::warn!(error = %e, "GPU discovery failed, assuming 1");
            1
        }
    }
}

/// Query name and memory of every visible GPU.
pub async fn query_gpu_info() -> Result<Vec<GpuInfo>> {
    let output = Command::new(NVIDIA_SMI)
        .args([
            "--query-gpu=index,name,memory.total,memory.used,memory.free",
            "--format=csv,noheader,nounits",
        ])
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| OrchestratorError::Discovery(format!("{}: {}", NVIDIA_SMI, e)))?;

    if !output.status.success() {
        return Err(OrchestratorError::Discovery(format!(
            "{} exited with {}: {}",
            NVIDIA_SMI,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(parse_gpu_csv(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `index, name, total, used, free` rows. Trailing extra columns are
/// ignored; malformed rows are skipped.
pub fn parse_gpu_csv(csv: &str) -> Vec<GpuInfo> {
    csv.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let Some([index, name, total, used, free]) = fields.get(..5) else {
                if !line.trim().is_empty() {
                    tracing::debug!(line, "Skipping malformed nvidia-smi row");
                }
                return None;
            };
            Some(GpuInfo {
                index: index.parse().ok()?,
                name: name.to_string(),
                memory_total_mib: total.parse().ok()?,
                memory_used_mib: used.parse().ok()?,
                memory_free_mib: free.parse().ok()?,
            })
        })
        .collect()
}
