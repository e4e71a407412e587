use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::Result;
use crate::scheduler::resource::ResourceId;

/// Fully resolved external command: argv, working directory, and the
/// environment overlay applied on top of the inherited environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// `sh -c <script>`; handy for wrappers and tests.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Single-line rendering for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Translates the GPUs a job was granted into the concrete command line and
/// environment for the external program. Must be deterministic in its input.
pub trait CommandBuilder: Send + Sync {
    fn build(&self, resource_ids: &[ResourceId]) -> Result<CommandSpec>;
}

impl<F> CommandBuilder for F
where
    F: Fn(&[ResourceId]) -> Result<CommandSpec> + Send + Sync,
{
    fn build(&self, resource_ids: &[ResourceId]) -> Result<CommandSpec> {
        self(resource_ids)
    }
}

/// `CUDA_VISIBLE_DEVICES` value for a set of GPUs, e.g. `"0,2,3"`.
pub fn visible_devices(resource_ids: &[ResourceId]) -> String {
    resource_ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
