//! Invocations of the kopia CLI.

use std::path::PathBuf;

use super::Invocation;

/// Builds kopia command lines.
#[derive(Debug, Clone)]
pub struct Kopia {
    bin: String,
    config_file: Option<PathBuf>,
}

impl Default for Kopia {
    fn default() -> Self {
        Self::new("kopia")
    }
}

impl Kopia {
    pub fn new(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            config_file: None,
        }
    }

    /// Pass `--config-file` to every invocation.
    pub fn with_config_file(mut self, config_file: Option<PathBuf>) -> Self {
        self.config_file = config_file;
        self
    }

    /// `kopia snapshot list -n 1 --json`: the newest run of every source, as a
    /// JSON array.
    pub fn list_latest(&self) -> Invocation {
        self.invocation(["snapshot", "list", "-n", "1", "--json"], [])
    }

    /// `kopia snapshot create --json [--override-source <source>] <path>`: one
    /// new run, as a JSON object.
    pub fn create(&self, path: &str, override_source: Option<&str>) -> Invocation {
        let mut extra = Vec::new();
        if let Some(source) = override_source {
            extra.push("--override-source".to_string());
            extra.push(source.to_string());
        }
        extra.push(path.to_string());

        self.invocation(["snapshot", "create", "--json"], extra)
    }

    fn invocation<const N: usize>(
        &self,
        command: [&str; N],
        extra: impl IntoIterator<Item = String>,
    ) -> Invocation {
        let mut args: Vec<String> = command.iter().map(|s| s.to_string()).collect();
        if let Some(config_file) = &self.config_file {
            args.push("--config-file".to_string());
            args.push(config_file.to_string_lossy().into_owned());
        }
        args.extend(extra);

        Invocation::new(self.bin.clone(), args)
    }
}
