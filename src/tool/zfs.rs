//! Invocations of the zfs CLI.

use super::Invocation;

/// Builds zfs snapshot command lines.
#[derive(Debug, Clone)]
pub struct Zfs {
    bin: String,
}

impl Default for Zfs {
    fn default() -> Self {
        Self {
            bin: "zfs".to_string(),
        }
    }
}

impl Zfs {
    /// `zfs snapshot <dataset@name>`
    pub fn create_snapshot(&self, snapshot: &str) -> Invocation {
        Invocation::new(self.bin.clone(), ["snapshot", snapshot])
    }

    /// `zfs destroy <dataset@name>`
    pub fn destroy_snapshot(&self, snapshot: &str) -> Invocation {
        Invocation::new(self.bin.clone(), ["destroy", snapshot])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_commands() {
        let zfs = Zfs::default();
        assert_eq!(
            zfs.create_snapshot("tank/media@kopia").to_string(),
            "zfs snapshot tank/media@kopia"
        );
        assert_eq!(
            zfs.destroy_snapshot("tank/media@kopia").to_string(),
            "zfs destroy tank/media@kopia"
        );
    }
}
