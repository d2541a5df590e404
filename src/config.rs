use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Target processor. The 68000 rejects the 68020 extended modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Cpu {
    #[default]
    M68000,
    M68020,
}

impl Cpu {
    pub fn has_extended_modes(self) -> bool {
        self == Cpu::M68020
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    pub cpu: Cpu,
    /// Offset of the first statement when no `org` precedes it.
    pub origin: u32,
    pub max_relax_iterations: usize,
    /// Zero-fill from address 0 up to the first buffer in `bytes()`.
    pub pad_leading_gap: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            cpu: Cpu::M68000,
            origin: 0,
            max_relax_iterations: 1000,
            pad_leading_gap: false,
        }
    }
}

impl AssemblerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let cfg: AssemblerConfig = serde_json::from_str(r#"{ "cpu": "M68020" }"#).unwrap();
        assert_eq!(cfg.cpu, Cpu::M68020);
        assert_eq!(cfg.max_relax_iterations, 1000);
        assert!(!cfg.pad_leading_gap);
    }
}
