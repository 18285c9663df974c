//! One-time external-tool presence probing, shared by the PDF and DOCX
//! extractors (spec.md §4.1: "probed once per process; absence is logged
//! once, with an installation hint").

use std::process::Command;
use std::sync::OnceLock;

pub struct ToolProbe {
    binary: &'static str,
    version_flag: &'static str,
    install_hint: &'static str,
    available: OnceLock<bool>,
}

impl ToolProbe {
    pub const fn new(binary: &'static str, version_flag: &'static str, install_hint: &'static str) -> Self {
        Self {
            binary,
            version_flag,
            install_hint,
            available: OnceLock::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            let found = Command::new(self.binary)
                .arg(self.version_flag)
                .output()
                .map(|o| o.status.success() || !o.stdout.is_empty() || !o.stderr.is_empty())
                .unwrap_or(false);
            if !found {
                tracing::warn!(
                    tool = self.binary,
                    hint = self.install_hint,
                    "external tool not found, falling back to built-in extractor"
                );
            }
            found
        })
    }
}
