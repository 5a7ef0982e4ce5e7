// SPDX-License-Identifier: MIT

//! The provider seam (§9): "dynamic polymorphism over LLM providers ... a
//! small provider interface with the methods `{build_command,
//! credentials}`". The core never spawns a provider's process — it only
//! knows how to describe what should be run, which the (out-of-scope)
//! agent worker consumes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The configured identity of a provider. Selection is by configuration,
/// never reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    ClaudeCode,
    Codex,
    Bonsai,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderKind::ClaudeCode => "claude-code",
            ProviderKind::Codex => "codex",
            ProviderKind::Bonsai => "bonsai",
        };
        write!(f, "{s}")
    }
}

/// Opaque, provider-specific credentials. The core never inspects the
/// contents — it passes them through to the agent worker at spawn time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCredentials(pub HashMap<String, String>);

/// A command description the agent worker can execute, with no opinion on
/// how it is invoked (subprocess, container, remote shell — all out of
/// scope per §1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

/// The provider interface from §9: `{build_command, credentials}`.
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;
    fn build_command(&self, task_prompt: &str) -> ProviderCommand;
    fn credentials(&self) -> &ProviderCredentials;
}

/// A provider config consumed as `{provider, credentials}` per §1.
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub credentials: ProviderCredentials,
}

impl Provider for ProviderConfig {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn build_command(&self, task_prompt: &str) -> ProviderCommand {
        let program = match self.kind {
            ProviderKind::ClaudeCode => "claude",
            ProviderKind::Codex => "codex",
            ProviderKind::Bonsai => "bonsai",
        };
        ProviderCommand {
            program: program.to_string(),
            args: vec!["--prompt".to_string(), task_prompt.to_string()],
            env: self.credentials.0.clone(),
        }
    }

    fn credentials(&self) -> &ProviderCredentials {
        &self.credentials
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_command_selects_program_by_kind() {
        let cfg = ProviderConfig {
            kind: ProviderKind::Codex,
            credentials: ProviderCredentials(HashMap::new()),
        };
        let cmd = cfg.build_command("fix the bug");
        assert_eq!(cmd.program, "codex");
        assert_eq!(cmd.args, vec!["--prompt".to_string(), "fix the bug".to_string()]);
    }
}
