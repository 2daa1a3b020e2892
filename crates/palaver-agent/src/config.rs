use crate::errors::AgentError;
use crate::window::WindowPolicy;

pub const DEFAULT_RECURSION_LIMIT: usize = 1500;

/// Runtime configuration for an agent engine. Validated at construction
/// rather than at first use; provider credentials and connection strings stay
/// with the host.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentConfig {
    pub agent_type: String,
    pub model_name: String,
    pub user_id: Option<String>,
    pub system_prompt: Option<String>,
    /// Caller-supplied instruction that replaces the system prompt for this
    /// engine. Also switches the default window policy to `HeadTail`.
    pub custom_prompt: Option<String>,
    pub recursion_limit: usize,
    pub window_policy: Option<WindowPolicy>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_type: "assistant".to_string(),
            model_name: String::new(),
            user_id: None,
            system_prompt: None,
            custom_prompt: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            window_policy: None,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.model_name.trim().is_empty() {
            return Err(AgentError::InvalidConfiguration(
                "model_name must not be empty".to_string(),
            ));
        }
        if self.recursion_limit == 0 {
            return Err(AgentError::InvalidConfiguration(
                "recursion_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn effective_window_policy(&self) -> WindowPolicy {
        if let Some(policy) = self.window_policy {
            return policy;
        }
        if self.custom_prompt.is_some() {
            WindowPolicy::HeadTail
        } else {
            WindowPolicy::RecentExchange
        }
    }

    pub fn effective_system_prompt(&self) -> Option<&str> {
        self.custom_prompt
            .as_deref()
            .or(self.system_prompt.as_deref())
    }
}
