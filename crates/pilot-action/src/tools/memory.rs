//! Long-term memory vault tools.

use async_trait::async_trait;
use serde_json::Value;

use pilot_core::types::ToolKind;
use pilot_storage::Store;

use super::{required_str, AgentTool};
use crate::error::ToolError;

const PREVIEW_CHARS: usize = 100;

pub struct MemoryStoreTool {
    store: Store,
}

impl MemoryStoreTool {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AgentTool for MemoryStoreTool {
    fn kind(&self) -> ToolKind {
        ToolKind::MemoryStore
    }

    fn description(&self) -> &'static str {
        "Save information to the long-term memory vault so it persists across runs. \
         Args: memory_key, memory_value."
    }

    async fn invoke(&self, args: &Value) -> Result<String, ToolError> {
        let key = required_str(args, "memory_key")?;
        let value = required_str(args, "memory_value")?;
        if !self.store.save_memory(key, value)? {
            return Ok("Memory not stored: no tenant is signed in.".to_string());
        }
        let preview: String = value.chars().take(PREVIEW_CHARS).collect();
        Ok(format!("Memory successfully stored: '{}' = '{}...'", key, preview))
    }
}

pub struct MemoryRecallTool {
    store: Store,
}

impl MemoryRecallTool {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AgentTool for MemoryRecallTool {
    fn kind(&self) -> ToolKind {
        ToolKind::MemoryRecall
    }

    fn description(&self) -> &'static str {
        "Recall a value from the long-term memory vault by key. \
         Use the key 'ALL' to list every stored memory. Args: memory_key."
    }

    async fn invoke(&self, args: &Value) -> Result<String, ToolError> {
        let key = required_str(args, "memory_key")?;

        if key.eq_ignore_ascii_case("ALL") {
            let entries = self.store.all_memories()?;
            if entries.is_empty() {
                return Ok(
                    "No memories found in your vault. Your long-term memory is empty.".to_string(),
                );
            }
            let mut out = String::from("=== LONG-TERM MEMORY VAULT ===\n");
            for entry in entries {
                out.push_str(&format!(
                    "[{}] = {} (saved: {})\n---\n",
                    entry.key, entry.value, entry.updated_at
                ));
            }
            return Ok(out);
        }

        Ok(match self.store.recall_memory(key)? {
            Some(value) => format!("Memory recalled: '{}' = '{}'", key, value),
            None => format!(
                "No memory found for key '{}'. It may not have been stored yet.",
                key
            ),
        })
    }
}
