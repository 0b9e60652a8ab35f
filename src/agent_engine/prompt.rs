use serde_json::Value;

use crate::errors::{PilotError, PilotResult};

const ACTION_SCHEMA: &str = include_str!("../../prompts/schema.json");

/// The action schema, with `thought` marked required when asked.
pub fn action_schema(require_thought: bool) -> PilotResult<Value> {
    let mut schema: Value = serde_json::from_str(ACTION_SCHEMA)
        .map_err(|e| PilotError::Config(format!("embedded action schema is invalid: {e}")))?;
    if require_thought {
        if let Some(obj) = schema.as_object_mut() {
            obj.insert("required".into(), serde_json::json!(["thought"]));
        }
    }
    Ok(schema)
}

pub fn build_system_prompt(require_thought: bool) -> PilotResult<String> {
    let schema = serde_json::to_string(&action_schema(require_thought)?)?;
    Ok(format!(
        "# Role\n\
You are an agent that operates Android touch-screen GUIs. Given the user's question, \
analyze the GUI elements and layout of the current screen and produce the next action.\n\
\n\
# Task\n\
For the user's question and the current screenshot, output the next action. \
Break complex tasks into steps and execute them one at a time.\n\
\n\
# Rule\n\
- Output compact JSON\n\
- The action must follow the Schema\n\
- After each step, wait for the interface to update\n\
- When the task is done, add \"task_completed\": true to the output\n\
- When the task is not done, continue with the next step\n\
\n\
# Schema\n\
{schema}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_requires_thought_only_when_asked() {
        assert_eq!(action_schema(true).unwrap()["required"], serde_json::json!(["thought"]));
        assert!(action_schema(false).unwrap().get("required").is_none());
    }

    #[test]
    fn locations_are_bounded_to_normalized_range() {
        let schema = action_schema(false).unwrap();
        let items = &schema["$defs"]["Location"]["items"];
        assert_eq!(items["minimum"], 0);
        assert_eq!(items["maximum"], 999);
    }

    #[test]
    fn prompt_embeds_compact_schema_and_rules() {
        let prompt = build_system_prompt(true).unwrap();
        assert!(prompt.contains("\"task_completed\": true"));
        assert!(prompt.contains("\"required\":[\"thought\"]"));
        let schema_line = prompt.lines().last().unwrap();
        assert!(serde_json::from_str::<Value>(schema_line).is_ok());
    }
}
