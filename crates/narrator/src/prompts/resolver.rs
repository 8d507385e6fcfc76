use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;

use crate::config::schema::PromptsConfig;

/// `{{` and `}}` are literal braces; `{Name}` is a field reference.
static RE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("No prompt template for event '{0}'")]
    TemplateNotFound(String),

    #[error("Template for '{event}' references missing field '{field}'")]
    MissingField { event: String, field: String },
}

/// Renders the user prompt for a recorded event.
#[derive(Debug, Clone)]
pub struct PromptResolver {
    system_prompt: String,
    templates: HashMap<String, String>,
}

impl PromptResolver {
    pub fn new(system_prompt: impl Into<String>, templates: HashMap<String, String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            templates,
        }
    }

    pub fn from_config(config: &PromptsConfig) -> Self {
        let templates = config
            .event_prompts
            .iter()
            .map(|(name, prompt)| (name.clone(), prompt.template.clone()))
            .collect();
        Self::new(config.system_prompt.clone(), templates)
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Substitutes `event_data` fields into the template registered for
    /// `event_name`. Non-object data is treated as having no fields.
    pub fn resolve(
        &self,
        event_name: &str,
        event_data: &serde_json::Value,
    ) -> Result<String, PromptError> {
        let template = self
            .templates
            .get(event_name)
            .ok_or_else(|| PromptError::TemplateNotFound(event_name.to_string()))?;

        let empty = serde_json::Map::new();
        let fields = event_data.as_object().unwrap_or(&empty);

        let mut missing: Option<String> = None;
        let rendered = RE_PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
            match caps.get(1) {
                None if &caps[0] == "{{" => "{".to_string(),
                None => "}".to_string(),
                Some(name) => match fields.get(name.as_str()) {
                    Some(value) => render_value(value),
                    None => {
                        missing.get_or_insert_with(|| name.as_str().to_string());
                        String::new()
                    }
                },
            }
        });

        match missing {
            Some(field) => Err(PromptError::MissingField {
                event: event_name.to_string(),
                field,
            }),
            None => Ok(rendered.into_owned()),
        }
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver() -> PromptResolver {
        let mut templates = HashMap::new();
        templates.insert(
            "ChampionKill".to_string(),
            "{KillerName} just took down {VictimName}!".to_string(),
        );
        templates.insert(
            "Multikill".to_string(),
            "{KillerName} got a {KillStreak}x streak {{wow}}".to_string(),
        );
        templates.insert("GameStart".to_string(), "The game begins.".to_string());
        PromptResolver::new("You are a caster.", templates)
    }

    #[test]
    fn test_resolve_substitutes_fields() {
        let prompt = resolver()
            .resolve(
                "ChampionKill",
                &json!({"KillerName": "Jhin", "VictimName": "Yasuo", "Extra": 1}),
            )
            .unwrap();
        assert_eq!(prompt, "Jhin just took down Yasuo!");
    }

    #[test]
    fn test_non_string_values_and_escaped_braces() {
        let prompt = resolver()
            .resolve("Multikill", &json!({"KillerName": "Ahri", "KillStreak": 3}))
            .unwrap();
        assert_eq!(prompt, "Ahri got a 3x streak {wow}");
    }

    #[test]
    fn test_template_without_fields_ignores_data() {
        let prompt = resolver().resolve("GameStart", &serde_json::Value::Null).unwrap();
        assert_eq!(prompt, "The game begins.");
    }

    #[test]
    fn test_unknown_event_is_template_not_found() {
        let err = resolver().resolve("DragonKill", &json!({})).unwrap_err();
        assert_eq!(err, PromptError::TemplateNotFound("DragonKill".to_string()));
    }

    #[test]
    fn test_missing_field_names_first_absent_field() {
        let err = resolver()
            .resolve("ChampionKill", &json!({"VictimName": "Yasuo"}))
            .unwrap_err();
        assert_eq!(
            err,
            PromptError::MissingField {
                event: "ChampionKill".to_string(),
                field: "KillerName".to_string(),
            }
        );
    }

    #[test]
    fn test_system_prompt() {
        assert_eq!(resolver().system_prompt(), "You are a caster.");
    }
}
