//! Instruction compiler.
//!
//! The instruction template is compiled once at startup. Rendering is a single
//! pass over named slots, so persona or user text that happens to contain slot
//! syntax is emitted verbatim and never expanded.

use anyhow::{Context, Result};
use minijinja::{context, AutoEscape, Environment, UndefinedBehavior};

use homh_core::{ChatTurn, HomhError, PersonaDescriptor};

const TEMPLATE_NAME: &str = "instruction";

/// Companion instruction sent as the sole provider payload.
pub const INSTRUCTION_TEMPLATE: &str = r#"
You are {{ persona.name }}, a compassionate AI mental health support companion. Your primary role is to provide a safe, empathetic, and personalized first line of emotional support to users who may be struggling with various mental health challenges.

## CORE IDENTITY AND MISSION
You are NOT a therapist, doctor, or medical professional. You are a supportive, non-judgmental companion whose purpose is to:

- Listen actively and validate feelings
- Offer gentle encouragement and hope
- Provide simple self-help tools and coping strategies
- Create a safe space for emotional expression
- Guide users toward professional help when appropriate

## CRITICAL SAFETY PROTOCOLS (NON-NEGOTIABLE)
- **CRISIS INTERVENTION:** If a user mentions self-harm, suicide, or severe crisis:
  - Immediately provide crisis hotline numbers (In India, you can suggest KIRAN at 1800-599-0019 or other local services).
  - Gently but firmly encourage seeking immediate professional help.
  - Express care and concern for their safety.
  - Do NOT attempt to counsel through a crisis yourself.
- **NO MEDICAL ADVICE:** Never provide medical diagnoses, assessments, treatment recommendations, medication advice, or professional therapeutic interventions.

## YOUR PERSONA
- **Name:** {{ persona.name }}
- **Background:** {{ persona.description }}
- **Communication Style:** {{ persona.tone }}

You must strictly maintain this persona throughout the conversation. Never break character.

## CONVERSATION HISTORY
{{ chat_history }}

## CURRENT USER MESSAGE
The user has just said: "{{ user.message }}"

## YOUR TASK
Respond as {{ persona.name }} in your characteristic {{ persona.tone }} style. Provide an empathetic response that acknowledges their current message with validation, stays true to your persona, and maintains conversation continuity. Prioritize emotional safety above all else.

**Formatting:** Use Markdown for emphasis. Use `*bold*` for key ideas and `**italics**` for gentle emphasis or character quirks.
"#;

/// Renders the instruction for one exchange.
#[derive(Debug)]
pub struct PromptCompiler {
    env: Environment<'static>,
}

impl PromptCompiler {
    /// Compile the built-in template.
    ///
    /// Fails only if the template itself is broken, which is a startup error.
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.add_template(TEMPLATE_NAME, INSTRUCTION_TEMPLATE)
            .context("Failed to compile instruction template")?;

        let compiler = Self { env };
        // Catch slot typos at startup rather than on the first request.
        compiler
            .compile(
                &PersonaDescriptor {
                    name: "check".into(),
                    description: "check".into(),
                    tone: "check".into(),
                },
                &[],
                "check",
            )
            .context("Instruction template failed its startup render")?;
        Ok(compiler)
    }

    /// Render the instruction from a resolved persona, prior turns, and the current message.
    pub fn compile(
        &self,
        persona: &PersonaDescriptor,
        history: &[Option<ChatTurn>],
        message: &str,
    ) -> Result<String> {
        let template = self
            .env
            .get_template(TEMPLATE_NAME)
            .map_err(|e| HomhError::Template(e.to_string()))?;
        let rendered = template
            .render(context! {
                persona => persona,
                chat_history => serialize_history(history),
                user => context! { message => message },
            })
            .map_err(|e| HomhError::Template(e.to_string()))?;
        Ok(rendered)
    }
}

/// One `"<role>: <first part>"` line per usable turn, oldest first.
///
/// Turns that are null, lack a role, or have no parts are skipped. An empty
/// first part still produces a line.
pub fn serialize_history(history: &[Option<ChatTurn>]) -> String {
    history
        .iter()
        .flatten()
        .filter(|turn| !turn.role.is_empty())
        .filter_map(|turn| turn.first_part().map(|text| format!("{}: {}", turn.role, text)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaRegistry;
    use homh_core::PersonaInput;

    fn turn(role: &str, parts: &[&str]) -> Option<ChatTurn> {
        Some(ChatTurn {
            role: role.to_string(),
            parts: parts.iter().map(|p| p.to_string()).collect(),
        })
    }

    #[test]
    fn test_history_skips_empty_parts_and_keeps_order() {
        let history = vec![turn("user", &["hi"]), turn("bot", &[]), turn("user", &["there"])];
        assert_eq!(serialize_history(&history), "user: hi\nuser: there");
    }

    #[test]
    fn test_history_skips_null_and_roleless_turns() {
        let history = vec![
            None,
            turn("", &["orphan"]),
            turn("model", &[]),
            turn("model", &["ok", "extra"]),
        ];
        assert_eq!(serialize_history(&history), "model: ok");
        assert_eq!(serialize_history(&[]), "");
    }

    #[test]
    fn test_empty_first_part_still_emits_a_line() {
        let history = vec![
            turn("user", &["hi"]),
            turn("model", &["", "second part ignored"]),
            turn("user", &[""]),
        ];
        assert_eq!(serialize_history(&history), "user: hi\nmodel: \nuser: ");
    }

    #[test]
    fn test_sukun_instruction_has_all_slots_filled() {
        let registry = PersonaRegistry::builtin();
        let persona = registry.resolve(&PersonaInput::builtin("sukun"));
        let compiler = PromptCompiler::new().unwrap();
        let instruction = compiler.compile(&persona, &[], "I feel anxious").unwrap();

        assert!(instruction.contains("You are Sukun,"));
        assert!(instruction.contains(&registry.get("sukun").unwrap().description));
        assert!(instruction.contains("The user has just said: \"I feel anxious\""));
        assert!(instruction.contains("characteristic Soothing, wise, and centered style"));
        assert!(!instruction.contains("{{"));
        assert!(!instruction.contains("}}"));
    }

    #[test]
    fn test_history_lands_in_history_section() {
        let persona = PersonaRegistry::builtin().resolve(&PersonaInput::builtin("mochi"));
        let history = vec![turn("user", &["hi"]), turn("model", &["hello!"])];
        let instruction = PromptCompiler::new()
            .unwrap()
            .compile(&persona, &history, "how are you")
            .unwrap();
        assert!(instruction.contains("## CONVERSATION HISTORY\nuser: hi\nmodel: hello!\n"));
    }

    #[test]
    fn test_slot_syntax_in_values_is_not_expanded() {
        let persona = PersonaDescriptor {
            name: "Echo {{ user.message }}".to_string(),
            description: "{{persona.tone}}".to_string(),
            tone: "calm".to_string(),
        };
        let instruction = PromptCompiler::new()
            .unwrap()
            .compile(&persona, &[], "{{persona.name}} <b>&</b>")
            .unwrap();
        assert!(instruction.contains("You are Echo {{ user.message }},"));
        assert!(instruction.contains("**Background:** {{persona.tone}}"));
        assert!(instruction.contains("\"{{persona.name}} <b>&</b>\""));
    }

    #[test]
    fn test_compilation_is_idempotent() {
        let persona = PersonaRegistry::builtin().resolve(&PersonaInput::builtin("diya"));
        let history = vec![turn("user", &["small win today"])];
        let compiler = PromptCompiler::new().unwrap();
        let first = compiler.compile(&persona, &history, "I finished my walk").unwrap();
        let second = compiler.compile(&persona, &history, "I finished my walk").unwrap();
        assert_eq!(first, second);
    }
}
