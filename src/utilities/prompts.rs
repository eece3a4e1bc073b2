//! Built-in prompt and instruction templates.
//!
//! The team-composition prompt is handed verbatim to the structured
//! generation collaborator, which owns its rendering. Instructions this crate
//! writes for agents it creates itself (coordinator, synthesized
//! sub-agents) are rendered locally with `tera`.

use once_cell::sync::Lazy;
use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

use crate::capabilities::{OutputSchema, ParameterSchema};

/// Variable name the composition prompt expects the assignment under.
pub const ASSIGNMENT_VARIABLE: &str = "assignment";

/// Prompt asking the generator for a 2-5 person expert team as JSON.
pub const TEAM_COMPOSITION_PROMPT: &str = r#"You are a seasoned project manager with a lot of experience putting together and managing cross-functional project teams.
You have a broad understanding of different topics and technologies, and quickly understand what kind of skills are needed to complete a project.
You break down assignments from the stakeholder into different domains and assign them to team members. The final result will only be textual or actions, so no team member should focus on visual or graphical aspects.
Put together a team of between 2 and 5 experts able to carry out the assignment.
For each team member give: name, role, instructions and description. The instructions are a prompt the team member will use to complete the assignment. The description is a single line describing what this role delivers. Do not include a project manager, you are the project manager.
Output a JSON array, for example:

[
    {
        "name": "John",
        "role": "Copywriter",
        "instructions": "You are a copywriter with ten years of experience, known for brevity and a dry humor. Stay focused on the goal and refine the single best copy.",
        "description": "John is a strong-headed but fair copywriter with a background in commercial communications."
    },
    {
        "name": "Jane",
        "role": "Art Director",
        "instructions": "You are an art director who judges whether copy is acceptable to print. If it is not, explain how to refine it without giving an example. If it is acceptable, say: PRINT IT.",
        "description": "Jane reviews copy with a sensibility shaped by classic print advertising."
    }
]

This is the assignment the team needs to fulfill:
{{assignment}}
"#;

/// Suffix appended to every member's instructions, followed by their name.
pub const MEMBER_BOUNDARY_SUFFIX: &str = r#"
Only speak from the perspective of your role. You do not need to explain your role and responsibilities, the project manager has already done that.
Drive towards a result. Don't assume any duties of the other team members, just focus on your own role. For example:
If you are the technical writer and someone else is the translator, you only write in English and leave the translation to the translator.
If you are the technical expert and someone else is the child psychologist, you only focus on technical accuracy and leave it to the child psychologist to make it appealing to children.
Do not speak on behalf of other members.
Do not try to finalize the result on your own, you rely on your team for that.
Listen especially to any instructions addressed to you by the project manager.
If you need more information regarding the assignment, ask the project manager.
If you execute any code, you must include the code in your message.
Other members will address you by your name, and you are the only one with this name: "#;

const COORDINATOR_TEMPLATE: &str = r#"You are an experienced project manager who only cares about finding a result that satisfies all requirements.
You listen to each team member's input and collect all information.

This is the assignment from the stakeholders: '{{ assignment }}'

If the assignment contains a link, retrieve the text behind it and repeat everything relevant verbatim in your message to the team, including any examples.
At the start, address each team member individually and explain how they can contribute to finishing the assignment.
Do not contribute your own input, you rely on your team for that.

In subsequent rounds, ask one team member at a time for their input. Describe the type of input you want and end your message with:
"{{ next_speaker_marker }}<speaker name>"
Drive your team towards a clear result, be crisp and specific in what you ask of them.
When the result has been achieved write: {{ completion_marker }}, followed by the verbatim, unedited final result.
These are the members of your team:
{% for member in members %}{{ member.name }} - {{ member.description }}
{% endfor %}"#;

const SYNTHESIZED_CAPABILITY_TEMPLATE: &str = r#"You implement the capability "{{ name }}".
{{ description }}
{% if inputs %}
Inputs:
{% for input in inputs %}- {{ input.name }} ({{ input.kind }}): {{ input.description }}
{% endfor %}{% endif %}{% if output %}
Return a {{ output.kind }}: {{ output.description }}
{% endif %}
Answer with the result only, without commentary."#;

static TEMPLATES: Lazy<Tera> = Lazy::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("coordinator.txt", COORDINATOR_TEMPLATE),
        ("synthesized_capability.txt", SYNTHESIZED_CAPABILITY_TEMPLATE),
    ])
    .expect("built-in prompt templates must parse");
    tera
});

/// Failure to render a built-in template.
#[derive(Debug, Error)]
#[error("failed to render prompt '{template}': {source}")]
pub struct PromptError {
    pub template: &'static str,
    #[source]
    pub source: tera::Error,
}

/// A team member as listed in the coordinator's roster.
#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub name: String,
    pub description: String,
}

/// Render the coordinator's instructions for an assignment and roster.
pub fn coordinator_instructions(
    assignment: &str,
    members: &[RosterEntry],
    next_speaker_marker: &str,
    completion_marker: &str,
) -> Result<String, PromptError> {
    let mut context = Context::new();
    context.insert("assignment", assignment.trim());
    context.insert("members", members);
    context.insert("next_speaker_marker", next_speaker_marker);
    context.insert("completion_marker", completion_marker);
    render("coordinator.txt", &context)
}

// Schema fields as the capability template reads them. The schema types
// serialize `kind` as `type`, which is their wire name.
#[derive(Serialize)]
struct SchemaLine<'a> {
    name: &'a str,
    kind: &'a str,
    description: &'a str,
}

/// Render the instructions for a sub-agent backing a synthesized capability.
pub fn synthesized_capability_instructions(
    name: &str,
    description: &str,
    inputs: &[ParameterSchema],
    output: Option<&OutputSchema>,
) -> Result<String, PromptError> {
    let inputs: Vec<SchemaLine<'_>> = inputs
        .iter()
        .map(|p| SchemaLine {
            name: &p.name,
            kind: &p.kind,
            description: &p.description,
        })
        .collect();
    let output = output.map(|o| SchemaLine {
        name: "",
        kind: &o.kind,
        description: &o.description,
    });

    let mut context = Context::new();
    context.insert("name", name);
    context.insert("description", description);
    context.insert("inputs", &inputs);
    context.insert("output", &output);
    render("synthesized_capability.txt", &context)
}

fn render(template: &'static str, context: &Context) -> Result<String, PromptError> {
    TEMPLATES
        .render(template, context)
        .map_err(|source| PromptError { template, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinator_lists_roster_and_markers() {
        let members = vec![
            RosterEntry {
                name: "Ann - Analyst".into(),
                description: "Crunches numbers".into(),
            },
            RosterEntry {
                name: "Bob - Writer".into(),
                description: "Writes the report".into(),
            },
        ];
        let text =
            coordinator_instructions("  Solve it  ", &members, "NEXT SPEAKER:", "FINAL ANSWER")
                .unwrap();
        assert!(text.contains("'Solve it'"));
        assert!(text.contains("Ann - Analyst - Crunches numbers"));
        assert!(text.contains("Bob - Writer - Writes the report"));
        assert!(text.contains("\"NEXT SPEAKER:<speaker name>\""));
        assert!(text.contains("write: FINAL ANSWER"));
    }

    #[test]
    fn test_synthesized_instructions() {
        let inputs = vec![ParameterSchema::new("digits", "string", "the digits to count")];
        let output = OutputSchema::new("number", "the ratio");
        let text = synthesized_capability_instructions(
            "CountEven",
            "Counts even digits.",
            &inputs,
            Some(&output),
        )
        .unwrap();
        assert!(text.contains("\"CountEven\""));
        assert!(text.contains("- digits (string): the digits to count"));
        assert!(text.contains("Return a number: the ratio"));
    }

    #[test]
    fn test_synthesized_instructions_without_schema() {
        let text = synthesized_capability_instructions("Ping", "Answers pong.", &[], None).unwrap();
        assert!(!text.contains("Inputs:"));
        assert!(!text.contains("Return a"));
    }

    #[test]
    fn test_composition_prompt_has_assignment_slot() {
        assert!(TEAM_COMPOSITION_PROMPT.contains("{{assignment}}"));
    }
}
