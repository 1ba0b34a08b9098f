//! System prompts for each collaborator request kind

use crate::llm::collaborator::CollaboratorKind;

pub fn system_prompt(kind: CollaboratorKind) -> &'static str {
    match kind {
        CollaboratorKind::Plan => PLAN_SYSTEM_PROMPT,
        CollaboratorKind::Reflect => REFLECT_SYSTEM_PROMPT,
        CollaboratorKind::ConverseTurn => CONVERSE_SYSTEM_PROMPT,
        CollaboratorKind::PerceiveFilter => PERCEIVE_SYSTEM_PROMPT,
    }
}

const PLAN_SYSTEM_PROMPT: &str = r#"You plan the day of a character living in a small town simulation.
The context is JSON describing the character, the current time, where they are,
the places they know and memories relevant to the decision.

When "mode" is "schedule", break the rest of the day into activities:
{"schedule": [{"activity": "...", "duration_minutes": 60, "address": "world:sector:arena"}]}

When "mode" is "next_action", turn the given activity into one concrete action:
{"action": {"description": "...", "address": "world:sector:arena[:object]",
  "converse_with": null, "emoji": "...", "predicate": "...", "object": "...",
  "duration_minutes": 30, "question": null}}

Only use addresses from "known_places". Set "converse_with" to the name of a
nearby character only when the character would start a conversation.
Respond with JSON only."#;

const REFLECT_SYSTEM_PROMPT: &str = r#"You help a character reflect on recent experience.
The context lists focal questions and numbered statements from memory.
Write high-level insights the statements support. Every insight must cite the
ids of the statements it rests on.

{"insights": [{"statement": "...", "evidence": [3, 7], "poignancy": 6, "keywords": ["..."]}]}

Poignancy is 1 (mundane) to 10 (life changing). Respond with JSON only."#;

const CONVERSE_SYSTEM_PROMPT: &str = r#"You write the next line of a conversation between two characters.
The context gives both characters' current activities, the transcript so far
and the speaker's relevant memories. Keep the line short and in character.
Set "end" to true when the conversation has naturally finished.

{"utterance": "...", "end": false}

Respond with JSON only."#;

const PERCEIVE_SYSTEM_PROMPT: &str = r#"You rate how important observed events are to a character.
For each event in order, give a score from 1 (mundane, like brushing teeth)
to 10 (extremely poignant, like a breakup). Return exactly one score per event.

{"poignancy": [2, 7]}

Respond with JSON only."#;
