//! Converse: pairwise conversations as an orchestrator-mediated transition
//!
//! Both participants hold a `ChatState` for the same conversation. Every
//! change (starting, adding an utterance, ending) is applied to both sides
//! within one call, so neither agent ever observes a half-updated partner.
//! A conversation advances at most one utterance per step.

use ahash::AHashMap;

use crate::agent::{content_keywords, Agent, CycleContext};
use crate::core::error::Result;
use crate::core::types::{AgentId, NodeId};
use crate::llm::collaborator::{Request, TurnRequest};
use crate::memory::node::{NewMemory, Utterance};
use crate::memory::scratch::ChatState;
use crate::retrieval::Query;

const SUMMARY_CHARS: usize = 47;

/// Two distinct agents of the registry, mutably
pub fn pair_mut(agents: &mut [Agent], a: usize, b: usize) -> Option<(&mut Agent, &mut Agent)> {
    if a == b || a >= agents.len() || b >= agents.len() {
        return None;
    }
    if a < b {
        let (left, right) = agents.split_at_mut(b);
        Some((&mut left[a], &mut right[0]))
    } else {
        let (left, right) = agents.split_at_mut(a);
        Some((&mut right[0], &mut left[b]))
    }
}

/// Start or advance the conversation of the agent at `me`
pub fn converse(
    agents: &mut [Agent],
    index: &AHashMap<AgentId, usize>,
    me: usize,
    ctx: &mut CycleContext,
) -> Result<()> {
    let now = ctx.now();
    let Some(agent) = agents.get(me) else {
        return Ok(());
    };

    if let Some(chat) = &agent.scratch.chat_state {
        if chat.turn_owner != agent.id || chat.last_turn_at == Some(now) {
            return Ok(());
        }
        let Some(&partner) = index.get(&chat.partner) else {
            return Ok(());
        };
        if let Some((speaker, listener)) = pair_mut(agents, me, partner) {
            take_turn(speaker, listener, ctx)?;
        }
        return Ok(());
    }

    let Some(partner_id) = agent.scratch.current_action.as_ref().and_then(|a| a.wants_to_talk_to()) else {
        return Ok(());
    };
    let Some(&partner) = index.get(&partner_id) else {
        return Ok(());
    };
    let Some((initiator, responder)) = pair_mut(agents, me, partner) else {
        return Ok(());
    };
    if !initiator.tile().is_adjacent_or_same(&responder.tile())
        || !initiator.scratch.can_chat_with(responder.id, now)
        || !responder.scratch.can_chat_with(initiator.id, now)
    {
        return Ok(());
    }

    tracing::info!("{} starts talking with {}", initiator.name(), responder.name());
    let open = |partner: &Agent, owner: AgentId| ChatState {
        partner: partner.id,
        partner_name: partner.name().to_string(),
        transcript: Vec::new(),
        turn_owner: owner,
        started_at: now,
        last_turn_at: None,
        context: Default::default(),
    };
    let owner = initiator.id;
    initiator.scratch.chat_state = Some(open(responder, owner));
    responder.scratch.chat_state = Some(open(initiator, owner));
    initiator.scratch.clear_path();
    responder.scratch.clear_path();

    take_turn(initiator, responder, ctx)
}

/// One utterance by `speaker`, mirrored into both transcripts
fn take_turn(speaker: &mut Agent, listener: &mut Agent, ctx: &mut CycleContext) -> Result<()> {
    let now = ctx.now();
    let config = &ctx.config.conversation;
    let (max_turns, limit) = (config.max_turns, config.context_limit);

    let query = Query::new(vec![
        ctx.focal_point(listener.name().to_string()),
        ctx.focal_point(listener.scratch.action_description().to_string()),
    ])
    .with_limit(limit);
    let params = ctx.retrieval_params();
    let ids = speaker.retrieve(&query, now, &params).all_ids();
    let memories: Vec<String> = ids
        .iter()
        .filter_map(|id| speaker.memory.get(*id))
        .take(limit)
        .map(|n| n.description.clone())
        .collect();

    let transcript = speaker
        .scratch
        .chat_state
        .as_ref()
        .map(|c| c.transcript.clone())
        .unwrap_or_default();
    if let Some(chat) = speaker.scratch.chat_state.as_mut() {
        chat.context.extend(ids);
    }

    let request = Request::ConverseTurn(TurnRequest {
        speaker: speaker.name().to_string(),
        listener: listener.name().to_string(),
        speaker_action: speaker.scratch.action_description().to_string(),
        listener_action: listener.scratch.action_description().to_string(),
        transcript,
        memories,
        max_turns,
    });
    let utterance = match ctx.complete(&request).and_then(|r| r.into_turn()) {
        Ok(turn) if !turn.utterance.trim().is_empty() => {
            Some((Utterance::new(speaker.name(), turn.utterance.trim()), turn.end))
        }
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("{} and {} stop talking: {}", speaker.name(), listener.name(), e);
            None
        }
    };

    let mut finished = true;
    let next_owner = listener.id;
    for agent in [&mut *speaker, &mut *listener] {
        if let Some(chat) = agent.scratch.chat_state.as_mut() {
            if let Some((line, end)) = &utterance {
                chat.transcript.push(line.clone());
                finished = *end || chat.transcript.len() >= max_turns;
            }
            chat.turn_owner = next_owner;
            chat.last_turn_at = Some(now);
        }
    }

    if finished {
        finish(speaker, listener, ctx)?;
    }
    Ok(())
}

/// Record the conversation in both memories and release both agents
fn finish(a: &mut Agent, b: &mut Agent, ctx: &mut CycleContext) -> Result<()> {
    let now = ctx.now();
    let (Some(chat_a), Some(chat_b)) = (a.scratch.chat_state.take(), b.scratch.chat_state.take()) else {
        return Ok(());
    };
    tracing::info!(
        "{} and {} finished talking after {} lines",
        a.name(),
        b.name(),
        chat_a.transcript.len()
    );

    if !chat_a.transcript.is_empty() {
        let description = summarize(&chat_a.transcript);
        let embedding = ctx.embed_or_zero(&description);
        record_chat(a, &chat_a, &description, &embedding, ctx)?;
        record_chat(b, &chat_b, &description, &embedding, ctx)?;
    }

    let until = now + ctx.config.conversation.cooldown_steps;
    for (agent, partner) in [(a, chat_a.partner), (b, chat_b.partner)] {
        agent.scratch.chat_cooldowns.insert(partner, until);
        agent.scratch.current_action = None;
        agent.scratch.clear_path();
    }
    Ok(())
}

fn record_chat(
    agent: &mut Agent,
    chat: &ChatState,
    description: &str,
    embedding: &[f32],
    ctx: &CycleContext,
) -> Result<NodeId> {
    let mut keywords = vec![chat.partner_name.clone(), agent.name().to_string()];
    keywords.extend(content_keywords(description));
    let entry = NewMemory::chat(
        chat.partner_name.clone(),
        "chatted with",
        agent.name(),
        description,
        chat.transcript.clone(),
    )
    .with_poignancy(ctx.config.conversation.chat_poignancy)
    .with_keywords(keywords)
    .with_embedding(embedding.to_vec())
    .with_filling(chat.context.iter().copied().collect());
    agent.record(entry, ctx.now())
}

/// "conversing about <opening line>", cut to a short prefix
fn summarize(transcript: &[Utterance]) -> String {
    let opening = transcript.first().map(|u| u.text.as_str()).unwrap_or_default();
    if opening.chars().count() > SUMMARY_CHARS {
        let cut: String = opening.chars().take(SUMMARY_CHARS).collect();
        format!("conversing about {}...", cut)
    } else {
        format!("conversing about {}", opening)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SimClock;
    use crate::core::config::EngineConfig;
    use crate::core::types::TileCoord;
    use crate::llm::Collaborators;
    use crate::maze::tile::TileEvent;
    use crate::memory::node::MemoryKind;
    use crate::memory::scratch::{ActionTarget, CurrentAction};
    use crate::simulation::stats::DegradationStats;

    fn pair(config: &EngineConfig) -> (Vec<Agent>, AHashMap<AgentId, usize>) {
        let dim = config.collaborator.embedding_dim;
        let mut klaus = Agent::new(AgentId(1), "Klaus", TileCoord::new(1, 1), dim);
        klaus.scratch.current_action = Some(CurrentAction {
            description: "looking for Maria".into(),
            target: ActionTarget::Agent(AgentId(2)),
            start_step: 0,
            duration_steps: 30,
            emoji: "👋".into(),
            event: TileEvent::new("Klaus", "is", "looking for Maria", "Klaus is looking for Maria"),
        });
        let maria = Agent::new(AgentId(2), "Maria", TileCoord::new(2, 1), dim);
        let index = [(AgentId(1), 0), (AgentId(2), 1)].into_iter().collect();
        (vec![klaus, maria], index)
    }

    #[test]
    fn test_pair_mut_either_order() {
        let (mut agents, _) = pair(&EngineConfig::default());
        let (a, b) = pair_mut(&mut agents, 1, 0).unwrap();
        assert_eq!((a.id, b.id), (AgentId(2), AgentId(1)));
        assert!(pair_mut(&mut agents, 1, 1).is_none());
        assert!(pair_mut(&mut agents, 0, 5).is_none());
    }

    #[test]
    fn test_conversation_alternates_and_records_both_sides() {
        let mut config = EngineConfig::default();
        config.conversation.max_turns = 4;
        let collaborators = Collaborators::offline(&config.collaborator);
        let mut stats = DegradationStats::new();
        let mut clock = SimClock::default();
        let (mut agents, index) = pair(&config);

        // Step 0: Klaus opens; Maria may not answer in the same step
        {
            let mut ctx = CycleContext::new(&config, &collaborators, &mut stats, &clock);
            converse(&mut agents, &index, 0, &mut ctx).unwrap();
            converse(&mut agents, &index, 1, &mut ctx).unwrap();
        }
        let chat = agents[1].scratch.chat_state.as_ref().unwrap();
        assert_eq!(chat.transcript.len(), 1);
        assert_eq!(chat.turn_owner, AgentId(2));
        assert_eq!(agents[0].scratch.chat_state.as_ref().unwrap().transcript, chat.transcript);

        // The offline model ends after its reply
        clock.advance();
        {
            let mut ctx = CycleContext::new(&config, &collaborators, &mut stats, &clock);
            converse(&mut agents, &index, 0, &mut ctx).unwrap();
            converse(&mut agents, &index, 1, &mut ctx).unwrap();
        }

        assert!(!agents[0].is_chatting());
        assert!(!agents[1].is_chatting());
        let klaus_chat = agents[0].memory.get_recent(MemoryKind::Chat, 1)[0].clone();
        let maria_chat = agents[1].memory.get_recent(MemoryKind::Chat, 1)[0].clone();
        assert_eq!(klaus_chat.subject, "Maria");
        assert_eq!(maria_chat.subject, "Klaus");
        assert_eq!(klaus_chat.transcript, maria_chat.transcript);
        assert_eq!(klaus_chat.transcript[0].speaker, "Klaus");
        assert_eq!(klaus_chat.transcript[1].speaker, "Maria");
        assert!(agents[0].scratch.current_action.is_none());
        assert!(!agents[0].scratch.can_chat_with(AgentId(2), clock.current_step()));
    }

    #[test]
    fn test_no_conversation_when_apart() {
        let config = EngineConfig::default();
        let collaborators = Collaborators::offline(&config.collaborator);
        let mut stats = DegradationStats::new();
        let clock = SimClock::default();
        let (mut agents, index) = pair(&config);
        agents[1].scratch.current_tile = TileCoord::new(5, 5);

        let mut ctx = CycleContext::new(&config, &collaborators, &mut stats, &clock);
        converse(&mut agents, &index, 0, &mut ctx).unwrap();
        assert!(!agents[0].is_chatting());
        assert!(!agents[1].is_chatting());
    }

    #[test]
    fn test_summary_truncates_long_openings() {
        let long = "a".repeat(60);
        let summary = summarize(&[Utterance::new("Klaus", long)]);
        assert_eq!(summary, format!("conversing about {}...", "a".repeat(47)));
        assert_eq!(summarize(&[Utterance::new("Klaus", "hi")]), "conversing about hi");
    }
}
