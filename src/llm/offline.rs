//! Deterministic collaborators for running without a hosted model
//!
//! Same inputs always give the same outputs, so offline runs replay exactly.

use ahash::RandomState;

use crate::core::error::CollaboratorError;
use crate::llm::collaborator::{
    EmbeddingProvider, EmbeddingUnavailable, FilterResponse, InsightDraft, LanguageModel, PlanMode, PlanRequest,
    PlanResponse, PlannedAction, ReflectRequest, ReflectResponse, Request, Response, TurnRequest, TurnResponse,
};
use crate::maze::address::Address;
use crate::memory::keywords::normalize_keyword;
use crate::memory::scratch::ScheduleItem;

const DAY_TEMPLATE: &[(&str, u32)] = &[
    ("waking up and getting ready", 60),
    ("having breakfast", 30),
    ("working", 240),
    ("having lunch", 60),
    ("working", 180),
    ("taking a walk", 60),
    ("having dinner", 60),
    ("relaxing", 120),
    ("sleeping", 480),
];

/// Rule-based stand-in for the language model
#[derive(Debug, Clone, Default)]
pub struct OfflineCollaborator;

impl OfflineCollaborator {
    pub fn new() -> Self {
        Self
    }

    fn plan(&self, request: &PlanRequest) -> PlanResponse {
        match request.mode {
            PlanMode::Schedule => {
                let offset = request.agent.bytes().map(usize::from).sum::<usize>();
                let schedule = DAY_TEMPLATE
                    .iter()
                    .enumerate()
                    .map(|(i, (activity, minutes))| ScheduleItem {
                        activity: activity.to_string(),
                        duration_minutes: *minutes,
                        address: pick_place(&request.known_places, i + offset),
                    })
                    .collect();
                PlanResponse {
                    schedule,
                    action: None,
                }
            }
            PlanMode::NextAction => {
                let description = request.activity.clone().unwrap_or_else(|| "idle".to_string());
                let converse_with = if description.contains("walk") {
                    request.nearby_agents.first().cloned()
                } else {
                    None
                };
                PlanResponse {
                    schedule: Vec::new(),
                    action: Some(PlannedAction {
                        emoji: Some(emoji_for(&description).to_string()),
                        description,
                        converse_with,
                        ..PlannedAction::default()
                    }),
                }
            }
        }
    }

    fn reflect(&self, request: &ReflectRequest) -> ReflectResponse {
        let Some(first) = request.statements.first() else {
            return ReflectResponse::default();
        };
        let topic = request
            .focal_points
            .first()
            .map(String::as_str)
            .unwrap_or(first.description.as_str());
        ReflectResponse {
            insights: vec![InsightDraft {
                statement: format!("{} has been occupied with {}", request.agent, topic),
                evidence: request.statements.iter().take(3).map(|s| s.id).collect(),
                poignancy: Some(5.0),
                keywords: Vec::new(),
            }],
        }
    }

    fn converse(&self, request: &TurnRequest) -> TurnResponse {
        let utterance = if request.transcript.is_empty() {
            format!("Hi {}, how are you?", request.listener)
        } else {
            format!("Good to see you. I am {}.", request.speaker_action)
        };
        TurnResponse {
            utterance,
            end: request.transcript.len() + 1 >= 2,
        }
    }
}

fn pick_place(places: &[String], index: usize) -> Option<Address> {
    if places.is_empty() {
        return None;
    }
    places[index % places.len()].parse().ok()
}

fn emoji_for(description: &str) -> &'static str {
    if description.contains("sleep") {
        "😴"
    } else if description.contains("breakfast") || description.contains("lunch") || description.contains("dinner") {
        "🍽️"
    } else if description.contains("work") {
        "💼"
    } else if description.contains("walk") {
        "🚶"
    } else {
        "🙂"
    }
}

impl LanguageModel for OfflineCollaborator {
    fn complete(&self, request: &Request) -> Result<Response, CollaboratorError> {
        Ok(match request {
            Request::Plan(r) => Response::Plan(self.plan(r)),
            Request::Reflect(r) => Response::Reflect(self.reflect(r)),
            Request::ConverseTurn(r) => Response::ConverseTurn(self.converse(r)),
            Request::PerceiveFilter(r) => Response::PerceiveFilter(FilterResponse {
                poignancy: r
                    .events
                    .iter()
                    .map(|e| {
                        if e.is_idle() {
                            1.0
                        } else {
                            let words = e.description.split_whitespace().count();
                            (2 + (words / 4).min(6)) as f32
                        }
                    })
                    .collect(),
            }),
        })
    }
}

/// Bag-of-words embedding: each normalized token hashes to a signed bucket
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
    state: RandomState,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            state: RandomState::with_seeds(0x5eed, 0x7e11, 0xa55e, 0x0c1a),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingUnavailable> {
        if self.dim == 0 {
            return Err(EmbeddingUnavailable("zero embedding dimension".into()));
        }
        let mut vector = vec![0.0f32; self.dim];
        let mut tokens = 0;
        for token in text.split_whitespace().filter_map(normalize_keyword) {
            let hash = self.state.hash_one(&token);
            let bucket = (hash % self.dim as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
            tokens += 1;
        }
        if tokens == 0 {
            return Err(EmbeddingUnavailable(format!("no tokens in '{}'", text)));
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::NodeId;
    use crate::llm::collaborator::{FilterRequest, Statement};
    use crate::maze::tile::TileEvent;
    use crate::retrieval::cosine_similarity;

    fn plan_request(mode: PlanMode) -> PlanRequest {
        PlanRequest {
            agent: "Isabella Rodriguez".into(),
            identity: "cafe owner".into(),
            time: "Day 1, 07:00".into(),
            mode,
            current_place: "town:cafe:kitchen".into(),
            known_places: vec!["town:cafe:kitchen".into(), "town:park:lawn".into()],
            nearby_agents: vec!["Klaus Mueller".into()],
            activity: Some("taking a walk".into()),
            memories: vec![],
        }
    }

    #[test]
    fn test_schedule_uses_known_places() {
        let offline = OfflineCollaborator::new();
        let response = offline.plan(&plan_request(PlanMode::Schedule));
        assert_eq!(response.schedule.len(), DAY_TEMPLATE.len());
        for item in &response.schedule {
            let address = item.address.as_ref().unwrap().to_string();
            assert!(address == "town:cafe:kitchen" || address == "town:park:lawn");
        }
    }

    #[test]
    fn test_walk_invites_nearby_agent() {
        let offline = OfflineCollaborator::new();
        let action = offline.plan(&plan_request(PlanMode::NextAction)).action.unwrap();
        assert_eq!(action.converse_with.as_deref(), Some("Klaus Mueller"));
        assert_eq!(action.emoji.as_deref(), Some("🚶"));
    }

    #[test]
    fn test_reflection_cites_statements() {
        let offline = OfflineCollaborator::new();
        let response = offline.reflect(&ReflectRequest {
            agent: "Klaus".into(),
            focal_points: vec!["research".into()],
            statements: (1..=5)
                .map(|i| Statement {
                    id: NodeId(i),
                    description: format!("statement {}", i),
                })
                .collect(),
        });
        assert_eq!(response.insights.len(), 1);
        assert_eq!(response.insights[0].evidence, vec![NodeId(1), NodeId(2), NodeId(3)]);
    }

    #[test]
    fn test_idle_events_score_one() {
        let offline = OfflineCollaborator::new();
        let response = offline
            .complete(&Request::PerceiveFilter(FilterRequest {
                agent: "Klaus".into(),
                identity: String::new(),
                events: vec![
                    TileEvent::idle("bed"),
                    TileEvent::new("Maria", "is", "painting", "Maria is painting a large mural"),
                ],
            }))
            .unwrap()
            .into_filter()
            .unwrap();
        assert_eq!(response.poignancy[0], 1.0);
        assert!(response.poignancy[1] > 1.0);
    }

    #[test]
    fn test_hashing_embedder_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(32);
        let a = embedder.embed("brewing coffee in the kitchen").unwrap();
        let b = embedder.embed("brewing coffee in the kitchen").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);

        let plain = embedder.embed("coffee").unwrap();
        let noisy = embedder.embed("Coffee!").unwrap();
        assert_eq!(plain, noisy);
        assert!((cosine_similarity(&plain, &noisy) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_embedder_rejects_empty_text() {
        let embedder = HashingEmbedder::new(8);
        assert!(embedder.embed("  ").is_err());
    }
}
