//! Arbitrators - combine the answers of several paths into one

use puppeteer_core::{Answer, Error, ModelConfig, PathId, Result, Task};
use puppeteer_llm::{LlmProvider, LlmRequest};
use std::collections::HashMap;
use std::sync::Arc;

/// An answered path, in path order.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub path_id: PathId,
    pub answer: Answer,
}

#[async_trait::async_trait]
pub trait Arbitrator: Send + Sync {
    fn name(&self) -> &str;

    async fn arbitrate(&self, task: &Task, candidates: &[Candidate]) -> Result<Answer>;
}

/// Most frequent answer wins; ties go to the earliest path.
#[derive(Clone, Copy, Debug, Default)]
pub struct MajorityVote;

impl MajorityVote {
    pub fn vote(candidates: &[Candidate]) -> Option<&Answer> {
        let mut tally: HashMap<String, (usize, usize)> = HashMap::new();
        for (i, candidate) in candidates.iter().enumerate() {
            if candidate.answer.is_empty() {
                continue;
            }
            let entry = tally.entry(candidate.answer.vote_key()).or_insert((0, i));
            entry.0 += 1;
        }
        tally
            .into_values()
            .max_by(|(count_a, first_a), (count_b, first_b)| {
                count_a.cmp(count_b).then(first_b.cmp(first_a))
            })
            .map(|(_, first)| &candidates[first].answer)
    }
}

#[async_trait::async_trait]
impl Arbitrator for MajorityVote {
    fn name(&self) -> &str {
        "majority"
    }

    async fn arbitrate(&self, _task: &Task, candidates: &[Candidate]) -> Result<Answer> {
        Self::vote(candidates)
            .cloned()
            .ok_or_else(|| Error::ArbitrationFailure("no non-empty candidate answers".into()))
    }
}

/// Asks the model to reconcile the candidates into one final answer.
pub struct LlmArbitrator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl LlmArbitrator {
    pub fn new(provider: Arc<dyn LlmProvider>, model: &ModelConfig) -> Self {
        Self {
            provider,
            model: model.name.clone(),
            max_tokens: model.max_tokens,
            temperature: model.temperature,
        }
    }

    fn prompt(task: &Task, candidates: &[Candidate]) -> String {
        let mut prompt = format!(
            "Task ({}): {}\n\nIndependent reasoning paths proposed these answers:\n",
            task.kind, task.question
        );
        for candidate in candidates {
            prompt.push_str(&format!("- {}: {}\n", candidate.path_id, candidate.answer));
        }
        prompt.push_str(&format!(
            "\nWeigh them and give the single best final answer. {}\n",
            task.answer_format().instruction()
        ));
        prompt
    }
}

#[async_trait::async_trait]
impl Arbitrator for LlmArbitrator {
    fn name(&self) -> &str {
        "llm"
    }

    async fn arbitrate(&self, task: &Task, candidates: &[Candidate]) -> Result<Answer> {
        if candidates.is_empty() {
            return Err(Error::ArbitrationFailure("no candidate answers".into()));
        }
        let mut request = LlmRequest::prompt(
            self.model.as_str(),
            Some("You are the final arbitrator of a panel of reasoning agents.".to_string()),
            Self::prompt(task, candidates),
        );
        request.max_tokens = Some(self.max_tokens);
        request.temperature = self.temperature;

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| Error::ArbitrationFailure(e.to_string()))?;
        task.answer_format()
            .normalize(&response.text)
            .ok_or_else(|| Error::ArbitrationFailure("no usable answer in reply".into()))
    }
}
