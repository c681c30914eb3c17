use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;

use crate::request::{GuardRequest, RequestContext};

use super::union::UnionStage;
use super::{Decision, Stage};

/// A chain of stages that are executed in sequence
///
/// - Stages run in order while they return Continue
/// - The first Halt ends the run, later stages are skipped
/// - If every stage returns Continue, the final result is Continue
///
/// Once the request completed, every stage's post handler runs in reverse
/// order and the request context is cleared.
pub struct Pipeline {
    stages: Vec<UnionStage>,
}

impl Pipeline {
    pub fn new(stages: Vec<UnionStage>) -> Self {
        Self { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs a request through the whole pipeline with a fresh context.
    pub async fn handle(&self, req: &GuardRequest) -> Result<Decision> {
        let mut ctx = RequestContext::new();
        let result = self.pre_handle(req, &mut ctx).await;
        self.post_handle(req, &mut ctx).await;
        result
    }
}

#[async_trait]
impl Stage for Pipeline {
    async fn pre_handle(&self, req: &GuardRequest, ctx: &mut RequestContext) -> Result<Decision> {
        for stage in self.stages.iter() {
            let decision = stage
                .pre_handle(req, ctx)
                .await
                .with_context(|| format!("{} stage", stage.name()))?;
            if let Decision::Halt(status) = decision {
                debug!(
                    "{} request halted by {} stage with {status}",
                    req.method(),
                    stage.name()
                );
                return Ok(decision);
            }
        }

        Ok(Decision::Continue)
    }

    async fn post_handle(&self, req: &GuardRequest, ctx: &mut RequestContext) {
        for stage in self.stages.iter().rev() {
            stage.post_handle(req, ctx).await;
        }
        ctx.clear();
    }
}
