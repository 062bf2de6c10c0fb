use uuid::Uuid;

use super::{GeneratedContent, PipelineError, PublishStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Fetch,
    Generate,
    Publish,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Generate => "generate",
            Self::Publish => "publish",
        }
    }
}

/// アイデア生成まで到達した実行。公開の成否はここに含まれる。
#[derive(Debug)]
pub struct CompletedRun {
    pub run_id: Uuid,
    pub content: GeneratedContent,
    pub publish: PublishStatus,
}

/// 1回の `PipelineRunner::execute` の結果。
#[derive(Debug)]
pub enum ExecutionResult {
    Completed(CompletedRun),
    Failed {
        run_id: Uuid,
        stage: Stage,
        error: PipelineError,
    },
}

impl ExecutionResult {
    pub(crate) fn failed(run_id: Uuid, error: PipelineError) -> Self {
        Self::Failed {
            run_id,
            stage: error.stage(),
            error,
        }
    }

    #[must_use]
    pub fn run_id(&self) -> Uuid {
        match self {
            Self::Completed(run) => run.run_id,
            Self::Failed { run_id, .. } => *run_id,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    #[must_use]
    pub fn content(&self) -> Option<&GeneratedContent> {
        match self {
            Self::Completed(run) => Some(&run.content),
            Self::Failed { .. } => None,
        }
    }

    /// 正常に完了したステージを実行順に返す。
    #[must_use]
    pub fn completed_stages(&self) -> Vec<Stage> {
        match self {
            Self::Completed(run) => {
                let mut stages = vec![Stage::Fetch, Stage::Generate];
                if matches!(run.publish, PublishStatus::Published(_)) {
                    stages.push(Stage::Publish);
                }
                stages
            }
            Self::Failed {
                stage: Stage::Generate,
                ..
            } => vec![Stage::Fetch],
            Self::Failed { .. } => Vec::new(),
        }
    }

    /// ステージ1・2の失敗だけをエラーとして取り出す。
    ///
    /// # Errors
    /// トピック取得またはアイデア生成に失敗していた場合は [`PipelineError`] を返す。
    pub fn into_result(self) -> Result<CompletedRun, PipelineError> {
        match self {
            Self::Completed(run) => Ok(run),
            Self::Failed { error, .. } => Err(error),
        }
    }
}
