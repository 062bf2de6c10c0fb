use uuid::Uuid;

/// 実行を起動した経路。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTrigger {
    Scheduled,
    Manual,
    Api,
    OneShot,
}

impl RunTrigger {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
            Self::Api => "api",
            Self::OneShot => "one_shot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: Uuid,
    pub trigger: RunTrigger,
}

impl RunContext {
    #[must_use]
    pub fn new(trigger: RunTrigger) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            trigger,
        }
    }
}
