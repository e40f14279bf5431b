//! 研究运行状态：阶段状态机与 RunState
//!
//! RunState 只由循环控制器在两轮之间修改，不跨请求共享。

use serde::Serialize;

use crate::research::{SearchQuery, SummaryRecord};

/// 循环控制器的阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ResearchPhase {
    Initial,
    Researching,
    Reflecting,
    Finalizing,
}

impl ResearchPhase {
    /// 允许的迁移；Finalizing 为终态
    pub fn can_transition_to(self, next: ResearchPhase) -> bool {
        use ResearchPhase::*;
        matches!(
            (self, next),
            (Initial, Researching)
                | (Researching, Reflecting)
                | (Reflecting, Researching)
                | (Reflecting, Finalizing)
        )
    }
}

/// 单次研究的可变状态
#[derive(Debug)]
pub struct RunState {
    pub phase: ResearchPhase,
    /// 所有轮次累积的摘要（含失败的空证据记录）
    pub evidence_pool: Vec<SummaryRecord>,
    pub executed_queries: Vec<String>,
    /// 首轮之后已完成的追加轮数
    pub loop_count: usize,
    pub pending_queries: Vec<SearchQuery>,
    /// 当前轮次编号（首轮为 0）
    pub round: usize,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            phase: ResearchPhase::Initial,
            evidence_pool: Vec::new(),
            executed_queries: Vec::new(),
            loop_count: 0,
            pending_queries: Vec::new(),
            round: 0,
        }
    }
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 迁移到下一阶段；非法迁移属于编程错误，debug 构建下断言
    pub fn transition(&mut self, next: ResearchPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        tracing::info!(from = ?self.phase, to = ?next, round = self.round, "research phase");
        self.phase = next;
    }

    /// 取出待执行批次，并登记为已执行查询
    pub fn take_batch(&mut self) -> Vec<SearchQuery> {
        let batch = std::mem::take(&mut self.pending_queries);
        self.executed_queries
            .extend(batch.iter().map(|q| q.text.clone()));
        batch
    }

    pub fn record_round(&mut self, records: Vec<SummaryRecord>) {
        self.evidence_pool.extend(records);
    }

    /// 排入下一轮追加查询，loop_count + 1
    pub fn schedule_follow_up(&mut self, queries: Vec<SearchQuery>) {
        self.loop_count += 1;
        self.round += 1;
        self.pending_queries = queries;
    }

    /// 有实际内容的摘要
    pub fn usable_evidence(&self) -> impl Iterator<Item = &SummaryRecord> {
        self.evidence_pool.iter().filter(|r| !r.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        use ResearchPhase::*;
        assert!(Initial.can_transition_to(Researching));
        assert!(Reflecting.can_transition_to(Researching));
        assert!(Reflecting.can_transition_to(Finalizing));
        assert!(!Finalizing.can_transition_to(Researching));
        assert!(!Researching.can_transition_to(Finalizing));
    }

    #[test]
    fn test_take_batch_records_executed_queries() {
        let mut state = RunState::new();
        state.pending_queries = vec![SearchQuery::new("a", "r"), SearchQuery::new("b", "r")];
        let batch = state.take_batch();
        assert_eq!(batch.len(), 2);
        assert!(state.pending_queries.is_empty());
        assert_eq!(state.executed_queries, vec!["a", "b"]);

        state.schedule_follow_up(vec![SearchQuery::new("c", "gap")]);
        assert_eq!(state.loop_count, 1);
        assert_eq!(state.round, 1);
        state.take_batch();
        assert_eq!(state.executed_queries.len(), 3);
    }
}
