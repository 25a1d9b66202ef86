//! 运行状态簿记
//!
//! `ExecutionState` 是一次运行中编排器唯一持有的账本，维护两个不变量：
//! 1. 一个任务最多进入 `completed` 一次，且前提是至少有一条详情通过验收
//! 2. `completed` 与 `failed` 永远不相交
//!
//! 任务被判失败只有两种情况：搜索重试耗尽仍无候选；或它的所有候选
//! 在详情阶段都没有通过验收。

use std::collections::BTreeSet;

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Search,
    Detail,
    Persist,
    Report,
    Done,
}

/// 一次运行的状态账本
#[derive(Debug)]
pub struct ExecutionState {
    pub phase: Phase,
    /// 搜索阶段找到的候选总数
    pub found_count: usize,
    /// 通过验收的详情记录总数
    pub detailed_count: usize,
    /// 已报告完成的任务 ID
    completed: BTreeSet<i64>,
    /// 已判失败的任务 ID
    failed: BTreeSet<i64>,
    /// 至少贡献了一条验收详情的任务 ID（完成报告的依据）
    contributing: BTreeSet<i64>,
    /// 搜索阶段产出过候选的任务 ID
    searched_with_candidates: BTreeSet<i64>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Search,
            found_count: 0,
            detailed_count: 0,
            completed: BTreeSet::new(),
            failed: BTreeSet::new(),
            contributing: BTreeSet::new(),
            searched_with_candidates: BTreeSet::new(),
        }
    }

    /// 记录某任务搜索成功，产出 n 条候选
    pub fn record_search_found(&mut self, work_item_id: i64, candidate_count: usize) {
        self.found_count += candidate_count;
        if candidate_count > 0 {
            self.searched_with_candidates.insert(work_item_id);
        }
    }

    /// 记录某任务搜索重试耗尽仍无候选
    pub fn record_search_failed(&mut self, work_item_id: i64) {
        if !self.completed.contains(&work_item_id) {
            self.failed.insert(work_item_id);
        }
    }

    /// 记录某候选的详情通过验收
    pub fn record_accepted_detail(&mut self, work_item_id: i64) {
        self.detailed_count += 1;
        self.contributing.insert(work_item_id);
        // 之前被误判失败的任务现在有了产出，移出失败集合
        self.failed.remove(&work_item_id);
    }

    /// 详情阶段结束后结算：有候选但没有任何验收详情的任务判失败
    pub fn finalize_detail_phase(&mut self) {
        for id in &self.searched_with_candidates {
            if !self.contributing.contains(id) {
                self.failed.insert(*id);
            }
        }
    }

    /// 标记任务完成（幂等；仅限贡献过详情的任务）
    pub fn mark_completed(&mut self, work_item_id: i64) {
        if self.contributing.contains(&work_item_id) {
            self.failed.remove(&work_item_id);
            self.completed.insert(work_item_id);
        }
    }

    /// 需要报告完成的任务 ID 列表
    pub fn contributing_ids(&self) -> Vec<i64> {
        self.contributing.iter().copied().collect()
    }

    pub fn completed_ids(&self) -> &BTreeSet<i64> {
        &self.completed
    }

    pub fn failed_ids(&self) -> &BTreeSet<i64> {
        &self.failed
    }
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new()
    }
}

/// 一次运行的汇总结果
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub requested: usize,
    pub found: usize,
    pub detailed: usize,
    pub completed: usize,
    pub failed: usize,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 场景：任务 A 第一次搜索得 3 条候选，任务 B 三次重试均为空
    #[test]
    fn test_search_phase_scenario() {
        let mut state = ExecutionState::new();

        state.record_search_found(1, 3);
        state.record_search_failed(2);

        assert_eq!(state.found_count, 3);
        assert!(state.failed_ids().contains(&2));
        assert!(!state.failed_ids().contains(&1));
    }

    /// 场景：候选的详情在所有重试中都未通过验收 → 任务判失败且不计完成
    #[test]
    fn test_all_details_rejected_marks_failed() {
        let mut state = ExecutionState::new();

        state.record_search_found(1, 2);
        // 详情阶段没有任何 record_accepted_detail 调用
        state.finalize_detail_phase();

        assert!(state.failed_ids().contains(&1));
        assert!(state.contributing_ids().is_empty());

        // 没有贡献的任务不能被标记完成
        state.mark_completed(1);
        assert!(state.completed_ids().is_empty());
    }

    /// 完成标记幂等，且 completed 与 failed 不相交
    #[test]
    fn test_completed_at_most_once_and_disjoint_from_failed() {
        let mut state = ExecutionState::new();

        state.record_search_found(1, 1);
        state.record_accepted_detail(1);
        state.finalize_detail_phase();

        state.mark_completed(1);
        state.mark_completed(1);

        assert_eq!(state.completed_ids().len(), 1);
        assert!(state.completed_ids().is_disjoint(state.failed_ids()));
    }

    /// 同一任务的多条候选：只要有一条通过验收就不算失败
    #[test]
    fn test_sibling_candidate_rescues_work_item() {
        let mut state = ExecutionState::new();

        state.record_search_found(5, 3);
        // 前两条候选被丢弃，第三条通过
        state.record_accepted_detail(5);
        state.finalize_detail_phase();

        assert!(!state.failed_ids().contains(&5));
        assert_eq!(state.contributing_ids(), vec![5]);
    }

    #[test]
    fn test_detail_acceptance_overrides_earlier_failure() {
        let mut state = ExecutionState::new();

        // 任务先被判失败，随后另一轮产出了验收详情
        state.record_search_failed(9);
        state.record_accepted_detail(9);
        state.mark_completed(9);

        assert!(state.completed_ids().contains(&9));
        assert!(state.completed_ids().is_disjoint(state.failed_ids()));
    }
}
