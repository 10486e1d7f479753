//! The audit's mutable, mutex-guarded state.

use crate::history::{ErrorLog, History};

pub struct AuditState {
    pub leader_history: History<u64, String>,
    pub primary_history: History<u64, String>,
    pub raft_commit_history: History<u64, String>,
    pub pbft_commit_history: History<u64, String>,
    pub errors: ErrorLog,

    pub last_leader: String,
    pub last_leader_commit_index: u64,
    pub leader_has_uncommitted_entries: bool,

    pub leader_dead_count: u64,
    pub primary_dead_count: u64,
    pub leader_stuck_count: u64,
}

impl AuditState {
    pub fn new(ceiling: usize) -> Self {
        Self {
            leader_history: History::new(ceiling),
            primary_history: History::new(ceiling),
            raft_commit_history: History::new(ceiling),
            pbft_commit_history: History::new(ceiling),
            errors: ErrorLog::new(ceiling),
            last_leader: String::new(),
            last_leader_commit_index: 0,
            leader_has_uncommitted_entries: false,
            leader_dead_count: 0,
            primary_dead_count: 0,
            leader_stuck_count: 0,
        }
    }

    /// Sum of (Raft commit history, error sequence, leader history) sizes.
    /// Primary/PBFT-commit histories are deliberately excluded from this
    /// diagnostic.
    pub fn current_memory_size(&self) -> usize {
        self.raft_commit_history.len() + self.errors.len() + self.leader_history.len()
    }
}
