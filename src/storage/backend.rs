use async_trait::async_trait;

// ============================================================================
// Key-Value Backend Abstraction
// ============================================================================
//
// The order store only needs point reads, set reads and one atomic write
// primitive: the guarded batch. A batch is evaluated in two phases:
//
// 1. every guard (SetIfAbsent, SetIfPresent, DeleteExisting) is checked
// 2. if all guards hold, every command is applied in order
//
// If any guard fails nothing is written and the position of the first
// failing command is reported. Implementations must make both phases a
// single atomic unit with respect to every other batch.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("unexpected backend reply: {0}")]
    UnexpectedReply(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Write `value` at `key`; guard: key must be absent
    SetIfAbsent { key: String, value: String },
    /// Replace the value at `key`; guard: key must be present
    SetIfPresent { key: String, value: String },
    /// Remove `key`; guard: key must be present
    DeleteExisting { key: String },
    /// Add `member` to the set at `key`
    SetAdd { key: String, member: String },
    /// Remove `member` from the set at `key`
    SetRemove { key: String, member: String },
}

impl Command {
    pub fn key(&self) -> &str {
        match self {
            Command::SetIfAbsent { key, .. }
            | Command::SetIfPresent { key, .. }
            | Command::DeleteExisting { key }
            | Command::SetAdd { key, .. }
            | Command::SetRemove { key, .. } => key,
        }
    }

    /// Wire name understood by the batch script
    pub fn op_name(&self) -> &'static str {
        match self {
            Command::SetIfAbsent { .. } => "set_nx",
            Command::SetIfPresent { .. } => "set_xx",
            Command::DeleteExisting { .. } => "del_xx",
            Command::SetAdd { .. } => "sadd",
            Command::SetRemove { .. } => "srem",
        }
    }

    /// Value or member argument; empty for commands that take none
    pub fn arg(&self) -> &str {
        match self {
            Command::SetIfAbsent { value, .. } | Command::SetIfPresent { value, .. } => value,
            Command::SetAdd { member, .. } | Command::SetRemove { member, .. } => member,
            Command::DeleteExisting { .. } => "",
        }
    }

    /// Evaluate the guard given whether the target key currently exists
    pub fn guard_holds(&self, key_exists: bool) -> bool {
        match self {
            Command::SetIfAbsent { .. } => !key_exists,
            Command::SetIfPresent { .. } | Command::DeleteExisting { .. } => key_exists,
            Command::SetAdd { .. } | Command::SetRemove { .. } => true,
        }
    }
}

/// Ordered list of commands executed all-or-nothing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Applied,
    /// Guard of the command at this position failed; nothing was written
    Aborted { at: usize },
}

#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    async fn exists(&self, key: &str) -> Result<bool, BackendError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, BackendError>;

    async fn is_member(&self, key: &str, member: &str) -> Result<bool, BackendError>;

    async fn execute(&self, batch: Batch) -> Result<BatchOutcome, BackendError>;

    async fn ping(&self) -> Result<(), BackendError>;

    /// Human-readable backend name for logs and health output
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards() {
        let set_nx = Command::SetIfAbsent { key: "k".into(), value: "v".into() };
        let set_xx = Command::SetIfPresent { key: "k".into(), value: "v".into() };
        let del = Command::DeleteExisting { key: "k".into() };
        let sadd = Command::SetAdd { key: "s".into(), member: "k".into() };

        assert!(set_nx.guard_holds(false));
        assert!(!set_nx.guard_holds(true));
        assert!(set_xx.guard_holds(true));
        assert!(!set_xx.guard_holds(false));
        assert!(!del.guard_holds(false));
        assert!(sadd.guard_holds(false) && sadd.guard_holds(true));
    }

    #[test]
    fn test_batch_keeps_order() {
        let batch = Batch::new()
            .push(Command::SetIfAbsent { key: "order:1".into(), value: "{}".into() })
            .push(Command::SetAdd { key: "orders".into(), member: "order:1".into() });

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.commands()[0].op_name(), "set_nx");
        assert_eq!(batch.commands()[1].key(), "orders");
        assert_eq!(batch.commands()[1].arg(), "order:1");
    }
}
