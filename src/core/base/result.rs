//! The decisions of the rule check stages.
use super::{BlockError, BlockTypeError, SentinelRule, Snapshot};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// The rule class which blocked a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    Unknown,
    Flow,
    Authority,
    /// blocked by an open or half-open circuit breaker
    Degrade,
    System,
    /// raised by a check stage registered outside the built-in rule classes
    Custom(u8),
}

impl Default for BlockType {
    fn default() -> Self {
        Self::Unknown
    }
}

lazy_static! {
    static ref CUSTOM_BLOCK_NAMES: RwLock<HashMap<u8, String>> = RwLock::new(HashMap::new());
}

/// Names a custom block type so that block errors carrying it print the name.
/// A name, once given, is kept for the lifetime of the process.
pub fn register_block_type(
    block_type: BlockType,
    name: impl Into<String>,
) -> Result<(), BlockTypeError> {
    let id = match block_type {
        BlockType::Custom(id) => id,
        builtin => return Err(BlockTypeError::BuiltIn(builtin)),
    };
    let mut names = CUSTOM_BLOCK_NAMES.write().unwrap();
    if let Some(taken) = names.get(&id) {
        return Err(BlockTypeError::Taken {
            id,
            name: taken.clone(),
        });
    }
    names.insert(id, name.into());
    Ok(())
}

impl BlockType {
    /// Whether a built-in rule check raised this type.
    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }

    /// The printed name. Unnamed custom types print as `custom(<id>)`.
    pub fn name(&self) -> String {
        match self {
            Self::Unknown => "Unknown".into(),
            Self::Flow => "Flow".into(),
            Self::Authority => "Authority".into(),
            Self::Degrade => "Degrade".into(),
            Self::System => "System".into(),
            Self::Custom(id) => CUSTOM_BLOCK_NAMES
                .read()
                .unwrap()
                .get(id)
                .cloned()
                .unwrap_or_else(|| format!("custom({})", id)),
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// The decision of a rule check stage for one call.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenResult {
    Pass,
    Blocked(BlockError),
    /// pass after sleeping for the given nanoseconds
    Wait(u64),
}

impl Default for TokenResult {
    fn default() -> Self {
        TokenResult::Pass
    }
}

impl From<BlockError> for TokenResult {
    fn from(err: BlockError) -> Self {
        TokenResult::Blocked(err)
    }
}

impl TokenResult {
    pub fn new_pass() -> Self {
        Self::default()
    }

    pub fn new_should_wait(nanos_to_wait: u64) -> Self {
        Self::Wait(nanos_to_wait)
    }

    pub fn new_blocked(block_type: BlockType) -> Self {
        BlockError::new(block_type).into()
    }

    pub fn new_blocked_with_cause(
        block_type: BlockType,
        block_msg: String,
        rule: Arc<dyn SentinelRule>,
        snapshot_value: Arc<Snapshot>,
    ) -> Self {
        BlockError::new_with_cause(block_type, block_msg, rule, snapshot_value).into()
    }

    /// Combines the decisions of two controllers guarding the same call.
    /// A block wins, the first one seen is kept. Waits add up.
    pub fn and(self, other: TokenResult) -> TokenResult {
        match (self, other) {
            (blocked @ Self::Blocked(_), _) | (_, blocked @ Self::Blocked(_)) => blocked,
            (Self::Wait(a), Self::Wait(b)) => Self::Wait(a.saturating_add(b)),
            (Self::Wait(nanos), Self::Pass) | (Self::Pass, Self::Wait(nanos)) => Self::Wait(nanos),
            (Self::Pass, Self::Pass) => Self::Pass,
        }
    }

    pub fn reset_to_pass(&mut self) {
        *self = Self::Pass;
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    pub fn is_wait(&self) -> bool {
        matches!(self, Self::Wait(_))
    }

    pub fn block_err(&self) -> Option<BlockError> {
        match self {
            Self::Blocked(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Zero unless the call has to wait.
    pub fn nanos_to_wait(&self) -> u64 {
        match self {
            Self::Wait(nanos) => *nanos,
            _ => 0,
        }
    }
}

impl fmt::Display for TokenResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenResult::Pass => write!(f, "pass"),
            TokenResult::Blocked(err) => write!(f, "blocked ({})", err),
            TokenResult::Wait(nanos) => write!(f, "pass after {}ns", nanos),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn custom_block_type_names() {
        register_block_type(BlockType::Custom(100), "quota").unwrap();
        assert_eq!(BlockType::Custom(100).to_string(), "quota");
        assert_eq!(BlockType::Custom(101).to_string(), "custom(101)");
        assert_eq!(BlockType::Degrade.to_string(), "Degrade");
        assert!(BlockType::System.is_builtin());
        assert!(!BlockType::Custom(100).is_builtin());
    }

    #[test]
    fn builtin_types_cannot_be_renamed() {
        assert_eq!(
            register_block_type(BlockType::Degrade, "breaker"),
            Err(BlockTypeError::BuiltIn(BlockType::Degrade))
        );
        assert_eq!(BlockType::Degrade.to_string(), "Degrade");
    }

    #[test]
    fn custom_name_is_kept() {
        register_block_type(BlockType::Custom(200), "first").unwrap();
        let err = register_block_type(BlockType::Custom(200), "second").unwrap_err();
        assert_eq!(
            err,
            BlockTypeError::Taken {
                id: 200,
                name: "first".into()
            }
        );
        assert_eq!(BlockType::Custom(200).to_string(), "first");
    }

    #[test]
    fn token_result_kinds() {
        let mut r = TokenResult::new_should_wait(10);
        assert!(r.is_wait());
        assert_eq!(r.nanos_to_wait(), 10);
        r = TokenResult::new_blocked(BlockType::Flow);
        assert!(r.is_blocked());
        assert_eq!(r.nanos_to_wait(), 0);
        assert_eq!(r.block_err().unwrap().block_type(), BlockType::Flow);
        r.reset_to_pass();
        assert!(r.is_pass());
        assert_eq!(r.to_string(), "pass");
    }

    #[test]
    fn combined_decisions() {
        let wait = TokenResult::new_should_wait;
        assert_eq!(TokenResult::Pass.and(TokenResult::Pass), TokenResult::Pass);
        assert_eq!(TokenResult::Pass.and(wait(5)), wait(5));
        assert_eq!(wait(5).and(wait(7)), wait(12));
        assert_eq!(wait(u64::MAX).and(wait(1)), wait(u64::MAX));

        let flow = TokenResult::new_blocked(BlockType::Flow);
        let system = TokenResult::new_blocked(BlockType::System);
        assert_eq!(wait(5).and(flow.clone()), flow);
        assert_eq!(flow.clone().and(system.clone()), flow);
        assert_eq!(system.clone().and(flow), system);
    }
}
