use thiserror::Error;

/// Misuse of the entry lifecycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntryFreeError {
    /// The exited entry was not the innermost active entry of its context.
    /// All entries still active in the context have been exited when this is returned.
    #[error(
        "the exited entry of resource {exited} is not the current entry of context {context}, current entry: {current:?}"
    )]
    Mismatch {
        context: String,
        exited: String,
        current: Option<String>,
    },
    #[error("the entry of resource {resource} has already exited")]
    AlreadyExited { resource: String },
}

/// Misuse of an explicitly entered context.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContextError {
    /// The context still holds active entries, they were not exited before the context.
    #[error("context {name} exited with {active} active entries")]
    EntriesLeaked { name: String, active: usize },
}

/// Refused naming of a block type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlockTypeError {
    #[error("block type {0:?} is raised by a built-in rule check and keeps its name")]
    BuiltIn(super::BlockType),
    #[error("custom block type {id} is already named {name}")]
    Taken { id: u8, name: String },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn messages() {
        let err = EntryFreeError::Mismatch {
            context: "ctx".into(),
            exited: "outer".into(),
            current: Some("inner".into()),
        };
        assert_eq!(
            err.to_string(),
            "the exited entry of resource outer is not the current entry of context ctx, current entry: Some(\"inner\")"
        );
        let err = ContextError::EntriesLeaked {
            name: "ctx".into(),
            active: 2,
        };
        assert_eq!(err.to_string(), "context ctx exited with 2 active entries");
        let err = BlockTypeError::Taken {
            id: 3,
            name: "quota".into(),
        };
        assert_eq!(err.to_string(), "custom block type 3 is already named quota");
    }
}
