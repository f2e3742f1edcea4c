// Node - common identity contract for every tree member

use std::rc::{Rc, Weak};

use crate::container::Container;
use crate::error::{TreeError, TreeResult};

/// Separator used when joining node ids into a path id.
/// Node ids may not contain this character.
pub const PATH_DELIMITER: char = '.';

/// Identity and modified-state contract shared by containers and parameters
///
/// `path_id` is computed on demand by walking the parent chain; it is not
/// cached. `reset_modified_state` commits the current value as the new
/// baseline, `restore` reverts to the baseline and `set_to_default` reverts
/// value and baseline to the construction-time default.
pub trait Node {
    /// Stable short identifier, used for serialization matching
    fn id(&self) -> &str;

    /// Human-readable name, defaults to the id
    fn designation(&self) -> &str;

    /// Parent container; `None` for the tree root
    fn parent(&self) -> Option<Rc<Container>>;

    /// Full delimiter-joined chain of ids from the root down to this node
    fn path_id(&self) -> String;

    /// True if the node changed since the last baseline commit
    fn is_modified(&self) -> bool;

    /// Commits the current state as the new modification baseline
    fn reset_modified_state(&self);

    /// Reverts the current state to the baseline
    fn restore(&self) -> TreeResult<()>;

    /// Reverts current state and baseline to the construction-time default
    fn set_to_default(&self) -> TreeResult<()>;
}

/// Identity data embedded in every concrete node type
pub(crate) struct NodeInfo {
    id: String,
    designation: String,
    parent: Option<Weak<Container>>,
}

impl NodeInfo {
    pub(crate) fn new(
        parent: Option<Weak<Container>>,
        id: &str,
        designation: &str,
    ) -> TreeResult<Self> {
        if id.contains(PATH_DELIMITER) {
            return Err(TreeError::InvalidArgument(format!(
                "node id '{id}' may not contain the path delimiter '{PATH_DELIMITER}'"
            )));
        }
        Ok(NodeInfo {
            id: id.to_string(),
            designation: if designation.is_empty() {
                id.to_string()
            } else {
                designation.to_string()
            },
            parent,
        })
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn designation(&self) -> &str {
        &self.designation
    }

    pub(crate) fn parent(&self) -> Option<Rc<Container>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn path_id(&self) -> String {
        match self.parent() {
            Some(parent) => format!("{}{PATH_DELIMITER}{}", parent.path_id(), self.id),
            None => self.id.clone(),
        }
    }
}
