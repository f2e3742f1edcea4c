// DataTree - Observable hierarchical parameter tree with XML persistence
// and a shared undo/redo log

pub mod container;
pub mod error;
pub mod node;
pub mod param;
pub mod undo;
pub mod xml;

// Re-export commonly used types for convenience
pub use container::{Container, ItemFactory, ItemInit, ListObserver};
pub use error::{TreeError, TreeResult};
pub use node::{Node, PATH_DELIMITER};
pub use param::{
    BinaryParameter, BoolParameter, ChangeObserver, ChoiceParameter, DataParameter,
    FloatParameter, IntParameter, ParamKind, Parameter, StringParameter,
};
pub use undo::UndoRedoStack;
