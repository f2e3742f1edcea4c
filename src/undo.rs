// UndoRedoStack - single linear undo/redo log shared by a whole tree
//
// Every tree owns exactly one stack, created by the root container and
// referenced by all descendants. Parameter value changes and dynamic-list
// mutations are recorded as (node, old, new) entries; Undo/Redo replay the
// recorded value through the originating node while a replaying guard
// suppresses re-entrant logging.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::container::Container;
use crate::error::{TreeError, TreeResult};

/// Capability exposed by every node that can appear in the undo log.
/// Replay hands the recorded value back to the node through this single
/// entry point; the node dispatches on the value shape itself.
pub(crate) trait UndoRedoNode {
    fn apply_undo_redo(&self, value: &UndoValue) -> TreeResult<()>;
}

/// Shape of a recorded change: a plain text value transition for
/// parameters, or a tagged list mutation for dynamic containers.
#[derive(Clone)]
pub(crate) enum UndoValue {
    Text(String),
    List(ListChange),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ListAction {
    Add,
    Remove,
    Clear,
}

/// One side of a dynamic-list transition. For `Add`/`Remove` the `items`
/// vector holds at most one element; for `Clear` the old side carries the
/// whole prior list so a single undo restores it entirely.
#[derive(Clone)]
pub(crate) struct ListChange {
    pub(crate) action: ListAction,
    pub(crate) index: usize,
    pub(crate) items: Vec<Rc<Container>>,
}

impl fmt::Display for UndoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndoValue::Text(text) => f.write_str(text),
            UndoValue::List(change) => write!(f, "{} item(s)", change.items.len()),
        }
    }
}

struct UndoItem {
    node: Weak<dyn UndoRedoNode>,
    designation: String,
    old: UndoValue,
    new: UndoValue,
}

/// Linear truncating undo/redo log
///
/// The pointer addresses the most recent committed entry and stays within
/// [-1, len - 1]. Recording a new change while the pointer is not at the
/// end discards every entry beyond it (no branching). `CanUndoRedoChanged`
/// subscribers are notified exactly once per actual flip of either flag.
pub struct UndoRedoStack {
    entries: RefCell<Vec<UndoItem>>,
    pointer: Cell<isize>,
    replaying: Cell<bool>,
    muted: Cell<bool>,
    can_undo: Cell<bool>,
    can_redo: Cell<bool>,
    listeners: RefCell<Vec<(usize, Rc<dyn Fn()>)>>,
    next_token: Cell<usize>,
}

impl UndoRedoStack {
    pub(crate) fn new() -> Self {
        UndoRedoStack {
            entries: RefCell::new(Vec::new()),
            pointer: Cell::new(-1),
            replaying: Cell::new(false),
            muted: Cell::new(false),
            can_undo: Cell::new(false),
            can_redo: Cell::new(false),
            listeners: RefCell::new(Vec::new()),
            next_token: Cell::new(0),
        }
    }

    /// True if at least one committed change can be reverted
    pub fn can_undo(&self) -> bool {
        self.can_undo.get()
    }

    /// True if at least one undone change can be re-applied
    pub fn can_redo(&self) -> bool {
        self.can_redo.get()
    }

    /// Number of entries currently on the log
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Index of the most recent committed entry, -1 if none
    pub fn pointer(&self) -> isize {
        self.pointer.get()
    }

    /// Reverts the most recent committed change
    pub fn undo(&self) -> TreeResult<()> {
        let ptr = self.pointer.get();
        if ptr < 0 {
            return Err(TreeError::OutOfRange(
                "undo pointer already at the lower limit".into(),
            ));
        }
        let (node, value) = {
            let entries = self.entries.borrow();
            let item = &entries[ptr as usize];
            (item.node.clone(), item.old.clone())
        };
        log::trace!("undo: ptr={ptr} old={value}");
        self.replay(&node, &value)?;
        self.pointer.set(ptr - 1);
        self.update_can_undo_redo();
        Ok(())
    }

    /// Re-applies the most recently undone change
    pub fn redo(&self) -> TreeResult<()> {
        let ptr = self.pointer.get();
        if ptr >= self.len() as isize - 1 {
            return Err(TreeError::OutOfRange(
                "redo pointer already at the upper limit".into(),
            ));
        }
        let next = ptr + 1;
        let (node, value) = {
            let entries = self.entries.borrow();
            let item = &entries[next as usize];
            (item.node.clone(), item.new.clone())
        };
        log::trace!("redo: ptr={next} new={value}");
        self.replay(&node, &value)?;
        self.pointer.set(next);
        self.update_can_undo_redo();
        Ok(())
    }

    /// Empties the log and resets the pointer
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
        self.pointer.set(-1);
        self.update_can_undo_redo();
    }

    /// Textual summaries of the undoable entries, most recent first
    pub fn undo_list(&self) -> Vec<String> {
        let entries = self.entries.borrow();
        (0..=self.pointer.get())
            .rev()
            .filter_map(|i| entries.get(i as usize))
            .map(render_item)
            .collect()
    }

    /// Textual summaries of the redoable entries, nearest first
    pub fn redo_list(&self) -> Vec<String> {
        let entries = self.entries.borrow();
        let start = (self.pointer.get() + 1) as usize;
        entries[start.min(entries.len())..]
            .iter()
            .map(render_item)
            .collect()
    }

    /// Registers a listener fired on every flip of `can_undo` or `can_redo`
    pub fn subscribe_can_undo_redo_changed(&self, listener: Box<dyn Fn()>) -> usize {
        let token = self.next_token.get();
        self.next_token.set(token + 1);
        self.listeners.borrow_mut().push((token, Rc::from(listener)));
        token
    }

    pub fn unsubscribe_can_undo_redo_changed(&self, token: usize) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(t, _)| *t != token);
        listeners.len() != before
    }

    /// Records a change. No-op while muted (bulk load) or replaying.
    pub(crate) fn value_changed(
        &self,
        node: Weak<dyn UndoRedoNode>,
        designation: String,
        old: UndoValue,
        new: UndoValue,
    ) {
        if self.replaying.get() || self.muted.get() {
            return;
        }
        {
            let mut entries = self.entries.borrow_mut();
            // discard superseded redo entries, then append
            entries.truncate((self.pointer.get() + 1) as usize);
            entries.push(UndoItem {
                node,
                designation,
                old,
                new,
            });
        }
        self.pointer.set(self.pointer.get() + 1);
        log::trace!("value changed: ptr={}", self.pointer.get());
        self.update_can_undo_redo();
    }

    /// Suppresses logging until the returned guard is dropped
    pub(crate) fn mute(&self) -> MuteGuard<'_> {
        let previous = self.muted.replace(true);
        MuteGuard {
            stack: self,
            previous,
        }
    }

    fn replay(&self, node: &Weak<dyn UndoRedoNode>, value: &UndoValue) -> TreeResult<()> {
        let node = node.upgrade().ok_or_else(|| {
            TreeError::InvariantViolation("undo/redo target no longer exists".into())
        })?;
        self.replaying.set(true);
        let result = node.apply_undo_redo(value);
        self.replaying.set(false);
        result
    }

    fn update_can_undo_redo(&self) {
        let len = self.len() as isize;
        let ptr = self.pointer.get();
        let can_undo = len > 0 && ptr >= 0;
        let can_redo = len > 0 && ptr < len - 1;

        let mut flips = 0;
        if self.can_undo.get() != can_undo {
            self.can_undo.set(can_undo);
            flips += 1;
        }
        if self.can_redo.get() != can_redo {
            self.can_redo.set(can_redo);
            flips += 1;
        }
        if flips > 0 {
            let listeners: Vec<Rc<dyn Fn()>> = self
                .listeners
                .borrow()
                .iter()
                .map(|(_, f)| f.clone())
                .collect();
            for _ in 0..flips {
                for listener in &listeners {
                    listener();
                }
            }
        }
    }
}

/// How a tree member refers to the tree's stack. The root owns it; every
/// descendant holds a weak handle, so undo entries carrying containers
/// cannot keep a dropped tree alive through the stack.
pub(crate) enum StackRef {
    Owned(Rc<UndoRedoStack>),
    Inherited(Weak<UndoRedoStack>),
}

impl StackRef {
    pub(crate) fn get(&self) -> Option<Rc<UndoRedoStack>> {
        match self {
            StackRef::Owned(stack) => Some(stack.clone()),
            StackRef::Inherited(stack) => stack.upgrade(),
        }
    }
}

/// Restores the previous muted state when dropped, so bulk loads cannot
/// leave the stack muted on an early return
pub(crate) struct MuteGuard<'a> {
    stack: &'a UndoRedoStack,
    previous: bool,
}

impl Drop for MuteGuard<'_> {
    fn drop(&mut self) {
        self.stack.muted.set(self.previous);
    }
}

fn render_item(item: &UndoItem) -> String {
    format!("{}: {} -> {}", item.designation, item.old, item.new)
}
