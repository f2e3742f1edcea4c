// Dynamic list behavior of Container
//
// A dynamic list container creates its items through a user-supplied
// factory. Item additions and removals are recorded on the undo stack as
// list transitions carrying the affected items, so undoing a removal
// reattaches the very same item instance, parameter values included.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::error::{TreeError, TreeResult};
use crate::node::Node;
use crate::undo::{ListAction, ListChange, UndoRedoNode, UndoValue};

use super::{Container, ContainerKind};

/// Creates one fresh item under the given list container, typically via
/// [`Container::new_item`] followed by parameter setup
pub type ItemFactory = dyn Fn(&Rc<Container>) -> TreeResult<Rc<Container>>;

/// Populates a freshly created list container with its default items
pub type ItemInit = dyn Fn(&Rc<Container>) -> TreeResult<()>;

/// List change observer; the payload is the list container whose item
/// set changed
pub type ListObserver = dyn Fn(&Container);

pub(crate) struct DynListState {
    factory: Rc<ItemFactory>,
    init: Option<Rc<ItemInit>>,
    buffered: RefCell<Vec<Rc<Container>>>,
    observers: RefCell<Vec<(usize, Rc<ListObserver>)>>,
    next_token: Cell<usize>,
}

impl DynListState {
    pub(crate) fn new(factory: Rc<ItemFactory>, init: Option<Rc<ItemInit>>) -> Self {
        DynListState {
            factory,
            init,
            buffered: RefCell::new(Vec::new()),
            observers: RefCell::new(Vec::new()),
            next_token: Cell::new(0),
        }
    }

    /// Fresh state sharing factory and init but no items
    pub(crate) fn fork(&self) -> Self {
        DynListState::new(self.factory.clone(), self.init.clone())
    }
}

impl Container {
    fn dyn_state(&self) -> TreeResult<&DynListState> {
        match &self.kind {
            ContainerKind::DynParent(state) => Ok(state),
            _ => Err(TreeError::InvalidArgument(format!(
                "container '{}' is not a dynamic list",
                self.path_id()
            ))),
        }
    }

    /// Appends a new factory-made item to the list
    pub fn add(&self) -> TreeResult<Rc<Container>> {
        let index = self.children.borrow().len();
        self.insert(index)
    }

    /// Appends a new item and runs a one-off initializer on it. Changes
    /// the initializer makes are recorded as regular value changes.
    pub fn add_with(
        &self,
        init: impl FnOnce(&Rc<Container>) -> TreeResult<()>,
    ) -> TreeResult<Rc<Container>> {
        let item = self.add()?;
        init(&item)?;
        Ok(item)
    }

    /// Like [`Container::add_with`] at an explicit position
    pub fn insert_with(
        &self,
        index: usize,
        init: impl FnOnce(&Rc<Container>) -> TreeResult<()>,
    ) -> TreeResult<Rc<Container>> {
        let item = self.insert(index)?;
        init(&item)?;
        Ok(item)
    }

    /// Creates a new factory-made item at the given position
    pub fn insert(&self, index: usize) -> TreeResult<Rc<Container>> {
        let state = self.dyn_state()?;
        let len = self.children.borrow().len();
        if index > len {
            return Err(TreeError::OutOfRange(format!(
                "insert index {index} exceeds the list of {len} item(s)"
            )));
        }
        let parent = self.as_rc();
        let item = (state.factory)(&parent)?;
        let appended = {
            let children = self.children.borrow();
            children.len() == len + 1
                && children.last().is_some_and(|last| Rc::ptr_eq(last, &item))
        };
        if !appended {
            return Err(TreeError::InvalidArgument(format!(
                "item factory of '{}' did not register exactly one new item",
                self.path_id()
            )));
        }
        if index < len {
            let mut children = self.children.borrow_mut();
            if let Some(last) = children.pop() {
                children.insert(index, last);
            }
        }
        self.record_list_change(ListAction::Add, index, Vec::new(), vec![item.clone()]);
        self.fire_list_changed();
        Ok(item)
    }

    /// Removes the given item from the list, matched by identity
    pub fn remove(&self, item: &Rc<Container>) -> TreeResult<()> {
        self.dyn_state()?;
        let index = self.position_of(item).ok_or_else(|| {
            TreeError::OutOfRange(format!(
                "item is not a member of list '{}'",
                self.path_id()
            ))
        })?;
        self.remove_at(index).map(|_| ())
    }

    /// Removes and returns the item at the given position
    pub fn remove_at(&self, index: usize) -> TreeResult<Rc<Container>> {
        self.dyn_state()?;
        let item = {
            let mut children = self.children.borrow_mut();
            if index >= children.len() {
                return Err(TreeError::OutOfRange(format!(
                    "remove index {index} exceeds the list of {} item(s)",
                    children.len()
                )));
            }
            children.remove(index)
        };
        self.record_list_change(ListAction::Remove, index, vec![item.clone()], Vec::new());
        self.fire_list_changed();
        Ok(item)
    }

    /// Removes and returns the last item
    pub fn pop(&self) -> TreeResult<Rc<Container>> {
        self.dyn_state()?;
        let len = self.children.borrow().len();
        if len == 0 {
            return Err(TreeError::OutOfRange(format!(
                "list '{}' is empty",
                self.path_id()
            )));
        }
        self.remove_at(len - 1)
    }

    /// Removes all items; one undo restores the whole list
    pub fn clear_items(&self) -> TreeResult<()> {
        self.dyn_state()?;
        let items: Vec<Rc<Container>> = {
            let mut children = self.children.borrow_mut();
            children.drain(..).collect()
        };
        if items.is_empty() {
            return Ok(());
        }
        self.record_list_change(ListAction::Clear, 0, items, Vec::new());
        self.fire_list_changed();
        Ok(())
    }

    /// Registers a listener fired after every item set change
    pub fn subscribe_list_changed(&self, observer: Box<ListObserver>) -> TreeResult<usize> {
        let state = self.dyn_state()?;
        let token = state.next_token.get();
        state.next_token.set(token + 1);
        state.observers.borrow_mut().push((token, Rc::from(observer)));
        Ok(token)
    }

    pub fn unsubscribe_list_changed(&self, token: usize) -> TreeResult<bool> {
        let state = self.dyn_state()?;
        let mut observers = state.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(t, _)| *t != token);
        Ok(observers.len() != before)
    }

    /// Reattaches an existing item during undo/redo replay
    fn insert_existing(&self, index: usize, item: Rc<Container>) -> TreeResult<()> {
        {
            let mut children = self.children.borrow_mut();
            if index > children.len() {
                return Err(TreeError::InvariantViolation(format!(
                    "replayed list index {index} exceeds the list of {} item(s)",
                    children.len()
                )));
            }
            children.insert(index, item.clone());
        }
        self.record_list_change(ListAction::Add, index, Vec::new(), vec![item]);
        self.fire_list_changed();
        Ok(())
    }

    fn record_list_change(
        &self,
        action: ListAction,
        index: usize,
        old_items: Vec<Rc<Container>>,
        new_items: Vec<Rc<Container>>,
    ) {
        // a list orphaned by dropping its root has no stack left to log to
        let Some(stack) = self.undo.get() else {
            return;
        };
        let node: Weak<dyn UndoRedoNode> = self.self_weak.clone();
        stack.value_changed(
            node,
            self.designation().to_string(),
            UndoValue::List(ListChange {
                action,
                index,
                items: old_items,
            }),
            UndoValue::List(ListChange {
                action,
                index,
                items: new_items,
            }),
        );
    }

    fn fire_list_changed(&self) {
        let Ok(state) = self.dyn_state() else {
            return;
        };
        let observers: Vec<Rc<ListObserver>> = state
            .observers
            .borrow()
            .iter()
            .map(|(_, f)| f.clone())
            .collect();
        for observer in observers {
            observer(self);
        }
    }

    pub(super) fn run_dyn_init(&self) -> TreeResult<()> {
        if let ContainerKind::DynParent(state) = &self.kind {
            if let Some(init) = &state.init {
                init(&self.as_rc())?;
            }
        }
        Ok(())
    }

    /// Commits the current item set as the modification baseline
    pub(super) fn reset_dyn_snapshot(&self) {
        if let ContainerKind::DynParent(state) = &self.kind {
            *state.buffered.borrow_mut() = self.children.borrow().clone();
        }
    }

    pub(super) fn dyn_list_modified(&self) -> bool {
        let ContainerKind::DynParent(state) = &self.kind else {
            return false;
        };
        let children = self.children.borrow();
        let buffered = state.buffered.borrow();
        children.len() != buffered.len()
            || children
                .iter()
                .zip(buffered.iter())
                .any(|(a, b)| !Rc::ptr_eq(a, b))
    }

    /// Reverts the item set to the baseline snapshot. The reverted items
    /// are the original instances; the transition is not recorded on the
    /// undo stack.
    pub(super) fn restore_dyn_list(&self) -> TreeResult<()> {
        let ContainerKind::DynParent(state) = &self.kind else {
            return Ok(());
        };
        if !self.dyn_list_modified() {
            return Ok(());
        }
        *self.children.borrow_mut() = state.buffered.borrow().clone();
        self.fire_list_changed();
        Ok(())
    }
}

impl UndoRedoNode for Container {
    fn apply_undo_redo(&self, value: &UndoValue) -> TreeResult<()> {
        let UndoValue::List(change) = value else {
            return Err(TreeError::InvariantViolation(format!(
                "container '{}' cannot replay a value change",
                self.path_id()
            )));
        };
        match change.action {
            // the populated side reattaches, the empty side removes
            ListAction::Add | ListAction::Remove => match change.items.first() {
                Some(item) => self.insert_existing(change.index, item.clone()),
                None => self.remove_at(change.index).map(|_| ()),
            },
            ListAction::Clear => {
                if change.items.is_empty() {
                    self.clear_items()
                } else {
                    for (index, item) in change.items.iter().enumerate() {
                        self.insert_existing(index, item.clone())?;
                    }
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::IntParameter;

    fn channel_list(parent: Option<&Rc<Container>>) -> Rc<Container> {
        Container::new_dynamic(parent, "channels", "Channels", |parent| {
            let item = Container::new_item(parent, "channel", "Channel")?;
            IntParameter::new(&item, "level", "Level", 0)?;
            Ok(item)
        })
        .unwrap()
    }

    #[test]
    fn add_and_remove_maintain_order() {
        let root = Container::new(None, "root", "").unwrap();
        let list = channel_list(Some(&root));

        let first = list.add().unwrap();
        let second = list.add().unwrap();
        let inserted = list.insert(1).unwrap();

        assert_eq!(list.children().len(), 3);
        assert_eq!(list.position_of(&first), Some(0));
        assert_eq!(list.position_of(&inserted), Some(1));
        assert_eq!(list.position_of(&second), Some(2));

        list.remove(&inserted).unwrap();
        assert_eq!(list.position_of(&second), Some(1));
        assert!(matches!(
            list.remove(&inserted),
            Err(TreeError::OutOfRange(_))
        ));
    }

    #[test]
    fn add_with_runs_the_initializer_on_the_new_item() {
        let root = Container::new(None, "root", "").unwrap();
        let list = channel_list(Some(&root));
        list.add().unwrap();

        let loud = list
            .add_with(|item| item.param("level").unwrap().set_as_string("99"))
            .unwrap();
        assert_eq!(loud.param("level").unwrap().as_string(), "99");
        assert_eq!(list.position_of(&loud), Some(1));

        let quiet = list
            .insert_with(0, |item| item.param("level").unwrap().set_as_string("-1"))
            .unwrap();
        assert_eq!(list.position_of(&quiet), Some(0));
        assert_eq!(list.position_of(&loud), Some(2));
    }

    #[test]
    fn item_paths_carry_their_position() {
        let root = Container::new(None, "root", "").unwrap();
        let list = channel_list(Some(&root));
        let first = list.add().unwrap();
        let second = list.add().unwrap();

        assert_eq!(first.path_id(), "root.channels.channel[0]");
        assert_eq!(second.path_id(), "root.channels.channel[1]");
        assert!(root.container_by_path("channels.channel[1]").is_some());

        let level = root.param_by_path("channels.channel[1].level").unwrap();
        level.set_as_string("7").unwrap();
        assert_eq!(second.param("level").unwrap().as_string(), "7");
    }

    #[test]
    fn undoing_a_removal_restores_the_same_item() {
        let root = Container::new(None, "root", "").unwrap();
        let list = channel_list(Some(&root));
        let item = list.add().unwrap();
        item.param("level").unwrap().set_as_string("42").unwrap();

        list.remove(&item).unwrap();
        assert!(list.children().is_empty());

        root.undo_stack().undo().unwrap();
        assert_eq!(list.children().len(), 1);
        assert!(Rc::ptr_eq(&list.child_at(0).unwrap(), &item));
        assert_eq!(item.param("level").unwrap().as_string(), "42");

        root.undo_stack().redo().unwrap();
        assert!(list.children().is_empty());
    }

    #[test]
    fn clearing_is_one_undoable_step() {
        let root = Container::new(None, "root", "").unwrap();
        let list = channel_list(Some(&root));
        let first = list.add().unwrap();
        let second = list.add().unwrap();
        let stack = root.undo_stack();
        let recorded = stack.len();

        list.clear_items().unwrap();
        assert_eq!(stack.len(), recorded + 1);
        assert!(list.children().is_empty());

        stack.undo().unwrap();
        assert_eq!(list.children().len(), 2);
        assert!(Rc::ptr_eq(&list.child_at(0).unwrap(), &first));
        assert!(Rc::ptr_eq(&list.child_at(1).unwrap(), &second));

        // clearing an already empty list records nothing
        stack.undo().unwrap();
        stack.undo().unwrap();
        let recorded = stack.len();
        list.clear_items().unwrap();
        assert_eq!(stack.len(), recorded);
    }

    #[test]
    fn snapshot_drives_modified_state_and_restore() {
        let root = Container::new(None, "root", "").unwrap();
        let list = channel_list(Some(&root));
        let kept = list.add().unwrap();
        list.reset_modified_state();
        assert!(!list.is_modified());

        let added = list.add().unwrap();
        assert!(list.is_modified());

        list.restore().unwrap();
        assert_eq!(list.children().len(), 1);
        assert!(Rc::ptr_eq(&list.child_at(0).unwrap(), &kept));
        assert!(list.position_of(&added).is_none());
        assert!(!list.is_modified());
    }

    #[test]
    fn replacing_an_item_counts_as_modified() {
        let root = Container::new(None, "root", "").unwrap();
        let list = channel_list(Some(&root));
        let original = list.add().unwrap();
        list.reset_modified_state();

        // same length as the snapshot, different member
        list.remove(&original).unwrap();
        list.add().unwrap();
        assert_eq!(list.children().len(), 1);
        assert!(list.is_modified());

        list.restore().unwrap();
        assert!(Rc::ptr_eq(&list.child_at(0).unwrap(), &original));
        assert!(!list.is_modified());
    }

    #[test]
    fn default_items_come_from_init() {
        let root = Container::new(None, "root", "").unwrap();
        let list = Container::new_dynamic_with_defaults(
            Some(&root),
            "slots",
            "Slots",
            |parent| Container::new_item(parent, "slot", "Slot"),
            |list| {
                list.add()?;
                list.add()?;
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(list.children().len(), 2);
        assert!(!list.is_modified());
        assert!(root.undo_stack().is_empty());

        list.add().unwrap();
        assert!(list.is_modified());
        list.set_to_default().unwrap();
        assert_eq!(list.children().len(), 2);
        assert!(!list.is_modified());
    }

    #[test]
    fn list_observer_fires_on_every_item_set_change() {
        let root = Container::new(None, "root", "").unwrap();
        let list = channel_list(Some(&root));
        let fired = Rc::new(Cell::new(0u32));
        let counter = fired.clone();
        let token = list
            .subscribe_list_changed(Box::new(move |_| counter.set(counter.get() + 1)))
            .unwrap();

        let item = list.add().unwrap();
        list.remove(&item).unwrap();
        assert_eq!(fired.get(), 2);

        assert!(list.unsubscribe_list_changed(token).unwrap());
        list.add().unwrap();
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn static_containers_reject_list_operations() {
        let root = Container::new(None, "root", "").unwrap();
        assert!(matches!(root.add(), Err(TreeError::InvalidArgument(_))));
        assert!(matches!(
            root.clear_items(),
            Err(TreeError::InvalidArgument(_))
        ));
        assert!(matches!(
            Container::new(Some(&channel_list(Some(&root))), "x", ""),
            Err(TreeError::InvalidArgument(_))
        ));
        assert!(matches!(
            Container::new_item(&root, "y", ""),
            Err(TreeError::InvalidArgument(_))
        ));
    }
}
