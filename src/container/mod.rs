// Container - inner tree node grouping parameters and child containers
//
// Three flavors share one type: plain static containers, dynamic list
// containers whose children are created at runtime through a factory, and
// the list items themselves. The root container owns the tree's undo/redo
// stack; every descendant records into the root's stack.

mod dynamic;

pub(crate) use dynamic::DynListState;
pub use dynamic::{ItemFactory, ItemInit, ListObserver};

use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::path::Path;
use std::rc::{Rc, Weak};

use crate::error::{TreeError, TreeResult};
use crate::node::{Node, NodeInfo, PATH_DELIMITER};
use crate::param::Parameter;
use crate::undo::{StackRef, UndoRedoStack};
use crate::xml::{self, XmlElement};

pub(crate) enum ContainerKind {
    Static,
    DynParent(DynListState),
    DynItem,
}

pub struct Container {
    info: NodeInfo,
    kind: ContainerKind,
    children: RefCell<Vec<Rc<Container>>>,
    params: RefCell<Vec<Rc<dyn Parameter>>>,
    undo: StackRef,
    self_weak: Weak<Container>,
}

impl Container {
    /// Creates a static container; pass `None` for a tree root
    pub fn new(
        parent: Option<&Rc<Container>>,
        id: &str,
        designation: &str,
    ) -> TreeResult<Rc<Self>> {
        Self::build(parent, id, designation, ContainerKind::Static)
    }

    /// Creates one item of a dynamic list container. Meant to be called
    /// from an item factory; items of one list share their id.
    pub fn new_item(parent: &Rc<Container>, id: &str, designation: &str) -> TreeResult<Rc<Self>> {
        Self::build(Some(parent), id, designation, ContainerKind::DynItem)
    }

    /// Creates a dynamic list container. The factory is invoked by
    /// [`Container::add`] and must create its item via
    /// [`Container::new_item`] under the passed parent.
    pub fn new_dynamic(
        parent: Option<&Rc<Container>>,
        id: &str,
        designation: &str,
        factory: impl Fn(&Rc<Container>) -> TreeResult<Rc<Container>> + 'static,
    ) -> TreeResult<Rc<Self>> {
        Self::build(
            parent,
            id,
            designation,
            ContainerKind::DynParent(DynListState::new(Rc::new(factory), None)),
        )
    }

    /// Like [`Container::new_dynamic`], additionally populating the list
    /// through `init`. The initial population is the default state: it is
    /// not recorded on the undo stack and does not count as modified.
    pub fn new_dynamic_with_defaults(
        parent: Option<&Rc<Container>>,
        id: &str,
        designation: &str,
        factory: impl Fn(&Rc<Container>) -> TreeResult<Rc<Container>> + 'static,
        init: impl Fn(&Rc<Container>) -> TreeResult<()> + 'static,
    ) -> TreeResult<Rc<Self>> {
        let container = Self::build(
            parent,
            id,
            designation,
            ContainerKind::DynParent(DynListState::new(Rc::new(factory), Some(Rc::new(init)))),
        )?;
        {
            let stack = container.undo_stack();
            let _guard = stack.mute();
            container.run_dyn_init()?;
        }
        container.reset_dyn_snapshot();
        Ok(container)
    }

    fn build(
        parent: Option<&Rc<Container>>,
        id: &str,
        designation: &str,
        kind: ContainerKind,
    ) -> TreeResult<Rc<Self>> {
        let is_item = matches!(kind, ContainerKind::DynItem);
        match parent {
            Some(parent) => {
                let under_list = matches!(parent.kind, ContainerKind::DynParent(_));
                if is_item && !under_list {
                    return Err(TreeError::InvalidArgument(format!(
                        "list item '{id}' requires a dynamic list parent"
                    )));
                }
                if !is_item && under_list {
                    return Err(TreeError::InvalidArgument(format!(
                        "container '{id}': only list items may be created under a dynamic list"
                    )));
                }
                // items of one list deliberately share their id
                if !is_item {
                    parent.ensure_child_slot(id)?;
                }
            }
            None if is_item => {
                return Err(TreeError::InvalidArgument(format!(
                    "list item '{id}' requires a dynamic list parent"
                )));
            }
            None => {}
        }

        let info = NodeInfo::new(parent.map(Rc::downgrade), id, designation)?;
        let undo = match parent {
            Some(parent) => StackRef::Inherited(Rc::downgrade(&parent.root().undo_stack())),
            None => StackRef::Owned(Rc::new(UndoRedoStack::new())),
        };
        let container = Rc::new_cyclic(|weak: &Weak<Container>| Container {
            info,
            kind,
            children: RefCell::new(Vec::new()),
            params: RefCell::new(Vec::new()),
            undo,
            self_weak: weak.clone(),
        });
        if let Some(parent) = parent {
            parent.children.borrow_mut().push(container.clone());
        }
        Ok(container)
    }

    pub(crate) fn as_rc(&self) -> Rc<Container> {
        self.self_weak
            .upgrade()
            .expect("container is always owned by an Rc")
    }

    /// Topmost container of this tree
    pub fn root(&self) -> Rc<Container> {
        let mut current = self.as_rc();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// The undo/redo stack shared by the whole tree
    pub fn undo_stack(&self) -> Rc<UndoRedoStack> {
        self.undo
            .get()
            .expect("the root container owning the undo stack is alive")
    }

    pub fn children(&self) -> Vec<Rc<Container>> {
        self.children.borrow().clone()
    }

    pub fn params(&self) -> Vec<Rc<dyn Parameter>> {
        self.params.borrow().clone()
    }

    /// First direct child container with the given id
    pub fn child(&self, id: &str) -> Option<Rc<Container>> {
        self.children
            .borrow()
            .iter()
            .find(|child| child.id() == id)
            .cloned()
    }

    pub fn child_at(&self, index: usize) -> Option<Rc<Container>> {
        self.children.borrow().get(index).cloned()
    }

    /// Direct parameter with the given id
    pub fn param(&self, id: &str) -> Option<Rc<dyn Parameter>> {
        self.params
            .borrow()
            .iter()
            .find(|param| param.id() == id)
            .cloned()
    }

    /// Index of the given child within this container, by identity
    pub fn position_of(&self, child: &Rc<Container>) -> Option<usize> {
        self.children
            .borrow()
            .iter()
            .position(|c| Rc::ptr_eq(c, child))
    }

    /// Resolves a delimiter-joined path of container ids relative to this
    /// container. A segment may carry a positional suffix (`id[2]`) to
    /// address one item of a dynamic list.
    pub fn container_by_path(&self, path: &str) -> Option<Rc<Container>> {
        let mut current = self.as_rc();
        for segment in path.split(PATH_DELIMITER) {
            current = current.resolve_segment(segment)?;
        }
        Some(current)
    }

    /// Resolves a path whose last segment names a parameter
    pub fn param_by_path(&self, path: &str) -> Option<Rc<dyn Parameter>> {
        match path.rsplit_once(PATH_DELIMITER) {
            Some((containers, param_id)) => self.container_by_path(containers)?.param(param_id),
            None => self.param(path),
        }
    }

    fn resolve_segment(&self, segment: &str) -> Option<Rc<Container>> {
        if let Some((id, rest)) = segment.split_once('[') {
            let index: usize = rest.strip_suffix(']')?.parse().ok()?;
            return self
                .children
                .borrow()
                .iter()
                .filter(|child| child.id() == id)
                .nth(index)
                .cloned();
        }
        self.child(segment)
    }

    pub(crate) fn ensure_child_slot(&self, id: &str) -> TreeResult<()> {
        if self.child(id).is_some() || self.param(id).is_some() {
            return Err(TreeError::InvalidArgument(format!(
                "container '{}' already holds a node with id '{id}'",
                self.path_id()
            )));
        }
        Ok(())
    }

    pub(crate) fn ensure_param_slot(&self, id: &str) -> TreeResult<()> {
        self.ensure_child_slot(id)
    }

    pub(crate) fn register_param(&self, param: Rc<dyn Parameter>) {
        self.params.borrow_mut().push(param);
    }

    /// Creates an independent copy of this subtree as a new root with its
    /// own undo stack. Values and baselines are copied verbatim; a copied
    /// list item becomes a plain static root.
    pub fn deep_clone(&self) -> TreeResult<Rc<Container>> {
        self.clone_subtree(None)
    }

    fn clone_subtree(&self, parent: Option<&Rc<Container>>) -> TreeResult<Rc<Container>> {
        let kind = match (&self.kind, parent) {
            (ContainerKind::Static, _) => ContainerKind::Static,
            (ContainerKind::DynParent(state), _) => ContainerKind::DynParent(state.fork()),
            (ContainerKind::DynItem, Some(_)) => ContainerKind::DynItem,
            // a detached item copy loses its list membership
            (ContainerKind::DynItem, None) => ContainerKind::Static,
        };
        let clone = Self::build(parent, self.id(), self.designation(), kind)?;
        {
            let stack = clone.undo_stack();
            let _guard = stack.mute();
            for param in self.params.borrow().iter() {
                param.clone_under(&clone)?;
            }
            for child in self.children.borrow().iter() {
                child.clone_subtree(Some(&clone))?;
            }
        }
        clone.reset_dyn_snapshot();
        Ok(clone)
    }

    /// Copies values and baselines from a structurally equal tree. Dynamic
    /// lists are resized to match; any other structural difference is an
    /// `InvariantViolation`.
    pub fn clone_state_from(&self, source: &Rc<Container>) -> TreeResult<()> {
        if source.id() != self.id() {
            return Err(TreeError::InvariantViolation(format!(
                "container '{}': source id '{}' does not match",
                self.path_id(),
                source.id()
            )));
        }
        if std::mem::discriminant(&self.kind) != std::mem::discriminant(&source.kind) {
            return Err(TreeError::InvariantViolation(format!(
                "container '{}': source has a different container flavor",
                self.path_id()
            )));
        }

        if matches!(self.kind, ContainerKind::DynParent(_)) {
            let target = source.children.borrow().len();
            while self.children.borrow().len() > target {
                self.pop()?;
            }
            while self.children.borrow().len() < target {
                self.add()?;
            }
        }

        if self.params.borrow().len() != source.params.borrow().len() {
            return Err(TreeError::InvariantViolation(format!(
                "container '{}': parameter counts differ",
                self.path_id()
            )));
        }
        for param in self.params.borrow().iter() {
            let other = source.param(param.id()).ok_or_else(|| {
                TreeError::InvariantViolation(format!(
                    "source container lacks parameter '{}'",
                    param.path_id()
                ))
            })?;
            param.clone_state_from(other.as_ref())?;
        }

        let own_children = self.children();
        let source_children = source.children();
        if own_children.len() != source_children.len() {
            return Err(TreeError::InvariantViolation(format!(
                "container '{}': child counts differ",
                self.path_id()
            )));
        }
        for (child, other) in own_children.iter().zip(source_children.iter()) {
            child.clone_state_from(other)?;
        }
        Ok(())
    }

    /// Serializes this subtree into its element form
    pub fn to_xml(&self) -> XmlElement {
        let mut elem = XmlElement::new(xml::CONTAINER_TAG);
        elem.set_attr(xml::ATTR_ID, self.id());
        elem.set_attr(xml::ATTR_NAME, self.designation());
        for param in self.params.borrow().iter() {
            let mut param_elem = XmlElement::new(xml::PARAM_TAG);
            for (name, value) in param.xml_attributes() {
                param_elem.set_attr(name, &value);
            }
            elem.children.push(param_elem);
        }
        for child in self.children.borrow().iter() {
            elem.children.push(child.to_xml());
        }
        elem
    }

    /// Loads this subtree from the id-matching child element of the given
    /// parent element; an absent element leaves the subtree untouched
    pub fn load_from_xml(&self, parent_elem: &XmlElement) -> TreeResult<()> {
        match parent_elem.child_by_tag_and_id(xml::CONTAINER_TAG, self.id()) {
            Some(elem) => self.load_own_xml(elem),
            None => Ok(()),
        }
    }

    fn load_own_xml(&self, elem: &XmlElement) -> TreeResult<()> {
        if matches!(self.kind, ContainerKind::DynParent(_)) {
            // the element's item list replaces the current one
            self.clear_items()?;
            for child_elem in &elem.children {
                if child_elem.tag != xml::CONTAINER_TAG {
                    continue;
                }
                let item = self.add()?;
                item.load_own_xml(child_elem)?;
            }
            for param in self.params.borrow().iter() {
                param.load_from_xml(elem)?;
            }
            return Ok(());
        }
        for param in self.params.borrow().iter() {
            param.load_from_xml(elem)?;
        }
        for child in self.children() {
            child.load_from_xml(elem)?;
        }
        Ok(())
    }

    /// Writes the subtree as an XML document. With `reset_modified` the
    /// saved state becomes the new modification baseline.
    pub fn save_to_file(&self, path: impl AsRef<Path>, reset_modified: bool) -> TreeResult<()> {
        let text = xml::write_document(&self.to_xml())?;
        fs::write(path.as_ref(), text)?;
        log::debug!("saved tree '{}' to {}", self.path_id(), path.as_ref().display());
        if reset_modified {
            self.reset_modified_state();
        }
        Ok(())
    }

    /// Loads the subtree from an XML document written by `save_to_file`.
    /// Loading is never recorded on the undo stack. Elements present in
    /// the tree but absent from the document keep their current values.
    pub fn load_from_file(&self, path: impl AsRef<Path>, reset_modified: bool) -> TreeResult<()> {
        let text = fs::read_to_string(path.as_ref())?;
        let doc = xml::parse_document(&text)?;
        {
            let stack = self.undo_stack();
            let _guard = stack.mute();
            if doc.tag == xml::CONTAINER_TAG && doc.attr(xml::ATTR_ID) == Some(self.id()) {
                self.load_own_xml(&doc)?;
            }
        }
        log::debug!(
            "loaded tree '{}' from {}",
            self.path_id(),
            path.as_ref().display()
        );
        if reset_modified {
            self.reset_modified_state();
        }
        Ok(())
    }
}

impl Node for Container {
    fn id(&self) -> &str {
        self.info.id()
    }

    fn designation(&self) -> &str {
        self.info.designation()
    }

    fn parent(&self) -> Option<Rc<Container>> {
        self.info.parent()
    }

    fn path_id(&self) -> String {
        if matches!(self.kind, ContainerKind::DynItem) {
            if let Some(parent) = self.parent() {
                let this = self.as_rc();
                let index = parent
                    .children
                    .borrow()
                    .iter()
                    .filter(|child| child.id() == self.id())
                    .position(|child| Rc::ptr_eq(child, &this))
                    .unwrap_or(0);
                return format!(
                    "{}{PATH_DELIMITER}{}[{index}]",
                    parent.path_id(),
                    self.id()
                );
            }
        }
        self.info.path_id()
    }

    fn is_modified(&self) -> bool {
        self.params.borrow().iter().any(|param| param.is_modified())
            || self.children.borrow().iter().any(|child| child.is_modified())
            || self.dyn_list_modified()
    }

    fn reset_modified_state(&self) {
        for param in self.params.borrow().iter() {
            param.reset_modified_state();
        }
        for child in self.children() {
            child.reset_modified_state();
        }
        self.reset_dyn_snapshot();
    }

    fn restore(&self) -> TreeResult<()> {
        self.restore_dyn_list()?;
        for param in self.params.borrow().iter() {
            param.restore()?;
        }
        for child in self.children() {
            child.restore()?;
        }
        Ok(())
    }

    fn set_to_default(&self) -> TreeResult<()> {
        for param in self.params.borrow().iter() {
            param.set_to_default()?;
        }
        if matches!(self.kind, ContainerKind::DynParent(_)) {
            // structural reset is not undoable
            {
                let stack = self.undo_stack();
                let _guard = stack.mute();
                self.clear_items()?;
                self.run_dyn_init()?;
            }
            self.reset_dyn_snapshot();
            return Ok(());
        }
        for child in self.children() {
            child.set_to_default()?;
        }
        Ok(())
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("path", &self.path_id())
            .field("params", &self.params.borrow().len())
            .field("children", &self.children.borrow().len())
            .field("modified", &self.is_modified())
            .finish()
    }
}
