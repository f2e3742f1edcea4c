// Parameter - typed leaf values with change tracking and undo integration
//
// A parameter holds a current value, the construction-time default and a
// buffered value (the modification baseline). Assignments run through one
// guarded pipeline: equality short-circuit, reentrancy check, old/new text
// capture, undo-stack notification, change event. The per-type behavior
// (equality, rendering, parsing, extra XML attributes) lives in a ParamKind
// strategy so that every value domain shares the exact same pipeline.

mod binary;
mod boolean;
mod choice;
mod float;
mod integer;
mod text;

pub use binary::{BinaryKind, BinaryParameter};
pub use boolean::{BoolKind, BoolParameter};
pub use choice::{ChoiceKind, ChoiceParameter};
pub use float::{FloatKind, FloatParameter};
pub use integer::{IntKind, IntParameter};
pub use text::{StringKind, StringParameter};

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::container::Container;
use crate::error::{TreeError, TreeResult};
use crate::node::{Node, NodeInfo};
use crate::undo::{UndoRedoNode, UndoRedoStack, UndoValue};
use crate::xml::{self, XmlElement};

/// Change observer signature; the payload is the parameter that changed,
/// delivered after the value was assigned and the undo stack updated.
/// Handlers must not mutate the delivering parameter (enforced by the
/// reentrancy guard).
pub type ChangeObserver = dyn Fn(&dyn Parameter);

/// Per-value-domain behavior plugged into [`DataParameter`]
pub trait ParamKind: Clone + 'static {
    type Value: Clone + 'static;

    /// Type name used in parse error messages
    const TYPE_NAME: &'static str;

    /// Value equality as used by the setter short-circuit and the
    /// modified-state check
    fn is_equal(&self, a: &Self::Value, b: &Self::Value) -> bool;

    /// Canonicalizes a value before comparison and storage
    fn adjust(&self, value: Self::Value) -> Self::Value {
        value
    }

    /// Domain check applied to every incoming value
    fn validate(&self, _value: &Self::Value) -> TreeResult<()> {
        Ok(())
    }

    /// Canonical text form, also used for undo log entries
    fn render(&self, value: &Self::Value) -> String;

    fn parse(&self, text: &str) -> TreeResult<Self::Value>;

    /// Alternative UI-facing text form, defaults to the canonical one
    fn render_text(&self, value: &Self::Value) -> String {
        self.render(value)
    }

    fn parse_text(&self, text: &str) -> TreeResult<Self::Value> {
        self.parse(text)
    }

    /// Value written to the `val` XML attribute
    fn xml_value(&self, value: &Self::Value) -> String {
        self.render(value)
    }

    fn parse_xml(&self, text: &str) -> TreeResult<Self::Value> {
        self.parse(text)
    }

    /// Additional XML attributes beyond id/name/val
    fn extra_xml_attributes(&self, _value: &Self::Value) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// Object-safe surface shared by all typed parameters, used by containers
/// and UI collaborators holding `Rc<dyn Parameter>`
pub trait Parameter: Node {
    /// Canonical text representation of the value
    fn as_string(&self) -> String;

    /// Parses and assigns; fails with `InvalidFormat` on bad text
    fn set_as_string(&self, text: &str) -> TreeResult<()>;

    /// UI-facing text form (same as `as_string` for most types)
    fn as_text(&self) -> String;

    fn set_as_text(&self, text: &str) -> TreeResult<()>;

    /// Culture-invariant text form used for serialization
    fn as_string_invariant(&self) -> String;

    fn set_as_string_invariant(&self, text: &str) -> TreeResult<()>;

    /// Full attribute list written to this parameter's XML element
    fn xml_attributes(&self) -> Vec<(&'static str, String)>;

    /// Loads the value from the id-matching child element of the given
    /// parent element; absent elements leave the value untouched
    fn load_from_xml(&self, parent_elem: &XmlElement) -> TreeResult<()>;

    /// Creates a structural copy (value, baseline and default) registered
    /// under the given container. Not named `clone_into` so it cannot be
    /// shadowed by `ToOwned::clone_into` from the prelude.
    fn clone_under(&self, parent: &Rc<Container>) -> TreeResult<Rc<dyn Parameter>>;

    /// Copies value and baseline from a parameter of identical type and
    /// id; fails with `InvariantViolation` otherwise
    fn clone_state_from(&self, source: &dyn Parameter) -> TreeResult<()>;

    fn subscribe(&self, observer: Box<ChangeObserver>) -> usize;

    fn unsubscribe(&self, token: usize) -> bool;

    fn as_any(&self) -> &dyn Any;

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

struct ParamCore<T> {
    info: NodeInfo,
    value: RefCell<T>,
    buffered: RefCell<T>,
    default: RefCell<T>,
    is_changing: Cell<bool>,
    // weak so undo entries holding containers cannot keep a tree alive
    // through the stack owned by that tree's root
    undo: Weak<UndoRedoStack>,
    undo_handle: Weak<dyn UndoRedoNode>,
    observers: RefCell<Vec<(usize, Rc<ChangeObserver>)>>,
    next_token: Cell<usize>,
}

/// Generic typed leaf parameter; use the typed aliases
/// ([`BoolParameter`], [`IntParameter`], ...) to construct one
pub struct DataParameter<K: ParamKind> {
    core: ParamCore<K::Value>,
    kind: K,
}

impl<K: ParamKind> DataParameter<K> {
    pub(crate) fn create(
        parent: &Rc<Container>,
        id: &str,
        designation: &str,
        default: K::Value,
        kind: K,
    ) -> TreeResult<Rc<Self>> {
        kind.validate(&default)?;
        let default = kind.adjust(default);
        parent.ensure_param_slot(id)?;
        let info = NodeInfo::new(Some(Rc::downgrade(parent)), id, designation)?;
        let undo = Rc::downgrade(&parent.root().undo_stack());

        let param = Rc::new_cyclic(|weak: &Weak<Self>| {
            let undo_handle: Weak<dyn UndoRedoNode> = weak.clone();
            DataParameter {
                core: ParamCore {
                    info,
                    value: RefCell::new(default.clone()),
                    buffered: RefCell::new(default.clone()),
                    default: RefCell::new(default),
                    is_changing: Cell::new(false),
                    undo,
                    undo_handle,
                    observers: RefCell::new(Vec::new()),
                    next_token: Cell::new(0),
                },
                kind,
            }
        });
        parent.register_param(param.clone());
        Ok(param)
    }

    pub fn value(&self) -> K::Value {
        self.core.value.borrow().clone()
    }

    /// Last committed value, the modification baseline
    pub fn buffered_value(&self) -> K::Value {
        self.core.buffered.borrow().clone()
    }

    pub fn default_value(&self) -> K::Value {
        self.core.default.borrow().clone()
    }

    /// Assigns a new value. No-op when equal to the current value; fails
    /// with `IllegalReentry` when called from within this parameter's own
    /// change notification. On success the transition is recorded on the
    /// tree's undo stack and the change event is fired.
    pub fn set_value(&self, value: K::Value) -> TreeResult<()> {
        self.kind.validate(&value)?;
        let value = self.kind.adjust(value);
        if self.kind.is_equal(&value, &self.core.value.borrow()) {
            return Ok(());
        }
        if self.core.is_changing.get() {
            return Err(TreeError::IllegalReentry(self.path_id()));
        }
        self.core.is_changing.set(true);
        self.assign_and_notify(value);
        self.core.is_changing.set(false);
        Ok(())
    }

    /// Re-baselines value, buffered value and default in one step.
    /// Model-construction convenience; records no undo entry.
    pub fn init(&self, value: K::Value) -> TreeResult<()> {
        self.kind.validate(&value)?;
        let value = self.kind.adjust(value);
        *self.core.value.borrow_mut() = value.clone();
        *self.core.buffered.borrow_mut() = value.clone();
        *self.core.default.borrow_mut() = value;
        Ok(())
    }

    /// Unconditional assignment path shared with internal re-rounding;
    /// the caller has already canonicalized the value
    pub(crate) fn assign_and_notify(&self, value: K::Value) {
        let old_text = self.kind.render(&self.core.value.borrow());
        *self.core.value.borrow_mut() = value;
        let new_text = self.kind.render(&self.core.value.borrow());
        if let Some(stack) = self.core.undo.upgrade() {
            stack.value_changed(
                self.core.undo_handle.clone(),
                self.designation().to_string(),
                UndoValue::Text(old_text),
                UndoValue::Text(new_text),
            );
        }
        self.fire_changed();
    }

    fn fire_changed(&self) {
        let observers: Vec<Rc<ChangeObserver>> = self
            .core
            .observers
            .borrow()
            .iter()
            .map(|(_, f)| f.clone())
            .collect();
        for observer in observers {
            observer(self);
        }
    }
}

impl<K: ParamKind> Node for DataParameter<K> {
    fn id(&self) -> &str {
        self.core.info.id()
    }

    fn designation(&self) -> &str {
        self.core.info.designation()
    }

    fn parent(&self) -> Option<Rc<Container>> {
        self.core.info.parent()
    }

    fn path_id(&self) -> String {
        self.core.info.path_id()
    }

    fn is_modified(&self) -> bool {
        !self
            .kind
            .is_equal(&self.core.value.borrow(), &self.core.buffered.borrow())
    }

    fn reset_modified_state(&self) {
        let was_modified = self.is_modified();
        *self.core.buffered.borrow_mut() = self.core.value.borrow().clone();
        // the value itself is unchanged, but IsModified observably flipped
        if was_modified {
            self.fire_changed();
        }
    }

    fn restore(&self) -> TreeResult<()> {
        self.set_value(self.buffered_value())
    }

    fn set_to_default(&self) -> TreeResult<()> {
        let default = self.default_value();
        *self.core.buffered.borrow_mut() = default.clone();
        self.set_value(default)
    }
}

impl<K: ParamKind> Parameter for DataParameter<K> {
    fn as_string(&self) -> String {
        self.kind.render(&self.core.value.borrow())
    }

    fn set_as_string(&self, text: &str) -> TreeResult<()> {
        let value = self.kind.parse(text)?;
        self.set_value(value)
    }

    fn as_text(&self) -> String {
        self.kind.render_text(&self.core.value.borrow())
    }

    fn set_as_text(&self, text: &str) -> TreeResult<()> {
        let value = self.kind.parse_text(text)?;
        self.set_value(value)
    }

    fn as_string_invariant(&self) -> String {
        self.as_string()
    }

    fn set_as_string_invariant(&self, text: &str) -> TreeResult<()> {
        self.set_as_string(text)
    }

    fn xml_attributes(&self) -> Vec<(&'static str, String)> {
        let value = self.core.value.borrow();
        let mut attrs = vec![
            (xml::ATTR_ID, self.id().to_string()),
            (xml::ATTR_NAME, self.designation().to_string()),
            (xml::ATTR_VALUE, self.kind.xml_value(&value)),
        ];
        attrs.extend(self.kind.extra_xml_attributes(&value));
        attrs
    }

    fn load_from_xml(&self, parent_elem: &XmlElement) -> TreeResult<()> {
        let Some(elem) = parent_elem.child_by_tag_and_id(xml::PARAM_TAG, self.id()) else {
            return Ok(());
        };
        let Some(text) = elem.attr(xml::ATTR_VALUE) else {
            return Ok(());
        };
        let value = self.kind.parse_xml(text)?;
        self.set_value(value)
    }

    fn clone_under(&self, parent: &Rc<Container>) -> TreeResult<Rc<dyn Parameter>> {
        let clone = DataParameter::create(
            parent,
            self.id(),
            self.designation(),
            self.default_value(),
            self.kind.clone(),
        )?;
        // copied directly so cloning never touches the clone's undo stack
        *clone.core.value.borrow_mut() = self.value();
        *clone.core.buffered.borrow_mut() = self.buffered_value();
        Ok(clone)
    }

    fn clone_state_from(&self, source: &dyn Parameter) -> TreeResult<()> {
        let source = source.as_any().downcast_ref::<Self>().ok_or_else(|| {
            TreeError::InvariantViolation(format!(
                "parameter '{}': source parameter has a different type",
                self.path_id()
            ))
        })?;
        if source.id() != self.id() {
            return Err(TreeError::InvariantViolation(format!(
                "parameter '{}': source parameter id '{}' does not match",
                self.path_id(),
                source.id()
            )));
        }
        self.set_value(source.value())?;
        *self.core.buffered.borrow_mut() = source.buffered_value();
        Ok(())
    }

    fn subscribe(&self, observer: Box<ChangeObserver>) -> usize {
        let token = self.core.next_token.get();
        self.core.next_token.set(token + 1);
        self.core
            .observers
            .borrow_mut()
            .push((token, Rc::from(observer)));
        token
    }

    fn unsubscribe(&self, token: usize) -> bool {
        let mut observers = self.core.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(t, _)| *t != token);
        observers.len() != before
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

impl<K: ParamKind> UndoRedoNode for DataParameter<K> {
    fn apply_undo_redo(&self, value: &UndoValue) -> TreeResult<()> {
        match value {
            UndoValue::Text(text) => self.set_as_string(text),
            UndoValue::List(_) => Err(TreeError::InvariantViolation(format!(
                "parameter '{}' cannot replay a list change",
                self.path_id()
            ))),
        }
    }
}

impl<K: ParamKind> fmt::Debug for DataParameter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataParameter")
            .field("path", &self.path_id())
            .field("value", &self.as_string())
            .field("modified", &self.is_modified())
            .finish()
    }
}
