// Choice parameter - an integer restricted to a list of (value, label) pairs
//
// The canonical string form is the label, the XML form is the numeric
// value. Labels and values must each be unique within one choice list.

use std::rc::Rc;

use crate::container::Container;
use crate::error::{TreeError, TreeResult};

use super::{DataParameter, ParamKind};

#[derive(Clone)]
pub struct ChoiceKind {
    choices: Vec<(i32, String)>,
}

impl ChoiceKind {
    fn try_new(choices: Vec<(i32, String)>) -> TreeResult<Self> {
        if choices.is_empty() {
            return Err(TreeError::InvalidArgument(
                "choice list may not be empty".into(),
            ));
        }
        for (i, (value, label)) in choices.iter().enumerate() {
            for (other_value, other_label) in &choices[i + 1..] {
                if value == other_value {
                    return Err(TreeError::InvalidArgument(format!(
                        "duplicate choice value {value}"
                    )));
                }
                if label == other_label {
                    return Err(TreeError::InvalidArgument(format!(
                        "duplicate choice label '{label}'"
                    )));
                }
            }
        }
        Ok(ChoiceKind { choices })
    }

    fn label_of(&self, value: i32) -> Option<&str> {
        self.choices
            .iter()
            .find(|(v, _)| *v == value)
            .map(|(_, label)| label.as_str())
    }
}

impl ParamKind for ChoiceKind {
    type Value = i32;

    const TYPE_NAME: &'static str = "choice";

    fn is_equal(&self, a: &i32, b: &i32) -> bool {
        a == b
    }

    fn validate(&self, value: &i32) -> TreeResult<()> {
        if self.label_of(*value).is_none() {
            return Err(TreeError::OutOfRange(format!(
                "{value} is not among the allowed choice values"
            )));
        }
        Ok(())
    }

    fn render(&self, value: &i32) -> String {
        match self.label_of(*value) {
            Some(label) => label.to_string(),
            None => value.to_string(),
        }
    }

    fn parse(&self, text: &str) -> TreeResult<i32> {
        self.choices
            .iter()
            .find(|(_, label)| label == text)
            .map(|(value, _)| *value)
            .ok_or_else(|| TreeError::OutOfRange(format!("'{text}' is not a known choice label")))
    }

    fn xml_value(&self, value: &i32) -> String {
        value.to_string()
    }

    fn parse_xml(&self, text: &str) -> TreeResult<i32> {
        text.trim()
            .parse()
            .map_err(|_| TreeError::invalid_format(text, Self::TYPE_NAME))
    }

    fn extra_xml_attributes(&self, value: &i32) -> Vec<(&'static str, String)> {
        vec![(crate::xml::ATTR_VALUE_STR, self.render(value))]
    }
}

pub type ChoiceParameter = DataParameter<ChoiceKind>;

impl ChoiceParameter {
    pub fn new(
        parent: &Rc<Container>,
        id: &str,
        designation: &str,
        choices: Vec<(i32, String)>,
        default: i32,
    ) -> TreeResult<Rc<Self>> {
        let kind = ChoiceKind::try_new(choices)?;
        DataParameter::create(parent, id, designation, default, kind)
    }

    pub fn choices(&self) -> &[(i32, String)] {
        &self.kind.choices
    }

    /// Index of the current value within the choice list
    pub fn value_idx(&self) -> usize {
        let value = self.value();
        self.kind
            .choices
            .iter()
            .position(|(v, _)| *v == value)
            .expect("current value is always a member of the choice list")
    }

    /// Assigns by list index instead of by value
    pub fn set_value_idx(&self, index: usize) -> TreeResult<()> {
        let (value, _) = self.kind.choices.get(index).ok_or_else(|| {
            TreeError::OutOfRange(format!(
                "choice index {index} exceeds the list of {} entries",
                self.kind.choices.len()
            ))
        })?;
        self.set_value(*value)
    }
}
