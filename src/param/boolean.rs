// Boolean parameter

use std::rc::Rc;

use crate::container::Container;
use crate::error::{TreeError, TreeResult};

use super::{DataParameter, ParamKind};

#[derive(Clone)]
pub struct BoolKind;

impl ParamKind for BoolKind {
    type Value = bool;

    const TYPE_NAME: &'static str = "bool";

    fn is_equal(&self, a: &bool, b: &bool) -> bool {
        a == b
    }

    fn render(&self, value: &bool) -> String {
        if *value { "true" } else { "false" }.to_string()
    }

    fn parse(&self, text: &str) -> TreeResult<bool> {
        match text.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(TreeError::invalid_format(text, Self::TYPE_NAME)),
        }
    }
}

pub type BoolParameter = DataParameter<BoolKind>;

impl BoolParameter {
    pub fn new(
        parent: &Rc<Container>,
        id: &str,
        designation: &str,
        default: bool,
    ) -> TreeResult<Rc<Self>> {
        DataParameter::create(parent, id, designation, default, BoolKind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::param::Parameter;

    #[test]
    fn parses_only_exact_literals() {
        let root = Container::new(None, "root", "").unwrap();
        let param = BoolParameter::new(&root, "flag", "Flag", false).unwrap();

        param.set_as_string("true").unwrap();
        assert!(param.value());
        param.set_as_string("false").unwrap();
        assert!(!param.value());

        assert!(matches!(
            param.set_as_string("True"),
            Err(TreeError::InvalidFormat { .. })
        ));
        assert!(matches!(
            param.set_as_string("1"),
            Err(TreeError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn toggling_flips_modified_state() {
        let root = Container::new(None, "root", "").unwrap();
        let param = BoolParameter::new(&root, "flag", "Flag", false).unwrap();

        assert!(!param.is_modified());
        param.set_value(true).unwrap();
        assert!(param.is_modified());
        param.set_value(false).unwrap();
        assert!(!param.is_modified());
    }
}
