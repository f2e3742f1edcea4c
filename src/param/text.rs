// String parameter

use std::rc::Rc;

use crate::container::Container;
use crate::error::TreeResult;

use super::{DataParameter, ParamKind};

#[derive(Clone)]
pub struct StringKind;

impl ParamKind for StringKind {
    type Value = String;

    const TYPE_NAME: &'static str = "string";

    fn is_equal(&self, a: &String, b: &String) -> bool {
        a == b
    }

    fn render(&self, value: &String) -> String {
        value.clone()
    }

    fn parse(&self, text: &str) -> TreeResult<String> {
        Ok(text.to_string())
    }
}

pub type StringParameter = DataParameter<StringKind>;

impl StringParameter {
    pub fn new(
        parent: &Rc<Container>,
        id: &str,
        designation: &str,
        default: &str,
    ) -> TreeResult<Rc<Self>> {
        DataParameter::create(parent, id, designation, default.to_string(), StringKind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Parameter;

    #[test]
    fn text_is_stored_verbatim() {
        let root = Container::new(None, "root", "").unwrap();
        let param = StringParameter::new(&root, "title", "Title", "").unwrap();

        param.set_as_string("  spaced  ").unwrap();
        assert_eq!(param.value(), "  spaced  ");
        assert_eq!(param.as_string(), "  spaced  ");
    }
}
