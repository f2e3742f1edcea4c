// Integer parameter

use std::rc::Rc;

use crate::container::Container;
use crate::error::{TreeError, TreeResult};

use super::{DataParameter, ParamKind};

#[derive(Clone)]
pub struct IntKind;

impl ParamKind for IntKind {
    type Value = i32;

    const TYPE_NAME: &'static str = "int";

    fn is_equal(&self, a: &i32, b: &i32) -> bool {
        a == b
    }

    fn render(&self, value: &i32) -> String {
        value.to_string()
    }

    fn parse(&self, text: &str) -> TreeResult<i32> {
        text.trim()
            .parse()
            .map_err(|_| TreeError::invalid_format(text, Self::TYPE_NAME))
    }
}

pub type IntParameter = DataParameter<IntKind>;

impl IntParameter {
    pub fn new(
        parent: &Rc<Container>,
        id: &str,
        designation: &str,
        default: i32,
    ) -> TreeResult<Rc<Self>> {
        DataParameter::create(parent, id, designation, default, IntKind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Parameter;

    #[test]
    fn parses_decimal_text() {
        let root = Container::new(None, "root", "").unwrap();
        let param = IntParameter::new(&root, "count", "Count", 0).unwrap();

        param.set_as_string(" -17 ").unwrap();
        assert_eq!(param.value(), -17);
        assert_eq!(param.as_string(), "-17");

        assert!(matches!(
            param.set_as_string("12.5"),
            Err(TreeError::InvalidFormat { .. })
        ));
        assert!(matches!(
            param.set_as_string("abc"),
            Err(TreeError::InvalidFormat { .. })
        ));
    }
}
