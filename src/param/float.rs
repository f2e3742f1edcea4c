// Floating point parameter with a unit and a settable display precision
//
// Values are rounded to the configured number of decimal places on every
// assignment, so equality and modification checks operate on rounded
// values only. The rendered form drops trailing zeros.

use std::cell::Cell;
use std::rc::Rc;

use crate::container::Container;
use crate::error::{TreeError, TreeResult};

use super::{DataParameter, ParamKind};

#[derive(Clone)]
pub struct FloatKind {
    unit: String,
    decimals: Cell<u32>,
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

impl ParamKind for FloatKind {
    type Value = f64;

    const TYPE_NAME: &'static str = "float";

    fn is_equal(&self, a: &f64, b: &f64) -> bool {
        let decimals = self.decimals.get();
        round_to(*a, decimals) == round_to(*b, decimals)
    }

    fn adjust(&self, value: f64) -> f64 {
        round_to(value, self.decimals.get())
    }

    fn render(&self, value: &f64) -> String {
        let rendered = format!("{:.*}", self.decimals.get() as usize, value);
        if rendered.contains('.') {
            rendered.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            rendered
        }
    }

    fn parse(&self, text: &str) -> TreeResult<f64> {
        let value: f64 = text
            .trim()
            .parse()
            .map_err(|_| TreeError::invalid_format(text, Self::TYPE_NAME))?;
        if !value.is_finite() {
            return Err(TreeError::invalid_format(text, Self::TYPE_NAME));
        }
        Ok(value)
    }

    fn render_text(&self, value: &f64) -> String {
        if self.unit.is_empty() {
            self.render(value)
        } else {
            format!("{} {}", self.render(value), self.unit)
        }
    }

    fn parse_text(&self, text: &str) -> TreeResult<f64> {
        let text = text.trim();
        let text = text.strip_suffix(self.unit.as_str()).unwrap_or(text).trim();
        self.parse(text)
    }

    fn extra_xml_attributes(&self, _value: &f64) -> Vec<(&'static str, String)> {
        vec![(crate::xml::ATTR_UNIT, self.unit.clone())]
    }
}

pub type FloatParameter = DataParameter<FloatKind>;

impl FloatParameter {
    pub fn new(
        parent: &Rc<Container>,
        id: &str,
        designation: &str,
        default: f64,
        unit: &str,
        decimals: u32,
    ) -> TreeResult<Rc<Self>> {
        let kind = FloatKind {
            unit: unit.to_string(),
            decimals: Cell::new(decimals),
        };
        DataParameter::create(parent, id, designation, default, kind)
    }

    pub fn unit(&self) -> &str {
        &self.kind.unit
    }

    pub fn decimals(&self) -> u32 {
        self.kind.decimals.get()
    }

    /// Changes the display precision and re-rounds the current value,
    /// recording the re-rounding as a regular change when it has effect
    pub fn set_decimals(&self, decimals: u32) {
        self.kind.decimals.set(decimals);
        let current = self.value();
        let rounded = round_to(current, decimals);
        if rounded != current {
            self.assign_and_notify(rounded);
        }
    }
}
