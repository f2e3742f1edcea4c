// Binary blob parameter
//
// The canonical string form is base64, the UI text form is separated hex.
// An unset blob (`None`) never compares equal, not even to another unset
// blob, so assigning `None` always counts as a change.

use std::cell::Cell;
use std::rc::Rc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::container::Container;
use crate::error::{TreeError, TreeResult};

use super::{DataParameter, ParamKind};

#[derive(Clone)]
pub struct BinaryKind {
    hex_separator: Cell<char>,
}

impl ParamKind for BinaryKind {
    type Value = Option<Vec<u8>>;

    const TYPE_NAME: &'static str = "binary";

    fn is_equal(&self, a: &Option<Vec<u8>>, b: &Option<Vec<u8>>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn render(&self, value: &Option<Vec<u8>>) -> String {
        match value {
            Some(bytes) => STANDARD.encode(bytes),
            None => String::new(),
        }
    }

    fn parse(&self, text: &str) -> TreeResult<Option<Vec<u8>>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Some(Vec::new()));
        }
        let bytes = STANDARD
            .decode(text)
            .map_err(|_| TreeError::invalid_format(text, Self::TYPE_NAME))?;
        Ok(Some(bytes))
    }

    fn render_text(&self, value: &Option<Vec<u8>>) -> String {
        let Some(bytes) = value else {
            return String::new();
        };
        let separator = self.hex_separator.get().to_string();
        bytes
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(&separator)
    }

    fn parse_text(&self, text: &str) -> TreeResult<Option<Vec<u8>>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Some(Vec::new()));
        }
        let mut bytes = Vec::new();
        for chunk in text.split(self.hex_separator.get()) {
            let byte = u8::from_str_radix(chunk.trim(), 16)
                .map_err(|_| TreeError::invalid_format(text, Self::TYPE_NAME))?;
            bytes.push(byte);
        }
        Ok(Some(bytes))
    }
}

pub type BinaryParameter = DataParameter<BinaryKind>;

impl BinaryParameter {
    pub fn new(
        parent: &Rc<Container>,
        id: &str,
        designation: &str,
        default: Option<Vec<u8>>,
    ) -> TreeResult<Rc<Self>> {
        let kind = BinaryKind {
            hex_separator: Cell::new('-'),
        };
        DataParameter::create(parent, id, designation, default, kind)
    }

    pub fn hex_separator(&self) -> char {
        self.kind.hex_separator.get()
    }

    /// Separator placed between hex byte pairs in the text form
    pub fn set_hex_separator(&self, separator: char) {
        self.kind.hex_separator.set(separator);
    }
}
