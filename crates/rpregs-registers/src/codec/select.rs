use std::sync::{PoisonError, RwLock};

use crate::error::{CodecError, CodecResult};

/// Bijective name <-> code table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectTable {
    options: Vec<(String, u64)>,
}

impl SelectTable {
    /// Build a table; names and codes must both be unique.
    pub fn new<S: Into<String>>(options: impl IntoIterator<Item = (S, u64)>) -> CodecResult<Self> {
        let options: Vec<(String, u64)> = options
            .into_iter()
            .map(|(name, code)| (name.into(), code))
            .collect();

        for (i, (name, code)) in options.iter().enumerate() {
            for (other_name, other_code) in &options[..i] {
                if other_name == name {
                    return Err(CodecError::InvalidParameter(format!(
                        "duplicate option name '{name}'"
                    )));
                }
                if other_code == code {
                    return Err(CodecError::InvalidParameter(format!(
                        "options '{other_name}' and '{name}' share code {code:#x}"
                    )));
                }
            }
        }
        Ok(Self { options })
    }

    pub fn code(&self, name: &str) -> Option<u64> {
        self.options
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, code)| *code)
    }

    pub fn name(&self, code: u64) -> Option<&str> {
        self.options
            .iter()
            .find(|(_, candidate)| *candidate == code)
            .map(|(name, _)| name.as_str())
    }

    /// Option names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.options.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.options.iter().map(|(name, code)| (name.as_str(), *code))
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// Multiplexer-style register selecting one named option.
///
/// The table can be replaced at runtime; every module sharing the register
/// sees the new table.
#[derive(Debug)]
pub struct SelectCodec {
    table: RwLock<SelectTable>,
}

impl SelectCodec {
    pub fn new(table: SelectTable) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    /// Snapshot of the current table.
    pub fn table(&self) -> SelectTable {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_table(&self, table: SelectTable) {
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = table;
    }

    pub fn encode(&self, name: &str) -> CodecResult<u64> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.code(name).ok_or_else(|| CodecError::UnknownOption {
            name: name.to_string(),
            valid: table.names(),
        })
    }

    pub fn decode(&self, code: u64) -> CodecResult<String> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .name(code)
            .map(str::to_string)
            .ok_or(CodecError::UnknownCode(code))
    }
}

impl Clone for SelectCodec {
    fn clone(&self) -> Self {
        Self::new(self.table())
    }
}
