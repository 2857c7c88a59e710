use crate::error::Result;
use crate::type_info::TypeInfo;
use crate::value::SqlValue;

/// Direction of a command parameter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "offline", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    Input,
    Output,
    InputOutput,
}

impl Direction {
    /// Maps the engine's `suggested_is_input` / `suggested_is_output` flag
    /// pair to a direction.
    pub(crate) fn from_flags(is_input: bool, is_output: bool) -> Direction {
        match (is_input, is_output) {
            (true, true) => Direction::InputOutput,
            (false, true) => Direction::Output,
            // Covers (true, false) and the never-observed (false, false);
            // a parameter the engine flags as neither binds as plain input.
            _ => Direction::Input,
        }
    }

    pub fn is_input(self) -> bool {
        matches!(self, Direction::Input | Direction::InputOutput)
    }

    pub fn is_output(self) -> bool {
        matches!(self, Direction::Output | Direction::InputOutput)
    }
}

/// One parameter of a described command.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "offline", derive(serde::Serialize, serde::Deserialize))]
pub struct Parameter {
    pub(crate) name: String,
    pub(crate) type_info: TypeInfo,
    pub(crate) direction: Direction,
    pub(crate) default: Option<SqlValue>,
    pub(crate) optional: bool,
}

impl Parameter {
    /// Builds a parameter from introspected metadata.
    ///
    /// The name must carry the `@` sigil; the engine reports undeclared
    /// parameters with it, so a bare name means the metadata contract was
    /// broken somewhere underneath.
    pub(crate) fn new(
        name: impl Into<String>,
        type_info: TypeInfo,
        direction: Direction,
        optional: bool,
    ) -> Result<Self> {
        let name = name.into();

        if !name.starts_with('@') {
            return Err(err_protocol!(
                "parameter name `{name}` is missing the `@` sigil"
            ));
        }

        Ok(Self {
            name,
            type_info,
            direction,
            // Undeclared parameters never carry a declared default; the
            // field is populated only when describing procedure signatures.
            default: None,
            optional,
        })
    }

    /// Name including the `@` sigil, in declaration order position.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Declared default value, if the command source declares one.
    pub fn default(&self) -> Option<&SqlValue> {
        self.default.as_ref()
    }

    /// Whether the generated binding should accept `Option` and coerce an
    /// absent value to `NULL`.
    pub fn optional(&self) -> bool {
        self.optional
    }
}

/// Rejects duplicate parameter names across a described set.
pub(crate) fn ensure_unique(parameters: &[Parameter]) -> Result<()> {
    for (i, parameter) in parameters.iter().enumerate() {
        if let Some(dup) = parameters[..i]
            .iter()
            .find(|earlier| earlier.name == parameter.name)
        {
            return Err(err_protocol!(
                "parameter `{}` was reported twice by the engine",
                dup.name
            ));
        }
    }

    Ok(())
}
