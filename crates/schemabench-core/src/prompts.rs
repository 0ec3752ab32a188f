//! Prompt templates.

use crate::types::Schema;

/// Turns a schema into the user prompt sent to the engine.
pub type FormatPrompt = fn(&Schema) -> String;

pub const DEFAULT_FORMAT_PROMPT: FormatPrompt = default_format_prompt;

pub fn default_format_prompt(schema: &Schema) -> String {
    format!(
        " You need to generate a JSON object that matches the schema below.  Do not include the \
         schema in the output and DIRECTLY return the JSON object without any additional \
         information.  The schema is: {schema}"
    )
}
