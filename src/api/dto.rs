use serde::Deserialize;

/// Response of the mark-as-completed mutation.
///
/// Success is only ever the explicit `success: true`; a missing field
/// deserializes to `false` and is handled as a failed mutation. Some
/// historical backend versions omitted the field entirely, which this
/// client deliberately treats as non-success.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}
