use serde::{Deserialize, Serialize};

/// A language a tour is available in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// ISO 639-1 code (e.g. `"cs"`, `"en"`)
    pub code: String,

    /// Display name in the language itself (e.g. `"Česky"`)
    pub name: String,
}

impl Language {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}
