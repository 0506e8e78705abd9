//! Network identifier.

use serde::{Deserialize, Serialize};

/// Which XEL network a node follows. Selects the chain parameter preset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    #[default]
    Main,
    Test,
}

impl NetworkId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Test => "test",
        }
    }
}
