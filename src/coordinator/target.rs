use serde::Serialize;

/// What the pointing axes were last asked to follow.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Target {
    #[default]
    None,
    Fixed {
        ha: f64,
        dec: f64,
    },
    Body {
        name: String,
    },
}

impl Target {
    pub fn body(&self) -> Option<&str> {
        match self {
            Target::Body { name } => Some(name),
            _ => None,
        }
    }
}
