//! 助手人设注册表（静态）

use serde::Serialize;

pub const DEFAULT_PERSONA_ID: &str = "default";

/// 未知 ID 的回退名称
pub const DEFAULT_PERSONA_LABEL: &str = "Ayzen Assistant";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Persona {
    pub id: &'static str,
    pub label: &'static str,
}

const PERSONAS: &[Persona] = &[
    Persona { id: "1", label: "Alex (He/Him)" },
    Persona { id: "2", label: "Brenda (She/Her)" },
    Persona { id: "3", label: "Chris (They/Them)" },
    Persona { id: "4", label: "Diana (She/Her)" },
    Persona { id: "5", label: "Mike (He/Him)" },
    Persona { id: DEFAULT_PERSONA_ID, label: DEFAULT_PERSONA_LABEL },
];

pub fn list() -> &'static [Persona] {
    PERSONAS
}

pub fn find(id: &str) -> Option<&'static Persona> {
    PERSONAS.iter().find(|p| p.id == id)
}

/// 展示名；未知 ID 回退为默认助手
pub fn label(id: &str) -> &'static str {
    find(id).map(|p| p.label).unwrap_or(DEFAULT_PERSONA_LABEL)
}
