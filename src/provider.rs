#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    Gemini,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Ollama => "ollama",
            Provider::Gemini => "gemini",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Provider::Ollama),
            "gemini" => Some(Provider::Gemini),
            _ => None,
        }
    }

    pub fn all() -> Vec<Provider> {
        vec![Provider::Ollama, Provider::Gemini]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Ollama => "Ollama (Local)",
            Provider::Gemini => "Gemini (Google)",
        }
    }
}
