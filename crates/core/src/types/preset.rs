//! Built-in edit presets.

use serde::Serialize;

/// A one-click edit instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Preset {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub prompt: &'static str,
}

const PRESETS: &[Preset] = &[
    Preset {
        id: "minimal",
        name: "Minimalist Pro",
        icon: "◻️",
        prompt: "Clean, minimalist jewelry photography. Soft diffused lighting, neutral light grey background, ultra-sharp focus on the jewelry, remove imperfections. High-end catalog style.",
    },
    Preset {
        id: "remove-bg",
        name: "Remove Background",
        icon: "✂️",
        prompt: "Remove the background completely. Place the jewelry on a clean, pure white background with a soft, natural drop shadow. Professional e-commerce look.",
    },
    Preset {
        id: "black-gloves",
        name: "Black Gloves",
        icon: "🧤",
        prompt: "Show the jewelry being elegantly held by a hand wearing formal, high-end black velvet gloves. Dark, moody, luxurious atmosphere.",
    },
    Preset {
        id: "black-grey",
        name: "Dark Mode",
        icon: "⚫",
        prompt: "Place the jewelry on a premium background with a smooth gradient from black to dark grey. Cinematic lighting, high contrast, sharp details.",
    },
    Preset {
        id: "high-contrast",
        name: "High Contrast",
        icon: "⚡",
        prompt: "High contrast black and white photography style. Dramatic lighting, sharp reflections, metallic textures.",
    },
];

/// All built-in presets, in display order.
#[must_use]
pub const fn builtin_presets() -> &'static [Preset] {
    PRESETS
}

/// Look up a built-in preset by id.
#[must_use]
pub fn find_preset(id: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|preset| preset.id == id)
}
