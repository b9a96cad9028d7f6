//! Preset listing.

use cm_studio_core::builtin_presets;

/// Print the built-in presets, one per line.
#[allow(clippy::print_stdout)]
pub fn list() {
    for preset in builtin_presets() {
        println!("{:<14} {} {}", preset.id, preset.icon, preset.name);
    }
}
