//! Status icons for console output.
//!
//! Each icon falls back to a plain ASCII tag on terminals without emoji support.

use console::Emoji;

// Rotation outcomes
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static UNCHANGED: Emoji<'_, '_> = Emoji("➖ ", "[--]");
pub static DRY_RUN: Emoji<'_, '_> = Emoji("🔍 ", "[DRY]");
pub static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");

// Notification
pub static MESSAGE: Emoji<'_, '_> = Emoji("💬 ", "[DM]");
pub static CHANNEL: Emoji<'_, '_> = Emoji("📣 ", "[#]");

// Files
pub static FILE_MOD: Emoji<'_, '_> = Emoji("📝 ", "~");
pub static ROTATE: Emoji<'_, '_> = Emoji("🔄 ", "[ROT]");
