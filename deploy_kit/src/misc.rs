use std::sync::atomic::{AtomicUsize, Ordering};

use owo_colors::AnsiColors;

const COLORS: [AnsiColors; 6] = [
    AnsiColors::Cyan,
    AnsiColors::Magenta,
    AnsiColors::Yellow,
    AnsiColors::Green,
    AnsiColors::Blue,
    AnsiColors::Red,
];

static COLOR_NUM: AtomicUsize = AtomicUsize::new(0);

/// Cycles through a fixed set of terminal colors so that concurrently
/// forwarded commands can be told apart
pub fn next_terminal_color() -> AnsiColors {
    let num = COLOR_NUM.fetch_add(1, Ordering::Relaxed);
    COLORS[num % COLORS.len()]
}
