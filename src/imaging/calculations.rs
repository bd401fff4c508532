//! Pure calculation functions for display metrics and responsive markup.
//!
//! All functions here are pure and testable without any I/O or images.

use regex::Regex;
use std::sync::LazyLock;

/// Root font size used to resolve `em`/`rem` in `sizes` attributes.
const ROOT_FONT_SIZE_PX: f64 = 16.0;

/// How many source pixels are shown per CSS pixel, averaged over both axes.
///
/// # Examples
/// ```
/// # use analyze_image::imaging::display_density;
/// // 285x427 shown at 200x100 → (1.425 + 4.27) / 2
/// let density = display_density((285, 427), (200, 100)).unwrap();
/// assert_eq!(format!("{density:.4}"), "2.8475");
/// ```
pub fn display_density(natural: (u32, u32), display: (u32, u32)) -> Option<f64> {
    let (nat_w, nat_h) = natural;
    let (disp_w, disp_h) = display;
    if disp_w == 0 || disp_h == 0 {
        return None;
    }
    let horizontal = nat_w as f64 / disp_w as f64;
    let vertical = nat_h as f64 / disp_h as f64;
    Some((horizontal + vertical) / 2.0)
}

/// Dimensions a resized variant should have, or `None` if resizing would not
/// shrink the image.
///
/// The target is the display size in device pixels. Resizing is only planned
/// when the target is no larger than the natural size on either axis and
/// strictly smaller on at least one.
pub fn resize_target(
    natural: (u32, u32),
    display: (u32, u32),
    device_pixel_ratio: f64,
) -> Option<(u32, u32)> {
    let (nat_w, nat_h) = natural;
    let width = (display.0 as f64 * device_pixel_ratio).round() as u32;
    let height = (display.1 as f64 * device_pixel_ratio).round() as u32;

    if width == 0 || height == 0 || width > nat_w || height > nat_h {
        return None;
    }
    if width == nat_w && height == nat_h {
        return None;
    }
    Some((width, height))
}

/// Normalise a `srcset` attribute to `", "`-separated candidates.
pub fn normalize_srcset(srcset: &str) -> String {
    srcset
        .split(',')
        .map(|candidate| candidate.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|candidate| !candidate.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

static MEDIA_FEATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(\s*(min|max)-width\s*:\s*([0-9]*\.?[0-9]+)(px|em|rem)\s*\)$")
        .expect("media feature regex")
});

static LENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]*\.?[0-9]+)(px|vw|vh|em|rem)?$").expect("length regex")
});

/// Convert a `sizes` attribute to the pixel width a browser would pick.
///
/// Follows the source-size selection rule: the first entry whose media
/// condition matches `viewport` wins, an entry without a condition always
/// matches, and with no match the slot defaults to `100vw`. Only
/// `(min-width: …)` / `(max-width: …)` conditions joined by `and` are
/// understood. Returns `None` when the selected length cannot be resolved
/// (`calc()`, `auto`, unknown units).
///
/// # Examples
/// ```
/// # use analyze_image::imaging::sizes_to_px;
/// assert_eq!(sizes_to_px("5vw", (1200, 800)), Some(60));
/// assert_eq!(sizes_to_px("(max-width: 600px) 100vw, 50vw", (1200, 800)), Some(600));
/// ```
pub fn sizes_to_px(sizes: &str, viewport: (u32, u32)) -> Option<u32> {
    for entry in split_top_level(sizes) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (condition, length) = split_condition(entry);
        let matches = match condition {
            None => true,
            Some(condition) => media_condition_matches(condition, viewport.0),
        };
        if matches {
            return length_to_px(length, viewport);
        }
    }
    Some(viewport.0)
}

/// Split on commas that are not nested inside parentheses.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);
    parts
}

/// Separate `"(max-width: 600px) 100vw"` into condition and length.
fn split_condition(entry: &str) -> (Option<&str>, &str) {
    // A trailing function (`calc(...)`) may itself contain spaces.
    let (condition, length) = if entry.ends_with(')') {
        entry.split_at(entry.rfind("calc(").unwrap_or(0))
    } else {
        entry.rsplit_once(char::is_whitespace).unwrap_or(("", entry))
    };
    let (condition, length) = (condition.trim(), length.trim());
    if condition.is_empty() {
        (None, length)
    } else {
        (Some(condition), length)
    }
}

fn media_condition_matches(condition: &str, viewport_width: u32) -> bool {
    condition.split(" and ").all(|feature| {
        let Some(caps) = MEDIA_FEATURE.captures(feature.trim()) else {
            return false;
        };
        let Ok(value) = caps[2].parse::<f64>() else {
            return false;
        };
        let px = match &caps[3] {
            "px" => value,
            _ => value * ROOT_FONT_SIZE_PX,
        };
        let width = viewport_width as f64;
        match &caps[1] {
            "min" => width >= px,
            _ => width <= px,
        }
    })
}

fn length_to_px(length: &str, viewport: (u32, u32)) -> Option<u32> {
    let caps = LENGTH.captures(length)?;
    let value: f64 = caps[1].parse().ok()?;
    let px = match caps.get(2).map(|m| m.as_str()) {
        Some("px") => value,
        Some("vw") => value * viewport.0 as f64 / 100.0,
        Some("vh") => value * viewport.1 as f64 / 100.0,
        Some(_) => value * ROOT_FONT_SIZE_PX,
        // Only zero may be unitless
        None if value == 0.0 => 0.0,
        None => return None,
    };
    Some(px.round() as u32)
}
