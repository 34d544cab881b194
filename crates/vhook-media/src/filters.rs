//! FFmpeg filter definitions for the ad pipeline.

/// EBU R128 loudness normalization for social video.
pub const FILTER_LOUDNORM: &str = "loudnorm=I=-16:LRA=11:tp=-1";

/// Light fixed color grade applied to the assembled ad.
pub const FILTER_COLOR_GRADE: &str = "eq=contrast=1.05:saturation=1.05:brightness=0.02";

/// Placeholder clip frame size (9:16).
pub const PLACEHOLDER_WIDTH: u32 = 405;
pub const PLACEHOLDER_HEIGHT: u32 = 720;

/// lavfi source for a solid black clip of the given length.
pub fn placeholder_source(duration_secs: f64) -> String {
    format!(
        "color=c=black:s={}x{}:d={}",
        PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, duration_secs
    )
}

/// Centered white label drawn on placeholder clips.
pub fn placeholder_label_filter(label: &str) -> String {
    format!(
        "drawtext=text='{}':fontcolor=white:fontsize=30:x=(w-text_w)/2:y=(h-text_h)/2",
        escape_drawtext(label)
    )
}

/// Escape text for use inside a quoted drawtext value.
fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '\'' | ':' | '%' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
