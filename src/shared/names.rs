pub const MAX_DISPLAY_NAME_LENGTH: usize = 20;
pub const DEFAULT_DISPLAY_NAME: &str = "Adventurer";

pub fn sanitize_display_name(name: &str) -> String {
    let cleaned = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return DEFAULT_DISPLAY_NAME.to_string();
    }
    cleaned.chars().take(MAX_DISPLAY_NAME_LENGTH).collect()
}
