pub fn sanitize_name(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "Player".to_string();
    }
    trimmed.chars().take(16).collect()
}

pub fn parse_highscore_limit(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|value| value.parse::<usize>().ok())
}

pub fn normalize_start_level(value: Option<u32>) -> u32 {
    value.unwrap_or(1).clamp(1, 99)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_name_applies_trim_empty_and_max_len() {
        assert_eq!(sanitize_name(""), "Player");
        assert_eq!(sanitize_name("   "), "Player");
        assert_eq!(sanitize_name(" Alice "), "Alice");
        assert_eq!(sanitize_name("12345678901234567890"), "1234567890123456");
    }

    #[test]
    fn highscore_limit_parsing_is_lenient_for_invalid_values() {
        assert_eq!(parse_highscore_limit(Some("8")), Some(8));
        assert_eq!(parse_highscore_limit(Some("0")), Some(0));
        assert_eq!(parse_highscore_limit(Some("abc")), None);
        assert_eq!(parse_highscore_limit(Some("-1")), None);
        assert_eq!(parse_highscore_limit(None), None);
    }

    #[test]
    fn normalize_start_level_clamps_range() {
        assert_eq!(normalize_start_level(None), 1);
        assert_eq!(normalize_start_level(Some(0)), 1);
        assert_eq!(normalize_start_level(Some(3)), 3);
        assert_eq!(normalize_start_level(Some(500)), 99);
    }
}
