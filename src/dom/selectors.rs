use crate::types::NavigationIntent;

/// Candidate selectors for free-text form inputs, narrowest first.
pub fn text_input_candidates() -> Vec<String> {
    vec![
        r#"input[type="text"], textarea"#.to_string(),
        r#"input[type="text"], input[type="email"], input[type="tel"], input[type="number"], input[type="date"], input[type="url"], textarea"#.to_string(),
        r#"input:not([type="hidden"]):not([type="submit"]):not([type="button"]):not([type="checkbox"]):not([type="radio"]), textarea"#.to_string(),
    ]
}

/// Candidate selectors for the control matching `intent`, by role, text, then attribute.
pub fn control_candidates(intent: NavigationIntent) -> Vec<String> {
    match intent {
        NavigationIntent::Next => vec![
            r#"[role="button"]:has-text("Next")"#.to_string(),
            r#"button:has-text("Next")"#.to_string(),
            r#"input[type="button"][value="Next"]"#.to_string(),
        ],
        NavigationIntent::Submit => vec![
            r#"input[type="submit"]"#.to_string(),
            r#"button[type="submit"]"#.to_string(),
            r#"[role="button"]:has-text("Submit")"#.to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_candidates_prefer_attributes() {
        let submit = control_candidates(NavigationIntent::Submit);
        assert_eq!(submit[0], r#"input[type="submit"]"#);
        assert!(submit.last().unwrap().contains(":has-text(\"Submit\")"));
    }

    #[test]
    fn text_inputs_start_with_the_narrowest_selector() {
        assert_eq!(text_input_candidates()[0], r#"input[type="text"], textarea"#);
    }
}
