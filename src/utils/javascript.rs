//! Script builders for the Chrome-backed page. Every script is a self-contained
//! expression; arguments are embedded as JSON literals.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// A CSS selector with an optional `:has-text("...")` filter split off.
/// The filter matches a case-insensitive substring of the element's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSelector {
    pub css: String,
    pub text: Option<String>,
}

fn has_text_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"^(.*?):has-text\((?:"([^"]*)"|'([^']*)')\)\s*$"#).ok())
        .as_ref()
}

pub fn split_has_text(selector: &str) -> ParsedSelector {
    let captures = has_text_pattern().and_then(|re| re.captures(selector.trim()));
    match captures {
        Some(caps) => {
            let css = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            let text = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string());
            ParsedSelector {
                css: if css.is_empty() { "*".to_string() } else { css.to_string() },
                text,
            }
        }
        None => ParsedSelector {
            css: selector.trim().to_string(),
            text: None,
        },
    }
}

fn literal(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

fn query_prelude(selector: &str) -> String {
    let parsed = split_has_text(selector);
    let text = parsed
        .text
        .as_deref()
        .map(|text| literal(&text.to_lowercase()))
        .unwrap_or_else(|| "null".to_string());
    format!(
        r#"const __matches = Array.from(document.querySelectorAll({css})).filter(el => {{
                const text = {text};
                if (text === null) return true;
                return (el.innerText || el.textContent || el.value || '').toLowerCase().includes(text);
            }});"#,
        css = literal(&parsed.css),
        text = text
    )
}

fn with_element(selector: &str, index: usize, body: &str) -> String {
    format!(
        r#"
        (function() {{
            {prelude}
            const el = __matches[{index}];
            if (!el) return {{ success: false, error: 'Element not found' }};
            try {{
                {body}
            }} catch (e) {{
                return {{ success: false, error: e.message }};
            }}
        }})()
        "#,
        prelude = query_prelude(selector),
        index = index,
        body = body
    )
}

pub fn count(selector: &str) -> String {
    format!(
        "(function() {{ {} return __matches.length; }})()",
        query_prelude(selector)
    )
}

pub fn is_visible(selector: &str, index: usize) -> String {
    with_element(
        selector,
        index,
        r#"const style = window.getComputedStyle(el);
                const rect = el.getBoundingClientRect();
                const visible = style.display !== 'none'
                    && style.visibility !== 'hidden'
                    && rect.width > 0
                    && rect.height > 0;
                return { success: true, value: visible };"#,
    )
}

pub fn click(selector: &str, index: usize) -> String {
    with_element(
        selector,
        index,
        r#"el.scrollIntoView({ block: 'center' });
                el.focus();
                el.click();
                return { success: true };"#,
    )
}

/// Sets the value through the native setter so framework-bound inputs see the change.
pub fn fill(selector: &str, index: usize, value: &str) -> String {
    let body = format!(
        r#"const value = {value};
                el.focus();
                if (el instanceof HTMLInputElement || el instanceof HTMLTextAreaElement) {{
                    const proto = el instanceof HTMLTextAreaElement
                        ? HTMLTextAreaElement.prototype
                        : HTMLInputElement.prototype;
                    const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
                    setter.call(el, value);
                }} else if (el.isContentEditable) {{
                    el.textContent = value;
                }} else {{
                    return {{ success: false, error: 'Element is not editable' }};
                }}
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return {{ success: true, value: el.value !== undefined ? el.value : el.textContent }};"#,
        value = literal(value)
    );
    with_element(selector, index, &body)
}

pub fn clear(selector: &str, index: usize) -> String {
    fill(selector, index, "")
}

pub fn text_content(selector: &str) -> String {
    format!(
        r#"(function() {{
            {}
            const el = __matches[0];
            return el ? (el.innerText || el.textContent || '') : null;
        }})()"#,
        query_prelude(selector)
    )
}

pub fn ready_state() -> &'static str {
    "document.readyState"
}

/// True once the document is complete and no resource finished within `quiet_ms`.
pub fn network_quiet(quiet_ms: u64) -> String {
    format!(
        r#"(function() {{
            if (document.readyState !== 'complete') return false;
            const now = performance.now();
            return performance.getEntriesByType('resource')
                .every(entry => entry.responseEnd > 0 && now - entry.responseEnd >= {});
        }})()"#,
        quiet_ms
    )
}

/// Promise resolving `true` after `quiet_ms` without DOM mutations, `false` at `timeout_ms`.
pub fn dom_settled(quiet_ms: u64, timeout_ms: u64) -> String {
    format!(
        r#"
        new Promise((resolve) => {{
            let quietTimer = null;
            const root = document.body || document.documentElement;
            const observer = new MutationObserver(() => arm());
            const finish = (settled) => {{
                observer.disconnect();
                clearTimeout(quietTimer);
                clearTimeout(deadline);
                resolve(settled);
            }};
            const arm = () => {{
                clearTimeout(quietTimer);
                quietTimer = setTimeout(() => finish(true), {quiet});
            }};
            const deadline = setTimeout(() => finish(false), {timeout});
            observer.observe(root, {{ childList: true, subtree: true, attributes: true, characterData: true }});
            arm();
        }})
        "#,
        quiet = quiet_ms,
        timeout = timeout_ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_double_quoted_has_text() {
        let parsed = split_has_text(r#"[role="button"]:has-text("Submit")"#);
        assert_eq!(parsed.css, r#"[role="button"]"#);
        assert_eq!(parsed.text.as_deref(), Some("Submit"));
    }

    #[test]
    fn splits_single_quoted_has_text() {
        let parsed = split_has_text("button:has-text('Next')");
        assert_eq!(parsed.css, "button");
        assert_eq!(parsed.text.as_deref(), Some("Next"));
    }

    #[test]
    fn plain_css_passes_through() {
        let parsed = split_has_text(r#"input[type="text"], textarea"#);
        assert_eq!(parsed.css, r#"input[type="text"], textarea"#);
        assert!(parsed.text.is_none());
    }

    #[test]
    fn bare_has_text_matches_any_element() {
        let parsed = split_has_text(r#":has-text("Thank you")"#);
        assert_eq!(parsed.css, "*");
    }

    #[test]
    fn values_are_embedded_as_json_literals() {
        let script = fill("textarea", 0, "O'Brien \"Co\"\n");
        assert!(script.contains(r#""O'Brien \"Co\"\n""#));
    }

    #[test]
    fn element_scripts_index_into_matches() {
        assert!(click("input", 3).contains("__matches[3]"));
        assert!(count(r#"button:has-text("Next")"#).contains(r#""next""#));
    }
}
