//! printf-style string templates used throughout the configuration.
//!
//! Configuration values such as `"Bump %s to version %s"` or
//! `"VERSION = '%s'"` carry positional placeholders. `%s` and `%d` are
//! both accepted and substituted in order; `%%` renders a literal `%`.

/// Counts the positional placeholders in a template.
///
/// ```
/// use metal_robot::template::placeholder_count;
///
/// assert_eq!(placeholder_count("Bump %s to version %s"), 2);
/// assert_eq!(placeholder_count("100%% done"), 0);
/// ```
pub fn placeholder_count(template: &str) -> usize {
    let mut count = 0;
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        match chars.next() {
            Some('s') | Some('d') => count += 1,
            _ => {}
        }
    }
    count
}

/// Renders a template, substituting placeholders with `args` in order.
///
/// Placeholders without a matching argument are rendered empty. Unknown
/// `%` sequences are copied through unchanged.
///
/// ```
/// use metal_robot::template::render;
///
/// assert_eq!(render("VERSION = '%s'", &["v0.15.1"]), "VERSION = 'v0.15.1'");
/// assert_eq!(render("Bump %s to version %s", &["metalctl", "v0.8.1"]), "Bump metalctl to version v0.8.1");
/// assert_eq!(render("PR%d: 50%%", &["42"]), "PR42: 50%");
/// ```
pub fn render(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') | Some('d') => {
                if let Some(arg) = args.next() {
                    out.push_str(arg);
                }
            }
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn missing_arguments_render_empty() {
        assert_eq!(render("a %s b %s", &["x"]), "a x b ");
    }

    #[test]
    fn unknown_sequences_pass_through() {
        assert_eq!(render("%x %s", &["v"]), "%x v");
        assert_eq!(render("trailing %", &[]), "trailing %");
    }

    proptest! {
        #[test]
        fn templates_without_percent_are_unchanged(s in "[^%]*") {
            prop_assert_eq!(render(&s, &["ignored"]), s.clone());
            prop_assert_eq!(placeholder_count(&s), 0);
        }

        #[test]
        fn single_placeholder_substitutes_value(prefix in "[a-z =']{0,10}", value in "[a-z0-9.]{1,10}") {
            let template = format!("{}%s", prefix);
            prop_assert_eq!(render(&template, &[&value]), format!("{}{}", prefix, value));
        }
    }
}
