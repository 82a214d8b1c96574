/// Represents structural ways to locate a UI element.
///
/// Free-text phrase matching is deliberately not a selector; it runs as a
/// separate resolution pass with its own normalization rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Select by the stable automation id attribute.
    Id(String),
    /// Select by tag or ARIA role, with an optional accessible-name filter.
    Role { role: String, name: Option<String> },
    /// Select by class name.
    ClassName(String),
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        let s = s.trim();

        // if using pipe, use it for the role plus name (preferred precise format)
        if s.contains('|') {
            let parts: Vec<&str> = s.split('|').collect();
            if parts.len() >= 2 {
                let role_part = parts[0].trim();
                let name_part = parts[1].trim();

                let role = role_part
                    .strip_prefix("role:")
                    .unwrap_or(role_part)
                    .to_string();
                let name = name_part
                    .strip_prefix("name:")
                    .unwrap_or(name_part)
                    .to_string();

                return Selector::Role {
                    role,
                    name: Some(name),
                };
            }
        }

        match s {
            _ if s.starts_with("role:") => Selector::Role {
                role: s[5..].to_string(),
                name: None,
            },
            _ if s.to_lowercase().starts_with("classname:") => {
                let parts: Vec<&str> = s.splitn(2, ':').collect();
                Selector::ClassName(parts[1].to_string())
            }
            _ if s.starts_with("id:") => Selector::Id(s[3..].to_string()),
            _ if s.starts_with('#') => Selector::Id(s[1..].to_string()),
            _ if s.to_lowercase().starts_with("text:") => Selector::Invalid(
                "text matching is not a structural selector; put the phrase in the target's texts list".to_string(),
            ),
            _ => Selector::Invalid(format!(
                "Unknown selector format: \"{s}\". Use prefixes like 'role:', 'id:', '#', or 'classname:' to specify the selector type."
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stable_id_forms() {
        assert_eq!(
            Selector::from("#new-case"),
            Selector::Id("new-case".to_string())
        );
        assert_eq!(
            Selector::from("id:new-case"),
            Selector::Id("new-case".to_string())
        );
    }

    #[test]
    fn parses_role_with_piped_name() {
        assert_eq!(
            Selector::from("role:button|Create case"),
            Selector::Role {
                role: "button".to_string(),
                name: Some("Create case".to_string()),
            }
        );
        assert_eq!(
            Selector::from("button|Create case"),
            Selector::Role {
                role: "button".to_string(),
                name: Some("Create case".to_string()),
            }
        );
    }

    #[test]
    fn parses_bare_role_and_classname() {
        assert_eq!(
            Selector::from("role:button"),
            Selector::Role {
                role: "button".to_string(),
                name: None,
            }
        );
        assert_eq!(
            Selector::from("classname:board"),
            Selector::ClassName("board".to_string())
        );
    }

    #[test]
    fn rejects_text_and_unknown_formats() {
        assert!(matches!(Selector::from("text:upload"), Selector::Invalid(_)));
        assert!(matches!(Selector::from("upload docs"), Selector::Invalid(_)));
    }
}
