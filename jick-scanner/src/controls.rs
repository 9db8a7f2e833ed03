//! Typed view of an HTML form and its controls.

use crate::endpoint::Method;
use crate::error::{Result, ScanError};
use crate::scope::Scope;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

static FORM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form").expect("hardcoded selector is valid"));
static CONTROLS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("input, select, textarea").expect("hardcoded selector is valid")
});
static OPTIONS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("option").expect("hardcoded selector is valid"));

/// `<input>` of any type other than checkbox or radio.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InputControl {
    pub name: String,
    /// Lowercased `type`; `None` when the attribute is absent.
    pub input_type: Option<String>,
    pub value: Option<String>,
    pub maxlength: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckboxControl {
    pub name: String,
    pub value: Option<String>,
}

/// Every valued radio sharing one name, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct RadioGroup {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    pub value: String,
    pub selected: bool,
}

/// Only `<option>`s carrying a `value` attribute are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectControl {
    pub name: String,
    pub options: Vec<SelectOption>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextareaControl {
    pub name: String,
    pub maxlength: Option<String>,
    pub rows: Option<String>,
    pub cols: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlDescriptor {
    TextLike(InputControl),
    Checkbox(CheckboxControl),
    Radio(RadioGroup),
    Select(SelectControl),
    Textarea(TextareaControl),
}

/// Buckets used to number controls for positional value selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    TextLike,
    Checkbox,
    Radio,
    Select,
    Textarea,
}

impl ControlDescriptor {
    pub fn name(&self) -> &str {
        match self {
            ControlDescriptor::TextLike(c) => &c.name,
            ControlDescriptor::Checkbox(c) => &c.name,
            ControlDescriptor::Radio(c) => &c.name,
            ControlDescriptor::Select(c) => &c.name,
            ControlDescriptor::Textarea(c) => &c.name,
        }
    }

    pub fn kind(&self) -> ControlKind {
        match self {
            ControlDescriptor::TextLike(_) => ControlKind::TextLike,
            ControlDescriptor::Checkbox(_) => ControlKind::Checkbox,
            ControlDescriptor::Radio(_) => ControlKind::Radio,
            ControlDescriptor::Select(_) => ControlKind::Select,
            ControlDescriptor::Textarea(_) => ControlKind::Textarea,
        }
    }

    /// Generation config key: the input type for text-like controls, the
    /// kind name otherwise.
    pub fn config_key(&self) -> &str {
        match self {
            ControlDescriptor::TextLike(c) => c.input_type.as_deref().unwrap_or("default"),
            ControlDescriptor::Checkbox(_) => "checkbox",
            ControlDescriptor::Radio(_) => "radio",
            ControlDescriptor::Select(_) => "select",
            ControlDescriptor::Textarea(_) => "textarea",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormDescriptor {
    pub method: Method,
    /// Absolute action URL.
    pub action: String,
    pub controls: Vec<ControlDescriptor>,
}

impl FormDescriptor {
    /// Builds a descriptor from serialized `<form>` markup.
    ///
    /// Controls without a `name` are skipped, as are radios without a
    /// `value`. Radios are folded into one group per name, positioned at the
    /// first member.
    pub fn parse(markup: &str, method: Method, scope: &Scope) -> Result<Self> {
        let fragment = Html::parse_fragment(markup);
        let form = fragment
            .select(&FORM)
            .next()
            .ok_or_else(|| ScanError::Parse("markup contains no <form>".to_string()))?;
        Self::from_element(form, method, scope)
    }

    pub fn from_element(form: ElementRef<'_>, method: Method, scope: &Scope) -> Result<Self> {
        let action = form.value().attr("action").ok_or(ScanError::MissingAttribute {
            element: "form",
            attribute: "action",
        })?;

        let mut controls = Vec::new();
        let mut radio_slots: HashMap<String, usize> = HashMap::new();

        for element in form.select(&CONTROLS) {
            match parse_control(element) {
                Ok(Some(ControlDescriptor::Radio(group))) => {
                    if let Some(&slot) = radio_slots.get(&group.name) {
                        if let ControlDescriptor::Radio(existing) = &mut controls[slot] {
                            existing.values.extend(group.values);
                        }
                    } else {
                        radio_slots.insert(group.name.clone(), controls.len());
                        controls.push(ControlDescriptor::Radio(group));
                    }
                }
                Ok(Some(control)) => controls.push(control),
                Ok(None) => {}
                Err(e) => debug!("Skipping form control: {}", e),
            }
        }

        Ok(Self {
            method,
            action: scope.absolute(action),
            controls,
        })
    }
}

fn attr(element: ElementRef<'_>, name: &str) -> Option<String> {
    element.value().attr(name).map(str::to_string)
}

fn parse_control(element: ElementRef<'_>) -> Result<Option<ControlDescriptor>> {
    let tag = element.value().name();
    let tag_name: &'static str = match tag {
        "input" => "input",
        "select" => "select",
        _ => "textarea",
    };
    let name = attr(element, "name").ok_or(ScanError::MissingAttribute {
        element: tag_name,
        attribute: "name",
    })?;

    let control = match tag_name {
        "select" => ControlDescriptor::Select(SelectControl {
            name,
            options: element
                .select(&OPTIONS)
                .filter_map(|option| {
                    option.value().attr("value").map(|value| SelectOption {
                        value: value.to_string(),
                        selected: option.value().attr("selected").is_some(),
                    })
                })
                .collect(),
        }),
        "textarea" => ControlDescriptor::Textarea(TextareaControl {
            name,
            maxlength: attr(element, "maxlength"),
            rows: attr(element, "rows"),
            cols: attr(element, "cols"),
        }),
        _ => {
            let input_type = attr(element, "type").map(|t| t.to_ascii_lowercase());
            match input_type.as_deref() {
                Some("checkbox") => ControlDescriptor::Checkbox(CheckboxControl {
                    name,
                    value: attr(element, "value"),
                }),
                Some("radio") => match attr(element, "value") {
                    Some(value) => ControlDescriptor::Radio(RadioGroup {
                        name,
                        values: vec![value],
                    }),
                    None => return Ok(None),
                },
                _ => ControlDescriptor::TextLike(InputControl {
                    name,
                    input_type,
                    value: attr(element, "value"),
                    maxlength: attr(element, "maxlength"),
                    min: attr(element, "min"),
                    max: attr(element, "max"),
                    placeholder: attr(element, "placeholder"),
                }),
            }
        }
    };
    Ok(Some(control))
}

/// Parses a numeric attribute the way browsers see it: surrounding
/// whitespace allowed, anything else is an error.
pub fn parse_numeric(attribute: &'static str, raw: &str) -> Result<i64> {
    raw.trim().parse::<i64>().map_err(|_| ScanError::BadNumeric {
        attribute,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new("http", "example.com")
    }

    #[test]
    fn test_parse_builds_typed_controls_in_order() {
        let markup = r#"<form method="get" action="/search">
            <input type="text" name="q" maxlength="20" placeholder="Find">
            <input type="checkbox" name="exact" value="1">
            <select name="sort">
                <option value="new">New</option>
                <option value="old" selected>Old</option>
                <option>No value</option>
            </select>
            <textarea name="notes" rows="4" cols="10"></textarea>
            <input type="submit" value="Go">
        </form>"#;
        let form = FormDescriptor::parse(markup, Method::Get, &scope()).unwrap();

        assert_eq!(form.action, "http://example.com/search");
        let names: Vec<&str> = form.controls.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["q", "exact", "sort", "notes"]);

        match &form.controls[2] {
            ControlDescriptor::Select(select) => {
                assert_eq!(select.options.len(), 2);
                assert!(select.options[1].selected);
            }
            other => panic!("expected select, got {:?}", other),
        }
    }

    #[test]
    fn test_radios_grouped_by_name() {
        let markup = r#"<form action="/p">
            <input type="radio" name="size" value="s">
            <input type="text" name="who">
            <input type="radio" name="size" value="m">
            <input type="radio" name="color" value="red">
            <input type="radio" name="size" value="l">
            <input type="radio" name="size">
        </form>"#;
        let form = FormDescriptor::parse(markup, Method::Post, &scope()).unwrap();

        assert_eq!(form.controls.len(), 3);
        assert_eq!(
            form.controls[0],
            ControlDescriptor::Radio(RadioGroup {
                name: "size".to_string(),
                values: vec!["s".to_string(), "m".to_string(), "l".to_string()],
            })
        );
        assert_eq!(form.controls[1].name(), "who");
        assert_eq!(form.controls[2].name(), "color");
    }

    #[test]
    fn test_missing_action_is_reported() {
        let err = FormDescriptor::parse("<form><input name='a'></form>", Method::Get, &scope())
            .unwrap_err();
        assert!(matches!(
            err,
            ScanError::MissingAttribute {
                element: "form",
                attribute: "action"
            }
        ));
    }

    #[test]
    fn test_unnamed_controls_are_skipped() {
        let markup = r#"<form action="/x"><input type="text"><textarea></textarea>
            <input type="hidden" name="token" value="abc"></form>"#;
        let form = FormDescriptor::parse(markup, Method::Get, &scope()).unwrap();
        assert_eq!(form.controls.len(), 1);
        assert_eq!(form.controls[0].config_key(), "hidden");
    }

    #[test]
    fn test_input_type_is_lowercased() {
        let form = FormDescriptor::parse(
            r#"<form action="/"><input type="EMAIL" name="e"></form>"#,
            Method::Get,
            &scope(),
        )
        .unwrap();
        assert_eq!(form.controls[0].config_key(), "email");
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric("maxlength", " 12 ").unwrap(), 12);
        assert_eq!(parse_numeric("min", "-3").unwrap(), -3);
        assert!(matches!(
            parse_numeric("max", "ten"),
            Err(ScanError::BadNumeric { attribute: "max", .. })
        ));
    }
}
